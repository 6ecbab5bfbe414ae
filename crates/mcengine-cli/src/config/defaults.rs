pub struct DefaultsConfig {
    pub temperature: f64,
    pub chemical_potential: f64,
    pub box_lengths: [f64; 3],
    pub fixed_n: usize,
    pub max_delta_n: usize,
    pub insert_delete_frequency: u32,
    pub displacement_frequency: u32,
    pub displacement_initial_step: f64,
    pub displacement_max_step: f64,
    pub num_alpha: usize,
    pub alpha_span: f64,
    pub bias_interval: u64,
    pub lower_wall: f64,
    pub equilibration_steps: u64,
    pub production_steps: u64,
    pub seed: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            chemical_potential: -3.0,
            box_lengths: [10.0, 10.0, 10.0],
            fixed_n: 50,
            max_delta_n: 5,
            insert_delete_frequency: 100,
            displacement_frequency: 1,
            displacement_initial_step: 0.5,
            displacement_max_step: 5.0,
            num_alpha: 11,
            alpha_span: 2.0,
            bias_interval: 10_000,
            lower_wall: 10.0,
            equilibration_steps: 10_000,
            production_steps: 100_000,
            seed: 0,
        }
    }
}
