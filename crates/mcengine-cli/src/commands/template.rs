use crate::cli::TemplateArgs;
use crate::config::defaults::DefaultsConfig;
use crate::error::Result;
use tracing::info;

/// Renders a commented configuration file holding every default value.
pub fn render() -> String {
    let d = DefaultsConfig::default();
    let [lx, ly, lz] = d.box_lengths;
    format!(
        r#"# mcengine simulation configuration.
# Every value is optional; omitted values fall back to the defaults shown here.

[system]
temperature = {temperature:?}
# Chemical potential in energy units; the nominal bias slope is mu / T.
chemical-potential = {mu:?}
box-lengths = [{lx:?}, {ly:?}, {lz:?}]
# One of: {{ type = "ideal-gas" }},
#         {{ type = "lennard-jones", epsilon = 1.0, sigma = 1.0, cutoff = 2.5 }},
#         {{ type = "hard-sphere", sigma = 1.0 }}
potential = {{ type = "ideal-gas" }}

# Sampled particle numbers are [fixed-n - max-delta-n, fixed-n + max-delta-n].
[window]
fixed-n = {fixed_n}
max-delta-n = {max_delta_n}

[moves.insert-delete]
frequency = {insert_delete_frequency}

[moves.displacement]
enabled = true
frequency = {displacement_frequency}
# Multiply the frequency by the live particle count.
per-particle = true
initial-step = {initial_step:?}
min-step = 0.0
max-step = {max_step:?}
adjust-interval = 100
acceptance-target = 0.5

# Log-spaced grid of trial ratios spanning alpha-center * exp(+/- alpha-span).
[overlap]
num-alpha = {num_alpha}
alpha-center = 1.0
alpha-span = {alpha_span:?}

[bias]
update-interval = {bias_interval}
lower-wall = {lower_wall:?}
# "chemical-potential" or "last-slope"
upper-extrapolation = "chemical-potential"

[run]
equilibration-steps = {equilibration}
production-steps = {production}
seed = {seed}
"#,
        temperature = d.temperature,
        mu = d.chemical_potential,
        fixed_n = d.fixed_n,
        max_delta_n = d.max_delta_n,
        insert_delete_frequency = d.insert_delete_frequency,
        displacement_frequency = d.displacement_frequency,
        initial_step = d.displacement_initial_step,
        max_step = d.displacement_max_step,
        num_alpha = d.num_alpha,
        alpha_span = d.alpha_span,
        bias_interval = d.bias_interval,
        lower_wall = d.lower_wall,
        equilibration = d.equilibration_steps,
        production = d.production_steps,
        seed = d.seed,
    )
}

pub fn run(args: TemplateArgs) -> Result<()> {
    let template = render();
    match &args.output {
        Some(path) => {
            std::fs::write(path, template)?;
            info!("Template written to {:?}", path);
            println!("✓ Template written to: {}", path.display());
        }
        None => print!("{}", template),
    }
    Ok(())
}
