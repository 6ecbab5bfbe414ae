use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileDisplacementConfig, FilePotential, FileUpperExtrapolation};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use mcengine::engine::config as core_config;
use std::str::FromStr;
use tracing::debug;

/// Resolves the final configuration: CLI arguments, then `-S` overrides and
/// file values, then [`DefaultsConfig`].
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let system_file = file_config.system.take().unwrap_or_default();
    let temperature = args
        .temperature
        .or(system_file.temperature)
        .unwrap_or(defaults.temperature);
    let chemical_potential = args
        .chemical_potential
        .or(system_file.chemical_potential)
        .unwrap_or(defaults.chemical_potential);
    let box_lengths = system_file.box_lengths.unwrap_or(defaults.box_lengths);
    let potential: core_config::PotentialConfig = system_file
        .potential
        .map(Into::into)
        .unwrap_or_default();

    let window_file = file_config.window.take().unwrap_or_default();
    let window = core_config::ParticleWindow::new(
        window_file.fixed_n.unwrap_or(defaults.fixed_n),
        window_file.max_delta_n.unwrap_or(defaults.max_delta_n),
    );

    let moves_file = file_config.moves.take().unwrap_or_default();
    let insert_delete = core_config::MoveConfig::new(
        moves_file
            .insert_delete
            .and_then(|m| m.frequency)
            .unwrap_or(defaults.insert_delete_frequency),
    );
    let displacement = merge_displacement(args.no_displacement, moves_file.displacement, &defaults);

    let overlap_file = file_config.overlap.take().unwrap_or_default();
    let overlap = core_config::OverlapConfig {
        num_alpha: overlap_file.num_alpha.unwrap_or(defaults.num_alpha),
        alpha_center: overlap_file.alpha_center.unwrap_or(1.0),
        alpha_span: overlap_file.alpha_span.unwrap_or(defaults.alpha_span),
    };

    let bias_file = file_config.bias.take().unwrap_or_default();
    let upper: core_config::UpperExtrapolation = bias_file
        .upper_extrapolation
        .map(Into::into)
        .unwrap_or_default();
    let bias_update = core_config::BiasUpdateConfig {
        interval: bias_file.update_interval.unwrap_or(defaults.bias_interval),
        lower_wall: bias_file.lower_wall.unwrap_or(defaults.lower_wall),
        upper,
    };

    let run_file = file_config.run.take().unwrap_or_default();

    let mut builder = core_config::GrandCanonicalConfigBuilder::new()
        .temperature(temperature)
        .chemical_potential(chemical_potential)
        .box_lengths(box_lengths)
        .potential(potential)
        .window(window)
        .insert_delete(insert_delete)
        .overlap(overlap)
        .bias_update(bias_update)
        .equilibration_steps(
            args.equilibration
                .or(run_file.equilibration_steps)
                .unwrap_or(defaults.equilibration_steps),
        )
        .production_steps(
            args.production
                .or(run_file.production_steps)
                .unwrap_or(defaults.production_steps),
        )
        .seed(args.seed.or(run_file.seed).unwrap_or(defaults.seed));
    if let Some(displacement) = displacement {
        builder = builder.displacement(displacement);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Resolved configuration: {:?}", core_config);

    Ok(AppConfig {
        report_path: args.output.clone(),
        bias_csv_path: args.bias_csv.clone(),
        core_config,
    })
}

fn merge_displacement(
    cli_no_displacement: bool,
    file_val: Option<FileDisplacementConfig>,
    defaults: &DefaultsConfig,
) -> Option<core_config::DisplacementConfig> {
    let file_val = file_val.unwrap_or_default();
    if cli_no_displacement || file_val.enabled == Some(false) {
        return None;
    }

    let frequency = file_val
        .frequency
        .unwrap_or(defaults.displacement_frequency);
    let selection = if file_val.per_particle.unwrap_or(true) {
        core_config::MoveConfig::per_particle(frequency)
    } else {
        core_config::MoveConfig::new(frequency)
    };

    let mut step = core_config::StepSizeConfig::bounded(
        file_val
            .initial_step
            .unwrap_or(defaults.displacement_initial_step),
        file_val.min_step.unwrap_or(0.0),
        file_val
            .max_step
            .unwrap_or(defaults.displacement_max_step),
    );
    if let Some(interval) = file_val.adjust_interval {
        step.adjust_interval = interval;
    }
    if let Some(target) = file_val.acceptance_target {
        step.acceptance_target = target;
    }
    Some(core_config::DisplacementConfig { selection, step })
}

fn parse_value<T: FromStr>(key: &str, value_str: &str, kind: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let (key, value_str) = (key.trim(), value_str.trim());

        match key {
            "system.temperature" => {
                config.system.get_or_insert_with(Default::default).temperature =
                    Some(parse_value(key, value_str, "float")?);
            }
            "system.chemical-potential" => {
                config
                    .system
                    .get_or_insert_with(Default::default)
                    .chemical_potential = Some(parse_value(key, value_str, "float")?);
            }
            "system.box-length" => {
                let length: f64 = parse_value(key, value_str, "float")?;
                config.system.get_or_insert_with(Default::default).box_lengths =
                    Some([length; 3]);
            }
            "system.potential" => {
                let potential = match value_str {
                    "ideal-gas" => FilePotential::IdealGas,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Only 'ideal-gas' can be set for {}; parameterized potentials belong in the config file.",
                            key
                        )));
                    }
                };
                config.system.get_or_insert_with(Default::default).potential = Some(potential);
            }
            "window.fixed-n" => {
                config.window.get_or_insert_with(Default::default).fixed_n =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "window.max-delta-n" => {
                config.window.get_or_insert_with(Default::default).max_delta_n =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "moves.insert-delete.frequency" => {
                config
                    .moves
                    .get_or_insert_with(Default::default)
                    .insert_delete
                    .get_or_insert_with(Default::default)
                    .frequency = Some(parse_value(key, value_str, "integer")?);
            }
            "moves.displacement.frequency" => {
                config
                    .moves
                    .get_or_insert_with(Default::default)
                    .displacement
                    .get_or_insert_with(Default::default)
                    .frequency = Some(parse_value(key, value_str, "integer")?);
            }
            "moves.displacement.max-step" => {
                config
                    .moves
                    .get_or_insert_with(Default::default)
                    .displacement
                    .get_or_insert_with(Default::default)
                    .max_step = Some(parse_value(key, value_str, "float")?);
            }
            "overlap.num-alpha" => {
                config.overlap.get_or_insert_with(Default::default).num_alpha =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "overlap.alpha-span" => {
                config.overlap.get_or_insert_with(Default::default).alpha_span =
                    Some(parse_value(key, value_str, "float")?);
            }
            "bias.update-interval" => {
                config.bias.get_or_insert_with(Default::default).update_interval =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "bias.lower-wall" => {
                config.bias.get_or_insert_with(Default::default).lower_wall =
                    Some(parse_value(key, value_str, "float")?);
            }
            "bias.upper-extrapolation" => {
                let upper = match value_str {
                    "chemical-potential" => FileUpperExtrapolation::ChemicalPotential,
                    "last-slope" => FileUpperExtrapolation::LastSlope,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {}: {}. Expected 'chemical-potential' or 'last-slope'.",
                            key, value_str
                        )));
                    }
                };
                config
                    .bias
                    .get_or_insert_with(Default::default)
                    .upper_extrapolation = Some(upper);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("sim.toml");
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn run_args(config_path: Option<&Path>, extra: &[&str]) -> RunArgs {
        let mut args = vec!["mcengine".to_string(), "run".to_string()];
        if let Some(path) = config_path {
            args.push("-c".to_string());
            args.push(path.to_str().unwrap().to_string());
        }
        args.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(args).command {
            Commands::Run(args) => args,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = build_config(&run_args(None, &[])).unwrap();
        let core = &config.core_config;
        let defaults = DefaultsConfig::default();

        assert_eq!(core.temperature, defaults.temperature);
        assert_eq!(core.chemical_potential, defaults.chemical_potential);
        assert_eq!(core.window.fixed_n, defaults.fixed_n);
        assert_eq!(core.potential, core_config::PotentialConfig::IdealGas);
        assert_eq!(core.overlap, core_config::OverlapConfig::default());
        let displacement = core.displacement.as_ref().unwrap();
        assert!(displacement.selection.per_particle);
        assert_eq!(displacement.step.max, defaults.displacement_max_step);
        assert!(config.report_path.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [system]
            temperature = 2.0
            box-lengths = [6.0, 6.0, 6.0]
            potential = { type = "hard-sphere", sigma = 1.0 }

            [window]
            fixed-n = 12
            max-delta-n = 4

            [moves.displacement]
            per-particle = false
            frequency = 30
            acceptance-target = 0.4

            [bias]
            update-interval = 5000
            upper-extrapolation = "last-slope"

            [run]
            production-steps = 2000
            "#,
        );
        let core = build_config(&run_args(Some(&path), &[])).unwrap().core_config;

        assert_eq!(core.temperature, 2.0);
        assert_eq!(core.box_lengths, [6.0; 3]);
        assert_eq!(
            core.potential,
            core_config::PotentialConfig::HardSphere { sigma: 1.0 }
        );
        assert_eq!(core.window, core_config::ParticleWindow::new(12, 4));
        let displacement = core.displacement.unwrap();
        assert_eq!(displacement.selection, core_config::MoveConfig::new(30));
        assert_eq!(displacement.step.acceptance_target, 0.4);
        assert_eq!(core.bias_update.interval, 5000);
        assert_eq!(
            core.bias_update.upper,
            core_config::UpperExtrapolation::LastSlope
        );
        assert_eq!(core.production_steps, 2000);
        assert_eq!(core.equilibration_steps, DefaultsConfig::default().equilibration_steps);
    }

    #[test]
    fn cli_args_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [system]
            temperature = 2.0
            chemical-potential = -1.0

            [run]
            seed = 3
            "#,
        );
        let args = run_args(
            Some(&path),
            &["-T", "1.5", "-m", "-4.0", "--seed", "11", "--no-displacement", "-o", "out.toml"],
        );
        let config = build_config(&args).unwrap();

        assert_eq!(config.core_config.temperature, 1.5);
        assert_eq!(config.core_config.chemical_potential, -4.0);
        assert_eq!(config.core_config.seed, 11);
        assert!(config.core_config.displacement.is_none());
        assert_eq!(config.report_path, Some(PathBuf::from("out.toml")));
    }

    #[test]
    fn set_values_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[window]\nfixed-n = 30\n");
        let args = run_args(
            Some(&path),
            &[
                "-S",
                "window.fixed-n=40",
                "-S",
                "overlap.num-alpha=21",
                "-S",
                "bias.upper-extrapolation=last-slope",
                "-S",
                "system.box-length=12.5",
            ],
        );
        let core = build_config(&args).unwrap().core_config;

        assert_eq!(core.window.fixed_n, 40);
        assert_eq!(core.overlap.num_alpha, 21);
        assert_eq!(
            core.bias_update.upper,
            core_config::UpperExtrapolation::LastSlope
        );
        assert_eq!(core.box_lengths, [12.5; 3]);
    }

    #[test]
    fn invalid_set_values_are_reported() {
        for bad in ["window.fixed-n", "window.fixed-n=many", "unknown.key=1"] {
            let result = build_config(&run_args(None, &["-S", bad]));
            assert!(matches!(result, Err(CliError::Config(_))), "accepted {bad}");
        }
    }

    #[test]
    fn invalid_engine_values_surface_as_config_errors() {
        let result = build_config(&run_args(None, &["-T", "0"]));
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("temperature")),
            _ => panic!("Expected a configuration error"),
        }
    }
}
