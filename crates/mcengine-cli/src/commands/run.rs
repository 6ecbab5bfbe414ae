use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mcengine::engine::error::EngineError;
use mcengine::engine::progress::ProgressReporter;
use mcengine::workflows::grand_canonical::{self, GrandCanonicalResult};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Resolving configuration...");
    let config = build_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting grand-canonical sampling: T = {}, mu = {}, N in [{}, {}]",
        config.core_config.temperature,
        config.core_config.chemical_potential,
        config.core_config.window.min_n(),
        config.core_config.window.max_n()
    );
    info!("Invoking the grand-canonical workflow...");
    let result = grand_canonical::run(&config.core_config, &reporter)?;

    write_outputs(&config, &result)?;
    print_summary(&result);
    Ok(())
}

fn write_outputs(config: &AppConfig, result: &GrandCanonicalResult) -> Result<()> {
    if let Some(path) = &config.report_path {
        write_report(path, result)?;
        info!("Report written to {:?}", path);
        println!("✓ Report written to: {}", path.display());
    }
    if let Some(path) = &config.bias_csv_path {
        let file = File::create(path)?;
        result.bias.write_csv(file).map_err(EngineError::from)?;
        info!("Bias table written to {:?}", path);
        println!("✓ Bias table written to: {}", path.display());
    }
    Ok(())
}

fn write_report(path: &Path, result: &GrandCanonicalResult) -> Result<()> {
    let text = toml::to_string_pretty(result)?;
    std::fs::write(path, text).map_err(CliError::Io)
}

fn print_summary(result: &GrandCanonicalResult) {
    println!(
        "Workflow complete: <N> = {:.3}, <U> = {:.4}, final N = {}",
        result.mean_particles, result.mean_energy, result.final_particles
    );
    for summary in &result.moves {
        match summary.acceptance_ratio {
            Some(ratio) => println!(
                "  {:<20} {:>10} trials, acceptance {:.3}",
                summary.name, summary.trials, ratio
            ),
            None => println!("  {:<20} {:>10} trials", summary.name, summary.trials),
        }
    }

    let missing = result.ratios.iter().filter(|r| r.is_nan()).count();
    if missing > 0 {
        warn!(
            missing,
            "Some particle-number pairs have no overlap estimate; extend the run for a complete bias."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut args = vec!["mcengine", "run"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Run(args) => args,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    fn run_writes_report_and_bias_table() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.toml");
        let csv = dir.path().join("bias.csv");
        let args = run_args(&[
            "--equilibration",
            "500",
            "--production",
            "500",
            "--no-displacement",
            "-S",
            "window.fixed-n=10",
            "-S",
            "window.max-delta-n=2",
            "-o",
            report.to_str().unwrap(),
            "--bias-csv",
            csv.to_str().unwrap(),
        ]);

        run(args).unwrap();

        let report_text = std::fs::read_to_string(&report).unwrap();
        assert!(report_text.contains("n_histogram"));
        assert!(report_text.contains("[[moves]]"));
        let csv_text = std::fs::read_to_string(&csv).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(lines.next(), Some("n,ln_bias"));
        assert!(lines.count() >= 1);
    }

    #[test]
    fn invalid_configuration_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.toml");
        let args = run_args(&["-S", "window.max-delta-n=0", "-o", report.to_str().unwrap()]);
        assert!(matches!(run(args), Err(CliError::Config(_))));
        assert!(!report.exists());
    }
}
