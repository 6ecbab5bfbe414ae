use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "mcengine contributors",
    version,
    about = "mcengine CLI - biased grand-canonical Monte Carlo sampling with adaptive step sizes and overlap-sampling bias refinement.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a biased grand-canonical simulation and write a report.
    Run(RunArgs),
    /// Print a commented configuration file with every default value.
    Template(TemplateArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the simulation configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path for the TOML report. Only a summary is printed when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the final bias table as `n,ln_bias` CSV rows.
    #[arg(long, value_name = "PATH")]
    pub bias_csv: Option<PathBuf>,

    // --- Thermodynamic Overrides ---
    /// Override `system.temperature` from the config file.
    #[arg(short = 'T', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Override `system.chemical-potential` from the config file.
    #[arg(short = 'm', long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub chemical_potential: Option<f64>,

    // --- Run Overrides ---
    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of equilibration steps.
    #[arg(long, value_name = "INT")]
    pub equilibration: Option<u64>,

    /// Override the number of production steps.
    #[arg(long, value_name = "INT")]
    pub production: Option<u64>,

    /// Disable the displacement move, even if it is defined in the config file.
    #[arg(long)]
    pub no_displacement: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S window.max-delta-n=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `template` subcommand.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Write the template to a file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
