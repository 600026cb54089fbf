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
    author,
    version,
    about = "solidfe CLI - Free energies of crystalline solids by nonequilibrium switching to an Einstein crystal with LAMMPS.",
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

    /// Number of kernels run side by side.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the free energy calculations listed in a configuration file.
    Run(RunArgs),
    /// Check a configuration file and summarize its calculations without running them.
    Validate(ValidateArgs),
}

/// Where the calculations come from and how they are overridden.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override a configuration value, e.g. `-S md.n-cycles=50`.
    /// Can be used multiple times.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    /// Command launching LAMMPS, e.g. "mpirun -np 4 lmp".
    /// Overrides `engine.command` from the config file.
    #[arg(long, value_name = "CMD")]
    pub lammps: Option<String>,

    /// Skip the solid-fraction check after equilibration.
    #[arg(long)]
    pub no_melt_check: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory receiving one scratch folder per calculation.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub workdir: PathBuf,

    /// Run only the calculation at this 1-based position in the file.
    /// Can be used multiple times.
    #[arg(short = 'k', long = "kernel", value_name = "INDEX")]
    pub kernels: Vec<usize>,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}
