//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Comprobador: CLI for Comprobar - headless-browser verification harness
#[derive(Parser, Debug)]
#[command(name = "comprobador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a verification scenario against a live application
    Run(RunArgs),

    /// Parse and validate a scenario file
    Check(CheckArgs),

    /// Print the rendered fixture bodies of a scenario
    Fixtures(FixturesArgs),

    /// Write the built-in admin dashboard scenario as YAML
    Init(InitArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Scenario file (default: built-in admin dashboard scenario)
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Override the application base URL
    #[arg(long, env = "COMPROBAR_BASE_URL")]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Override the artifact directory
    #[arg(short, long)]
    pub artifacts: Option<PathBuf>,

    /// Step timeout in milliseconds
    #[arg(long)]
    pub step_timeout: Option<u64>,

    /// Navigation timeout in milliseconds
    #[arg(long)]
    pub navigation_timeout: Option<u64>,

    /// Path to the chromium executable
    #[arg(long, env = "COMPROBAR_CHROMIUM")]
    pub chromium: Option<String>,

    /// Disable the browser sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Emit the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Scenario file to validate
    pub scenario: PathBuf,
}

/// Arguments for the fixtures command
#[derive(Parser, Debug, Default)]
pub struct FixturesArgs {
    /// Scenario file (default: built-in admin dashboard scenario)
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Only print the fixture with this name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file
    #[arg(default_value = "comprobar.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
