//! Comprobador: command-line front end for Comprobar
//!
//! ## Usage
//!
//! ```bash
//! comprobador init                          # Write comprobar.yaml
//! comprobador check comprobar.yaml          # Validate a scenario
//! comprobador fixtures --name auth          # Show a rendered fixture
//! comprobador run --scenario comprobar.yaml # Verify in headless Chromium
//! ```

use clap::Parser;
use comprobador::{handlers, logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init_logging(&config);

    match cli.command {
        Commands::Run(args) => handlers::run(&config, &args),
        Commands::Check(args) => handlers::check(&config, &args),
        Commands::Fixtures(args) => handlers::fixtures(&config, &args),
        Commands::Init(args) => handlers::init(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}
