//! Comprobador CLI Library
//!
//! Command-line interface for the Comprobar verification harness.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, FixturesArgs, InitArgs, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{failure_lines, success_line, Reporter};
