//! Diagnostic logging to stderr.
//!
//! `RUST_LOG` wins when set; otherwise the filter comes from `-q`/`-v`.

use crate::config::{CliConfig, Verbosity};
use tracing_subscriber::EnvFilter;

/// Build the filter for a verbosity level
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &CliConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.verbosity))
        .with_target(config.verbosity.is_verbose())
        .with_ansi(config.color.should_color())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn test_filter_builds_for_every_level() {
        for level in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Debug,
        ] {
            let _ = env_filter(level);
        }
    }
}
