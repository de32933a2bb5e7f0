//! Subcommand handlers

use crate::commands::{CheckArgs, FixturesArgs, InitArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crate::runner;
use comprobar::{RunReport, Scenario};

fn reporter(config: &CliConfig) -> Reporter {
    Reporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet(),
        config.verbosity.is_verbose(),
    )
}

/// `run`: execute a scenario in the browser
pub fn run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let scenario = runner::prepare(args)?;
    let report = runner::run_in_browser(scenario)?;
    finish(config, args.json, &report)
}

/// Print a report and turn a failed run into an error
pub fn finish(config: &CliConfig, json: bool, report: &RunReport) -> CliResult<()> {
    if json {
        reporter(config).line(&serde_json::to_string_pretty(report)?);
    } else {
        reporter(config).report(report);
    }
    match report.failure() {
        None => Ok(()),
        Some(failure) => Err(CliError::verification(format!(
            "scenario '{}' ended with {}",
            report.scenario, failure.kind
        ))),
    }
}

/// `check`: parse and validate a scenario file
pub fn check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    let scenario = Scenario::load(&args.scenario)?;
    scenario.validate()?;
    let library = scenario.fixture_library()?;
    reporter(config).success(&format!(
        "Scenario '{}' is valid: {} fixture(s), {} step(s), target {}",
        scenario.name,
        library.len(),
        scenario.steps.len(),
        scenario.target_url()
    ));
    Ok(())
}

/// `fixtures`: print rendered fixture bodies
pub fn fixtures(config: &CliConfig, args: &FixturesArgs) -> CliResult<()> {
    let scenario = runner::load_scenario(args.scenario.as_deref())?;
    let library = scenario.fixture_library()?;
    let out = reporter(config);

    if let Some(name) = &args.name {
        let fixture = library
            .get(name)
            .ok_or_else(|| CliError::invalid_argument(format!("no fixture named '{name}'")))?;
        out.fixture(fixture.name(), &fixture.pattern().to_string(), &fixture.body());
        return Ok(());
    }
    for fixture in library.iter() {
        out.fixture(fixture.name(), &fixture.pattern().to_string(), &fixture.body());
    }
    Ok(())
}

/// `init`: write the built-in scenario
pub fn init(config: &CliConfig, args: &InitArgs) -> CliResult<()> {
    if args.path.exists() && !args.force {
        return Err(CliError::invalid_argument(format!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        )));
    }
    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.path, Scenario::admin_dashboard().to_yaml()?)?;
    reporter(config).wrote(&args.path);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{ColorChoice, Verbosity};
    use std::path::PathBuf;

    fn quiet() -> CliConfig {
        CliConfig::new()
            .with_verbosity(Verbosity::Quiet)
            .with_color(ColorChoice::Never)
    }

    mod init_tests {
        use super::*;

        #[test]
        fn test_init_then_check() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("nested").join("comprobar.yaml");
            init(
                &quiet(),
                &InitArgs {
                    path: path.clone(),
                    force: false,
                },
            )
            .unwrap();
            check(&quiet(), &CheckArgs { scenario: path }).unwrap();
        }

        #[test]
        fn test_init_refuses_to_overwrite() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("comprobar.yaml");
            std::fs::write(&path, "keep me").unwrap();
            let args = InitArgs {
                path: path.clone(),
                force: false,
            };
            let err = init(&quiet(), &args).unwrap_err();
            assert!(err.to_string().contains("--force"));
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

            init(&quiet(), &InitArgs { path, force: true }).unwrap();
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_check_rejects_empty_steps() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("bad.yaml");
            let mut scenario = Scenario::admin_dashboard();
            scenario.steps.clear();
            std::fs::write(&path, scenario.to_yaml().unwrap()).unwrap();
            let err = check(&quiet(), &CheckArgs { scenario: path }).unwrap_err();
            assert!(err.to_string().contains("no steps"));
        }

        #[test]
        fn test_check_missing_file() {
            let args = CheckArgs {
                scenario: PathBuf::from("missing.yaml"),
            };
            assert!(check(&quiet(), &args).is_err());
        }
    }

    mod fixtures_tests {
        use super::*;

        #[test]
        fn test_unknown_fixture_name() {
            let args = FixturesArgs {
                scenario: None,
                name: Some("payments".to_string()),
            };
            let err = fixtures(&quiet(), &args).unwrap_err();
            assert!(err.to_string().contains("payments"));
        }

        #[test]
        fn test_builtin_fixtures_print() {
            fixtures(&quiet(), &FixturesArgs::default()).unwrap();
        }
    }
}
