//! Scenario loading and execution

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use comprobar::{Launcher, RunReport, Scenario, Verification};
use std::path::Path;
use tracing::{debug, info};

/// Load a scenario file, or the built-in admin dashboard scenario
pub fn load_scenario(path: Option<&Path>) -> CliResult<Scenario> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading scenario");
            Ok(Scenario::load(path)?)
        }
        None => Ok(Scenario::admin_dashboard()),
    }
}

/// Apply command-line overrides to a scenario
pub fn apply_overrides(scenario: &mut Scenario, args: &RunArgs) {
    if let Some(base_url) = &args.base_url {
        scenario.base_url.clone_from(base_url);
    }
    if args.headed {
        scenario.browser.headless = false;
    }
    if let Some(dir) = &args.artifacts {
        scenario.artifacts.dir.clone_from(dir);
    }
    if let Some(ms) = args.step_timeout {
        scenario.timeouts = scenario.timeouts.with_step(ms);
    }
    if let Some(ms) = args.navigation_timeout {
        scenario.timeouts = scenario.timeouts.with_navigation(ms);
    }
    if let Some(path) = &args.chromium {
        scenario.browser.chromium_path = Some(path.clone());
    }
    if args.no_sandbox {
        scenario.browser.sandbox = false;
    }
}

/// Scenario ready to run, with overrides applied and validated
pub fn prepare(args: &RunArgs) -> CliResult<Scenario> {
    let mut scenario = load_scenario(args.scenario.as_deref())?;
    apply_overrides(&mut scenario, args);
    scenario.validate()?;
    Ok(scenario)
}

/// Run a prepared scenario with any launcher
pub async fn execute<L: Launcher>(scenario: Scenario, launcher: L) -> CliResult<RunReport> {
    info!(
        scenario = %scenario.name,
        headless = scenario.browser.headless,
        artifacts = %scenario.artifacts.dir.display(),
        "running scenario"
    );
    Ok(Verification::new(scenario, launcher).run().await?)
}

/// Run a scenario in Chromium on a fresh runtime
#[cfg(feature = "browser")]
pub fn run_in_browser(scenario: Scenario) -> CliResult<RunReport> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    rt.block_on(execute(scenario, comprobar::ChromiumLauncher))
}

/// Browser support was compiled out
#[cfg(not(feature = "browser"))]
pub fn run_in_browser(scenario: Scenario) -> CliResult<RunReport> {
    let _ = scenario;
    Err(CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use comprobar::{ErrorKind, MockDriver};
    use std::path::PathBuf;

    mod override_tests {
        use super::*;

        #[test]
        fn test_no_flags_keep_scenario() {
            let mut scenario = Scenario::admin_dashboard();
            apply_overrides(&mut scenario, &RunArgs::default());
            assert_eq!(scenario, Scenario::admin_dashboard());
        }

        #[test]
        fn test_flags_override_fields() {
            let mut scenario = Scenario::admin_dashboard();
            let args = RunArgs {
                base_url: Some("http://127.0.0.1:8080".to_string()),
                headed: true,
                artifacts: Some(PathBuf::from("out")),
                step_timeout: Some(2_000),
                navigation_timeout: Some(5_000),
                chromium: Some("/usr/bin/chromium".to_string()),
                no_sandbox: true,
                ..RunArgs::default()
            };
            apply_overrides(&mut scenario, &args);
            assert_eq!(
                scenario.target_url(),
                "http://127.0.0.1:8080/html/admin.html"
            );
            assert!(!scenario.browser.headless);
            assert_eq!(scenario.artifacts.dir, PathBuf::from("out"));
            assert_eq!(scenario.timeouts.step_ms, 2_000);
            assert_eq!(scenario.timeouts.navigation_ms, 5_000);
            assert_eq!(
                scenario.browser.chromium_path.as_deref(),
                Some("/usr/bin/chromium")
            );
            assert!(!scenario.browser.sandbox);
        }

        #[test]
        fn test_zero_step_timeout_is_rejected() {
            let args = RunArgs {
                step_timeout: Some(0),
                ..RunArgs::default()
            };
            assert!(prepare(&args).is_err());
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_builtin_when_no_path() {
            let scenario = load_scenario(None).unwrap();
            assert_eq!(scenario.name, "admin_dashboard");
        }

        #[test]
        fn test_missing_file_names_the_path() {
            let err = load_scenario(Some(Path::new("no/such/scenario.yaml"))).unwrap_err();
            assert!(err.to_string().contains("no/such/scenario.yaml"));
        }

        #[test]
        fn test_file_roundtrip() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("s.yaml");
            std::fs::write(&path, Scenario::admin_dashboard().to_yaml().unwrap()).unwrap();
            assert_eq!(
                load_scenario(Some(&path)).unwrap(),
                Scenario::admin_dashboard()
            );
        }
    }

    #[tokio::test]
    async fn test_execute_reports_failure_without_erroring() {
        let tmp = tempfile::tempdir().unwrap();
        let mut scenario = Scenario::admin_dashboard();
        scenario.artifacts.dir = tmp.path().to_path_buf();
        let report = execute(scenario, MockDriver::new().failing_launch("no chromium"))
            .await
            .unwrap();
        assert_eq!(report.failure().unwrap().kind, ErrorKind::Launch);
    }
}
