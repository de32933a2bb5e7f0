//! Verification runner.
//!
//! Runs one [`Scenario`] end to end and always tears the browser down, whether
//! the run passes, fails, or panics.

use crate::capture::{Artifact, ArtifactCapturer};
use crate::config::Scenario;
use crate::driver::{Launcher, PageDriver};
use crate::network::{InterceptRecord, Interceptor};
use crate::result::{ErrorKind, HarnessError, HarnessResult};
use crate::script::{StepExecutor, StepReport};
use crate::session::{HarnessState, Session};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Error as carried in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Error class
    pub kind: ErrorKind,
    /// Full message
    pub message: String,
}

impl From<&HarnessError> for FailureInfo {
    fn from(e: &HarnessError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every step held and the success artifact was written
    Passed {
        /// Success screenshot
        artifact: Artifact,
    },
    /// A stage failed
    Failed {
        /// What went wrong
        error: FailureInfo,
        /// Failure screenshot, if one could be taken
        artifact: Option<Artifact>,
    },
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name
    pub scenario: String,
    /// Pass or fail
    pub outcome: Outcome,
    /// States visited
    pub states: Vec<HarnessState>,
    /// Completed steps
    pub steps: Vec<StepReport>,
    /// Interception decisions
    pub intercepts: Vec<InterceptRecord>,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Total duration
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether the run passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed { .. })
    }

    /// The artifact for this outcome, if any
    #[must_use]
    pub const fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            Outcome::Passed { artifact } => Some(artifact),
            Outcome::Failed { artifact, .. } => artifact.as_ref(),
        }
    }

    /// The failure, if the run failed
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureInfo> {
        match &self.outcome {
            Outcome::Passed { .. } => None,
            Outcome::Failed { error, .. } => Some(error),
        }
    }

    /// Final harness state
    #[must_use]
    pub fn final_state(&self) -> Option<HarnessState> {
        self.states.last().copied()
    }
}

/// One scenario bound to a browser launcher
#[derive(Debug)]
pub struct Verification<L: Launcher> {
    scenario: Scenario,
    launcher: L,
}

impl<L: Launcher> Verification<L> {
    /// Bind a scenario to a launcher
    #[must_use]
    pub const fn new(scenario: Scenario, launcher: L) -> Self {
        Self { scenario, launcher }
    }

    /// Scenario to be run
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Run the scenario.
    ///
    /// Stage failures (launch, routes, navigation, steps, audit, capture) are
    /// reported in [`RunReport::outcome`].
    ///
    /// # Errors
    ///
    /// Only scenario problems found before a browser is launched: invalid
    /// configuration or fixtures that cannot be rendered.
    ///
    /// # Panics
    ///
    /// A panic inside the exercised flow is re-raised after teardown.
    pub async fn run(self) -> HarnessResult<RunReport> {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let Self { scenario, launcher } = self;

        scenario.validate()?;
        let capturer = ArtifactCapturer::new(scenario.artifacts.clone())?;
        let interceptor = Arc::new(scenario.fixture_library()?.interceptor());
        let executor = StepExecutor::new(
            scenario.base_url.clone(),
            scenario.timeouts,
            scenario.artifacts.clone(),
        );
        info!(scenario = %scenario.name, target = %scenario.target_url(), "verification starting");

        let mut session = match Session::start(launcher, &scenario.browser, executor).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "browser session could not start");
                return Ok(RunReport {
                    scenario: scenario.name,
                    outcome: Outcome::Failed {
                        error: FailureInfo::from(&e),
                        artifact: None,
                    },
                    states: vec![
                        HarnessState::Init,
                        HarnessState::Failed,
                        HarnessState::TornDown,
                    ],
                    steps: Vec::new(),
                    intercepts: Vec::new(),
                    started_at,
                    elapsed: clock.elapsed(),
                });
            }
        };

        let mut steps = Vec::new();
        let exercised = AssertUnwindSafe(exercise(
            &mut session,
            &scenario,
            &capturer,
            &interceptor,
            &mut steps,
        ))
        .catch_unwind()
        .await;

        let outcome = match exercised {
            Ok(Ok(artifact)) => {
                info!(path = %artifact.path.display(), "verification passed");
                Outcome::Passed { artifact }
            }
            Ok(Err(e)) => {
                error!(error = %e, kind = %e.kind(), "verification failed");
                let artifact = session.capture_failure(&capturer).await;
                Outcome::Failed {
                    error: FailureInfo::from(&e),
                    artifact,
                }
            }
            Err(payload) => {
                error!("verification panicked; tearing down before unwinding");
                if let Err(e) = session.stop().await {
                    warn!(error = %e, "teardown after panic failed");
                }
                panic::resume_unwind(payload);
            }
        };

        if let Err(e) = session.stop().await {
            warn!(error = %e, "teardown failed");
        }

        Ok(RunReport {
            scenario: scenario.name,
            outcome,
            states: session.trail().states().to_vec(),
            steps,
            intercepts: interceptor.records(),
            started_at,
            elapsed: clock.elapsed(),
        })
    }
}

/// Routes, navigation, steps, audit, success capture
async fn exercise<D: PageDriver>(
    session: &mut Session<D>,
    scenario: &Scenario,
    capturer: &ArtifactCapturer,
    interceptor: &Arc<Interceptor>,
    steps: &mut Vec<StepReport>,
) -> HarnessResult<Artifact> {
    session.register_routes(Arc::clone(interceptor)).await?;
    session.navigate(&scenario.target).await?;
    session.run_steps(&scenario.steps, steps).await?;
    interceptor.audit()?;
    session.capture_success(capturer).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::ArtifactConfig;
    use crate::config::FixtureSpec;
    use crate::driver::{MockDom, MockDriver, MockElement};
    use crate::script::InteractionStep;
    use crate::session::TEST_SESSION_LOCK;
    use crate::wait::{Timeouts, WaitState};

    fn scenario(dir: &std::path::Path) -> Scenario {
        Scenario {
            name: "unit".to_string(),
            base_url: "http://localhost:3000".to_string(),
            target: "/index.html".to_string(),
            browser: crate::browser::BrowserConfig::default(),
            timeouts: Timeouts::default().with_step(200).with_settle(0),
            artifacts: ArtifactConfig {
                dir: dir.to_path_buf(),
                success: "ok.png".into(),
                failure: "fail.png".into(),
            },
            fixtures: vec![FixtureSpec::Static {
                name: "config".to_string(),
                pattern: crate::config::PatternSpec::Glob("**/config.json".to_string()),
                status: 200,
                content_type: "application/json".to_string(),
                body: "{}".to_string(),
            }],
            steps: vec![InteractionStep::wait_for("main", WaitState::Visible)],
        }
    }

    #[tokio::test]
    async fn test_pass_writes_success_artifact_only() {
        let _lock = TEST_SESSION_LOCK.lock().await;
        let tmp = tempfile::tempdir().unwrap();
        let driver = MockDriver::new()
            .with_resource("http://localhost:3000/config.json")
            .with_app(|_| Ok(MockDom::new().with(MockElement::new("main"))));
        let probe = driver.probe();
        let report = Verification::new(scenario(tmp.path()), driver)
            .run()
            .await
            .unwrap();
        assert!(report.passed());
        assert!(tmp.path().join("ok.png").exists());
        assert!(!tmp.path().join("fail.png").exists());
        assert_eq!(report.final_state(), Some(HarnessState::TornDown));
        assert_eq!(report.intercepts.len(), 2);
        assert_eq!(report.intercepts.iter().filter(|r| r.fulfilled()).count(), 1);
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_failure_takes_failure_path() {
        let _lock = TEST_SESSION_LOCK.lock().await;
        let tmp = tempfile::tempdir().unwrap();
        let driver = MockDriver::new();
        let probe = driver.probe();
        let report = Verification::new(scenario(tmp.path()), driver)
            .run()
            .await
            .unwrap();
        assert_eq!(report.failure().unwrap().kind, ErrorKind::StepTimeout);
        assert!(report.artifact().unwrap().path.ends_with("fail.png"));
        assert!(report.states.contains(&HarnessState::CapturedFailure));
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let _lock = TEST_SESSION_LOCK.lock().await;
        let tmp = tempfile::tempdir().unwrap();
        let report = Verification::new(
            scenario(tmp.path()),
            MockDriver::new().failing_launch("chromium not found"),
        )
        .run()
        .await
        .unwrap();
        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::Launch);
        assert!(failure.message.contains("chromium not found"));
        assert!(report.artifact().is_none());
        assert_eq!(
            report.states,
            vec![HarnessState::Init, HarnessState::Failed, HarnessState::TornDown]
        );
        assert_eq!(report.final_state(), Some(HarnessState::TornDown));
    }

    #[tokio::test]
    async fn test_invalid_scenario_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bad = scenario(tmp.path());
        bad.steps.clear();
        let err = Verification::new(bad, MockDriver::new()).run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
    }

    #[tokio::test]
    async fn test_settle_longer_than_navigation_is_rejected_up_front() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bad = scenario(tmp.path());
        bad.timeouts = Timeouts::default().with_navigation(200).with_settle(250);
        let driver = MockDriver::new();
        let probe = driver.probe();
        let err = Verification::new(bad, driver).run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_routes_fail_the_audit() {
        let _lock = TEST_SESSION_LOCK.lock().await;
        let tmp = tempfile::tempdir().unwrap();
        let mut overlapping = scenario(tmp.path());
        overlapping.fixtures.push(FixtureSpec::Static {
            name: "everything".to_string(),
            pattern: crate::config::PatternSpec::Glob("**".to_string()),
            status: 200,
            content_type: "text/plain".to_string(),
            body: String::new(),
        });
        let driver = MockDriver::new()
            .with_resource("http://localhost:3000/config.json")
            .with_app(|_| Ok(MockDom::new().with(MockElement::new("main"))));
        let report = Verification::new(overlapping, driver).run().await.unwrap();
        assert_eq!(report.failure().unwrap().kind, ErrorKind::RouteMismatch);
        assert!(report.artifact().is_some());
    }
}
