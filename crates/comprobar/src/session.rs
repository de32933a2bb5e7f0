//! Session Controller
//!
//! Owns the browser for one verification run: launch, route registration,
//! navigation, step execution, capture and teardown. Every move is checked
//! against the harness state machine:
//!
//! ```text
//! INIT → ROUTES_REGISTERED → NAVIGATED → {STEP_i EXECUTING → STEP_i DONE}* → CAPTURED → TORN_DOWN
//!   any step ──► FAILED → CAPTURED(failure) → TORN_DOWN
//! ```
//!
//! `TORN_DOWN` is terminal and reachable from every other state.

use crate::browser::BrowserConfig;
use crate::capture::{Artifact, ArtifactCapturer};
use crate::driver::{Launcher, PageDriver};
use crate::network::Interceptor;
use crate::result::{HarnessError, HarnessResult};
use crate::script::{InteractionStep, StepExecutor, StepReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

// =============================================================================
// HARNESS STATE
// =============================================================================

/// Where a verification run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum HarnessState {
    /// Browser launched, nothing registered
    Init,
    /// Interception rules are live
    RoutesRegistered,
    /// Target page loaded and settled
    Navigated,
    /// Step `i` is running
    StepExecuting(usize),
    /// Step `i` completed
    StepDone(usize),
    /// Success artifact written
    Captured,
    /// A stage failed
    Failed,
    /// Failure path finished its best-effort capture
    CapturedFailure,
    /// Browser released
    TornDown,
}

impl HarnessState {
    /// Whether moving from `self` to `next` is legal
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        use HarnessState::{
            Captured, CapturedFailure, Failed, Init, Navigated, RoutesRegistered, StepDone,
            StepExecuting, TornDown,
        };
        match (self, next) {
            (TornDown, _) => false,
            (_, TornDown) => true,
            (Captured | CapturedFailure, _) => false,
            (Failed, CapturedFailure) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Init, RoutesRegistered) | (RoutesRegistered, Navigated) => true,
            (Navigated, StepExecuting(0)) => true,
            (StepExecuting(i), StepDone(j)) => *i == *j,
            (StepDone(i), StepExecuting(j)) => *j == *i + 1,
            (Navigated | StepDone(_), Captured) => true,
            _ => false,
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown)
    }
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("INIT"),
            Self::RoutesRegistered => f.write_str("ROUTES_REGISTERED"),
            Self::Navigated => f.write_str("NAVIGATED"),
            Self::StepExecuting(i) => write!(f, "STEP_{i} EXECUTING"),
            Self::StepDone(i) => write!(f, "STEP_{i} DONE"),
            Self::Captured => f.write_str("CAPTURED"),
            Self::Failed => f.write_str("FAILED"),
            Self::CapturedFailure => f.write_str("CAPTURED(failure)"),
            Self::TornDown => f.write_str("TORN_DOWN"),
        }
    }
}

/// Every state a run passed through, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    states: Vec<HarnessState>,
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrail {
    /// Trail starting at `INIT`
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![HarnessState::Init],
        }
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> HarnessState {
        self.states
            .last()
            .copied()
            .unwrap_or(HarnessState::Init)
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: HarnessState) -> HarnessResult<()> {
        let current = self.current();
        if !current.can_transition_to(&next) {
            return Err(HarnessError::InvalidState {
                message: format!("{current} cannot move to {next}"),
            });
        }
        info!(from = %current, to = %next, "harness state");
        self.states.push(next);
        Ok(())
    }

    /// All visited states
    #[must_use]
    pub fn states(&self) -> &[HarnessState] {
        &self.states
    }
}

// =============================================================================
// PROCESS GUARD
// =============================================================================

static SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Held while a session exists; at most one per process
#[derive(Debug)]
struct SessionGuard;

impl SessionGuard {
    fn acquire() -> HarnessResult<Self> {
        SESSION_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| HarnessError::SessionActive)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION_LIVE.store(false, Ordering::Release);
    }
}

/// Whether a session is currently live in this process
#[must_use]
pub fn session_active() -> bool {
    SESSION_LIVE.load(Ordering::Acquire)
}

/// Serializes tests that open sessions
#[cfg(test)]
pub(crate) static TEST_SESSION_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

// =============================================================================
// SESSION
// =============================================================================

/// One browser, one page, one run.
///
/// [`Session::stop`] must be awaited on every exit path; it releases the
/// browser exactly once and later calls are no-ops.
#[derive(Debug)]
pub struct Session<D: PageDriver> {
    driver: Option<D>,
    trail: StateTrail,
    executor: StepExecutor,
    interceptor: Option<Arc<Interceptor>>,
    _guard: SessionGuard,
}

impl<D: PageDriver> Session<D> {
    /// Launch a browser and open its page.
    ///
    /// # Errors
    ///
    /// [`HarnessError::SessionActive`] if another session is live, or the
    /// launcher's error.
    pub async fn start<L>(launcher: L, config: &BrowserConfig, executor: StepExecutor) -> HarnessResult<Self>
    where
        L: Launcher<Driver = D>,
    {
        let guard = SessionGuard::acquire()?;
        let driver = launcher.launch(config).await?;
        info!(
            headless = config.headless,
            viewport = %format!("{}x{}", config.viewport_width, config.viewport_height),
            "session started"
        );
        Ok(Self {
            driver: Some(driver),
            trail: StateTrail::new(),
            executor,
            interceptor: None,
            _guard: guard,
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> HarnessState {
        self.trail.current()
    }

    /// States visited so far
    #[must_use]
    pub const fn trail(&self) -> &StateTrail {
        &self.trail
    }

    /// Interceptor registered for this session
    #[must_use]
    pub fn interceptor(&self) -> Option<&Arc<Interceptor>> {
        self.interceptor.as_ref()
    }

    fn driver(&mut self) -> HarnessResult<&mut D> {
        self.driver.as_mut().ok_or_else(torn_down)
    }

    fn ensure(&self, next: HarnessState) -> HarnessResult<()> {
        let current = self.trail.current();
        if current.can_transition_to(&next) {
            Ok(())
        } else {
            Err(HarnessError::InvalidState {
                message: format!("{current} cannot move to {next}"),
            })
        }
    }

    /// Make the interceptor live. Must precede [`Session::navigate`].
    pub async fn register_routes(&mut self, interceptor: Arc<Interceptor>) -> HarnessResult<()> {
        self.ensure(HarnessState::RoutesRegistered)?;
        info!(routes = interceptor.route_count(), "registering routes");
        self.driver()?
            .enable_interception(Arc::clone(&interceptor))
            .await?;
        self.interceptor = Some(interceptor);
        self.trail.advance(HarnessState::RoutesRegistered)
    }

    /// Load the target URL under the navigation timeout
    pub async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.ensure(HarnessState::Navigated)?;
        let driver = self.driver.as_mut().ok_or_else(torn_down)?;
        self.executor.navigate(driver, url).await?;
        self.trail.advance(HarnessState::Navigated)
    }

    /// Run step `index`; steps must be run in order starting at zero
    pub async fn execute_step(&mut self, index: usize, step: &InteractionStep) -> HarnessResult<StepReport> {
        self.trail.advance(HarnessState::StepExecuting(index))?;
        let driver = self.driver.as_mut().ok_or_else(torn_down)?;
        let report = self.executor.execute(driver, index, step).await?;
        self.trail.advance(HarnessState::StepDone(index))?;
        Ok(report)
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// Reports of completed steps are appended to `reports` even on failure.
    pub async fn run_steps(
        &mut self,
        steps: &[InteractionStep],
        reports: &mut Vec<StepReport>,
    ) -> HarnessResult<()> {
        for (index, step) in steps.iter().enumerate() {
            reports.push(self.execute_step(index, step).await?);
        }
        Ok(())
    }

    /// Write the success artifact
    pub async fn capture_success(&mut self, capturer: &ArtifactCapturer) -> HarnessResult<Artifact> {
        self.ensure(HarnessState::Captured)?;
        let artifact = capturer.capture_success(self.driver()?).await?;
        self.trail.advance(HarnessState::Captured)?;
        Ok(artifact)
    }

    /// Enter the failure path and take a best-effort failure screenshot
    pub async fn capture_failure(&mut self, capturer: &ArtifactCapturer) -> Option<Artifact> {
        if self.state() != HarnessState::Failed {
            if let Err(e) = self.trail.advance(HarnessState::Failed) {
                warn!(error = %e, "cannot enter failure path");
                return None;
            }
        }
        let artifact = match self.driver.as_mut() {
            Some(driver) => capturer.capture_failure(driver).await,
            None => None,
        };
        if let Err(e) = self.trail.advance(HarnessState::CapturedFailure) {
            warn!(error = %e, "failure capture not recorded");
        }
        artifact
    }

    /// Release the browser. Runs once; later calls return `Ok`.
    pub async fn stop(&mut self) -> HarnessResult<()> {
        let Some(mut driver) = self.driver.take() else {
            return Ok(());
        };
        let closed = driver.close().await;
        if let Err(e) = &closed {
            warn!(error = %e, "browser did not close cleanly");
        }
        self.trail.advance(HarnessState::TornDown)?;
        info!("session torn down");
        closed
    }

    /// Whether the browser has been released
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.driver.is_none()
    }
}

fn torn_down() -> HarnessError {
    HarnessError::InvalidState {
        message: "session is torn down".to_string(),
    }
}

impl<D: PageDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("session dropped without stop(); browser released by drop");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture::ArtifactConfig;
    use crate::driver::MockDriver;
    use crate::wait::Timeouts;

    fn executor() -> StepExecutor {
        StepExecutor::new(
            "http://localhost:3000",
            Timeouts::default().with_settle(0),
            ArtifactConfig::default(),
        )
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_happy_path_is_legal() {
            let mut trail = StateTrail::new();
            for next in [
                HarnessState::RoutesRegistered,
                HarnessState::Navigated,
                HarnessState::StepExecuting(0),
                HarnessState::StepDone(0),
                HarnessState::StepExecuting(1),
                HarnessState::StepDone(1),
                HarnessState::Captured,
                HarnessState::TornDown,
            ] {
                trail.advance(next).unwrap();
            }
            assert_eq!(trail.states().len(), 9);
            assert!(trail.current().is_terminal());
        }

        #[test]
        fn test_failure_path_is_legal() {
            let mut trail = StateTrail::new();
            trail.advance(HarnessState::RoutesRegistered).unwrap();
            trail.advance(HarnessState::Failed).unwrap();
            trail.advance(HarnessState::CapturedFailure).unwrap();
            trail.advance(HarnessState::TornDown).unwrap();
        }

        #[test]
        fn test_navigate_before_routes_rejected() {
            let mut trail = StateTrail::new();
            let err = trail.advance(HarnessState::Navigated).unwrap_err();
            assert!(err.to_string().contains("INIT cannot move to NAVIGATED"));
        }

        #[test]
        fn test_steps_must_be_in_order() {
            let mut trail = StateTrail::new();
            trail.advance(HarnessState::RoutesRegistered).unwrap();
            trail.advance(HarnessState::Navigated).unwrap();
            assert!(trail.advance(HarnessState::StepExecuting(1)).is_err());
            trail.advance(HarnessState::StepExecuting(0)).unwrap();
            assert!(trail.advance(HarnessState::StepDone(1)).is_err());
        }

        #[test]
        fn test_torn_down_is_terminal_and_reachable_from_all() {
            for from in [
                HarnessState::Init,
                HarnessState::RoutesRegistered,
                HarnessState::Navigated,
                HarnessState::StepExecuting(4),
                HarnessState::StepDone(4),
                HarnessState::Captured,
                HarnessState::Failed,
                HarnessState::CapturedFailure,
            ] {
                assert!(from.can_transition_to(&HarnessState::TornDown), "{from}");
            }
            assert!(!HarnessState::TornDown.can_transition_to(&HarnessState::Init));
            assert!(!HarnessState::TornDown.can_transition_to(&HarnessState::TornDown));
        }

        #[test]
        fn test_display() {
            assert_eq!(HarnessState::StepExecuting(2).to_string(), "STEP_2 EXECUTING");
            assert_eq!(HarnessState::CapturedFailure.to_string(), "CAPTURED(failure)");
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_second_session_is_rejected() {
            let _lock = TEST_SESSION_LOCK.lock().await;
            let mut first = Session::start(MockDriver::new(), &BrowserConfig::default(), executor())
                .await
                .unwrap();
            assert!(session_active());
            let err = Session::start(MockDriver::new(), &BrowserConfig::default(), executor())
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::SessionActive));
            first.stop().await.unwrap();
            drop(first);
            assert!(!session_active());
        }

        #[tokio::test]
        async fn test_stop_closes_exactly_once() {
            let _lock = TEST_SESSION_LOCK.lock().await;
            let driver = MockDriver::new();
            let probe = driver.probe();
            let mut session = Session::start(driver, &BrowserConfig::default(), executor())
                .await
                .unwrap();
            session.stop().await.unwrap();
            session.stop().await.unwrap();
            assert_eq!(probe.close_count(), 1);
            assert_eq!(session.state(), HarnessState::TornDown);
            assert!(session.is_torn_down());
        }

        #[tokio::test]
        async fn test_navigate_requires_registered_routes() {
            let _lock = TEST_SESSION_LOCK.lock().await;
            let driver = MockDriver::new();
            let probe = driver.probe();
            let mut session = Session::start(driver, &BrowserConfig::default(), executor())
                .await
                .unwrap();
            let err = session.navigate("/html/admin.html").await.unwrap_err();
            assert!(matches!(err, HarnessError::InvalidState { .. }));
            assert!(!probe.was_called("navigate"));
            session.stop().await.unwrap();
        }

        #[tokio::test]
        async fn test_routes_enabled_before_first_request() {
            let _lock = TEST_SESSION_LOCK.lock().await;
            let driver = MockDriver::new();
            let probe = driver.probe();
            let mut session = Session::start(driver, &BrowserConfig::default(), executor())
                .await
                .unwrap();
            session
                .register_routes(Arc::new(Interceptor::new()))
                .await
                .unwrap();
            session.navigate("/html/admin.html").await.unwrap();
            session.stop().await.unwrap();
            let calls = probe.calls();
            let enable = calls.iter().position(|c| c.starts_with("enable_interception")).unwrap();
            let nav = calls.iter().position(|c| c.starts_with("navigate")).unwrap();
            assert!(enable < nav);
            assert!(calls.contains(&"navigate:http://localhost:3000/html/admin.html".to_string()));
        }

        #[tokio::test]
        async fn test_launch_failure_releases_guard() {
            let _lock = TEST_SESSION_LOCK.lock().await;
            let err = Session::start(
                MockDriver::new().failing_launch("no chromium"),
                &BrowserConfig::default(),
                executor(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, HarnessError::BrowserLaunch { .. }));
            assert!(!session_active());
        }
    }
}
