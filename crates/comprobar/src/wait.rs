//! Wait Mechanisms
//!
//! Bounded polling of element state. Every wait has an explicit deadline; a
//! condition that never holds resolves to a timeout instead of hanging.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: Automatic detection of ready state
//! - **Poka-Yoke**: Type-safe wait conditions prevent invalid waits
//! - **Muda**: Polling interval keeps CPU use bounded

use crate::driver::{ElementState, PageDriver};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default navigation timeout (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default per-step timeout (10 seconds)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Default settle window after the load event (250ms)
pub const DEFAULT_SETTLE_MS: u64 = 250;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Every time bound used by a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Load event deadline
    pub navigation_ms: u64,
    /// Default deadline for a wait or expectation step
    pub step_ms: u64,
    /// Time the page may run after load before script errors are collected
    pub settle_ms: u64,
    /// Interval between element state polls
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            step_ms: DEFAULT_STEP_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Timeouts {
    /// Set navigation timeout in milliseconds
    #[must_use]
    pub const fn with_navigation(mut self, ms: u64) -> Self {
        self.navigation_ms = ms;
        self
    }

    /// Set step timeout in milliseconds
    #[must_use]
    pub const fn with_step(mut self, ms: u64) -> Self {
        self.step_ms = ms;
        self
    }

    /// Set settle window in milliseconds
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Navigation deadline
    #[must_use]
    pub const fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Settle window
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject zero bounds and a settle window that cannot fit in navigation
    pub fn validate(&self) -> HarnessResult<()> {
        for (name, value) in [
            ("navigation_ms", self.navigation_ms),
            ("step_ms", self.step_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(HarnessError::config(format!("timeouts.{name} must be > 0")));
            }
        }
        // Settle runs inside the navigation deadline
        if self.settle_ms >= self.navigation_ms {
            return Err(HarnessError::config(format!(
                "timeouts.settle_ms ({}) must be less than timeouts.navigation_ms ({})",
                self.settle_ms, self.navigation_ms
            )));
        }
        Ok(())
    }
}

// =============================================================================
// WAIT STATE
// =============================================================================

/// Element condition a `WaitFor` step blocks on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// Present in the DOM, rendered or not
    #[default]
    Attached,
    /// Present with a non-empty box and not hidden
    Visible,
    /// Absent or not rendered
    Hidden,
    /// Absent from the DOM
    Detached,
}

impl WaitState {
    /// Whether `state` satisfies this condition
    #[must_use]
    pub const fn is_met(&self, state: &ElementState) -> bool {
        match self {
            Self::Attached => state.attached,
            Self::Visible => state.attached && state.visible,
            Self::Hidden => !state.attached || !state.visible,
            Self::Detached => !state.attached,
        }
    }

    /// Lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Detached => "detached",
        }
    }
}

impl std::fmt::Display for WaitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `selector` until `condition` holds or `timeout` elapses.
///
/// Returns the satisfying state, or `None` once the deadline passes. Driver
/// calls are themselves bounded by the same deadline.
pub async fn poll_element<D, F>(
    driver: &mut D,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut condition: F,
) -> HarnessResult<Option<ElementState>>
where
    D: PageDriver + ?Sized,
    F: FnMut(&ElementState) -> bool + Send,
{
    let deadline = Instant::now() + timeout;
    let mut polls = 0_u32;
    loop {
        polls += 1;
        let Ok(state) = tokio::time::timeout_at(deadline, driver.element_state(selector)).await
        else {
            debug!(selector, polls, "driver call ran past the deadline");
            return Ok(None);
        };
        let state = state?;
        if condition(&state) {
            debug!(selector, polls, count = state.count, "condition met");
            return Ok(Some(state));
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(selector, polls, "condition not met before deadline");
            return Ok(None);
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDom, MockDriver, MockElement};

    mod timeouts_tests {
        use super::*;

        #[test]
        fn test_defaults_are_explicit() {
            let t = Timeouts::default();
            assert_eq!(t.navigation_ms, 30_000);
            assert_eq!(t.step_ms, 10_000);
            assert_eq!(t.settle_ms, 250);
            assert_eq!(t.poll_interval_ms, 50);
        }

        #[test]
        fn test_zero_rejected() {
            assert!(Timeouts::default().with_step(0).validate().is_err());
            assert!(Timeouts::default().with_navigation(0).validate().is_err());
            assert!(Timeouts::default().with_settle(0).validate().is_ok());
        }

        #[test]
        fn test_settle_must_fit_inside_navigation() {
            let err = Timeouts::default()
                .with_navigation(200)
                .with_settle(250)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("settle_ms (250)"));
            assert!(Timeouts::default()
                .with_navigation(250)
                .with_settle(250)
                .validate()
                .is_err());
            assert!(Timeouts::default()
                .with_navigation(300)
                .with_settle(250)
                .validate()
                .is_ok());
        }
    }

    mod wait_state_tests {
        use super::*;

        fn state(attached: bool, visible: bool) -> ElementState {
            ElementState {
                count: usize::from(attached),
                attached,
                visible,
                enabled: true,
                editable: false,
            }
        }

        #[test]
        fn test_presence_and_visibility_are_distinct() {
            let hidden_node = state(true, false);
            assert!(WaitState::Attached.is_met(&hidden_node));
            assert!(!WaitState::Visible.is_met(&hidden_node));
            assert!(WaitState::Hidden.is_met(&hidden_node));
            assert!(!WaitState::Detached.is_met(&hidden_node));
        }

        #[test]
        fn test_absent_element() {
            let gone = ElementState::detached();
            assert!(WaitState::Detached.is_met(&gone));
            assert!(WaitState::Hidden.is_met(&gone));
            assert!(!WaitState::Attached.is_met(&gone));
        }

        #[test]
        fn test_yaml_names() {
            let s: WaitState = serde_yaml_ng::from_str("visible").unwrap();
            assert_eq!(s, WaitState::Visible);
            assert_eq!(WaitState::Detached.to_string(), "detached");
        }
    }

    mod polling_tests {
        use super::*;

        async fn loaded(dom: MockDom) -> MockDriver {
            let mut driver = MockDriver::new().with_app(move |_| Ok(dom.clone()));
            driver
                .navigate("http://localhost/", Duration::ZERO)
                .await
                .unwrap();
            driver
        }

        #[tokio::test(start_paused = true)]
        async fn test_never_appearing_selector_times_out_on_deadline() {
            let mut driver = loaded(MockDom::new()).await;
            let start = Instant::now();
            let result = poll_element(
                &mut driver,
                "#missing",
                Duration::from_millis(500),
                Duration::from_millis(50),
                |s| WaitState::Attached.is_met(s),
            )
            .await
            .unwrap();
            assert!(result.is_none());
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(500));
            assert!(elapsed <= Duration::from_millis(550));
        }

        #[tokio::test(start_paused = true)]
        async fn test_late_element_is_found() {
            let dom = MockDom::new()
                .with(MockElement::rows("tr", 2).appearing_after(Duration::from_millis(120)));
            let mut driver = loaded(dom).await;
            let state = poll_element(
                &mut driver,
                "tr",
                Duration::from_secs(1),
                Duration::from_millis(50),
                |s| s.count == 2,
            )
            .await
            .unwrap()
            .unwrap();
            assert_eq!(state.count, 2);
        }
    }
}
