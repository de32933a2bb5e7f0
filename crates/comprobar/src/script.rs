//! Interaction Script
//!
//! An ordered list of navigation, wait and act steps. Steps run strictly in
//! order, each blocking until its own completion condition holds. There is no
//! retry: the first failing step aborts the script.

use crate::capture::{write_artifact, Artifact, ArtifactConfig, ArtifactKind};
use crate::driver::{ElementState, PageDriver};
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{poll_element, Timeouts, WaitState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One atomic instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InteractionStep {
    /// Load a URL; relative URLs join the base URL
    Navigate {
        /// Absolute or base-relative URL
        url: String,
    },
    /// Block until `selector` reaches `state`
    WaitFor {
        /// CSS selector
        selector: String,
        /// Condition to wait for
        #[serde(default)]
        state: WaitState,
        /// Override of the default step timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Replace the value of an attached, enabled, editable element
    Fill {
        /// CSS selector
        selector: String,
        /// New value
        value: String,
    },
    /// Click an attached, visible, enabled element
    Click {
        /// CSS selector
        selector: String,
    },
    /// Block until exactly `count` elements match
    ExpectCount {
        /// CSS selector
        selector: String,
        /// Expected match count
        count: usize,
        /// Override of the default step timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Block until an input holds `value`
    ExpectValue {
        /// CSS selector
        selector: String,
        /// Expected value
        value: String,
        /// Override of the default step timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Capture the page; relative paths join the artifact directory
    Screenshot {
        /// Output file
        path: PathBuf,
    },
}

impl InteractionStep {
    /// Navigate step
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate { url: url.into() }
    }

    /// Wait step using the default step timeout
    #[must_use]
    pub fn wait_for(selector: impl Into<String>, state: WaitState) -> Self {
        Self::WaitFor {
            selector: selector.into(),
            state,
            timeout_ms: None,
        }
    }

    /// Wait step with its own timeout
    #[must_use]
    pub fn wait_for_within(selector: impl Into<String>, state: WaitState, timeout_ms: u64) -> Self {
        Self::WaitFor {
            selector: selector.into(),
            state,
            timeout_ms: Some(timeout_ms),
        }
    }

    /// Fill step
    #[must_use]
    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Fill {
            selector: selector.into(),
            value: value.into(),
        }
    }

    /// Click step
    #[must_use]
    pub fn click(selector: impl Into<String>) -> Self {
        Self::Click {
            selector: selector.into(),
        }
    }

    /// Row-count expectation using the default step timeout
    #[must_use]
    pub fn expect_count(selector: impl Into<String>, count: usize) -> Self {
        Self::ExpectCount {
            selector: selector.into(),
            count,
            timeout_ms: None,
        }
    }

    /// Value expectation
    #[must_use]
    pub fn expect_value(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ExpectValue {
            selector: selector.into(),
            value: value.into(),
            timeout_ms: None,
        }
    }

    /// Value expectation with its own timeout
    #[must_use]
    pub fn expect_value_within(
        selector: impl Into<String>,
        value: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self::ExpectValue {
            selector: selector.into(),
            value: value.into(),
            timeout_ms: Some(timeout_ms),
        }
    }

    /// Screenshot step
    #[must_use]
    pub fn screenshot(path: impl Into<PathBuf>) -> Self {
        Self::Screenshot { path: path.into() }
    }

    /// Selector the step targets, if any
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::WaitFor { selector, .. }
            | Self::Fill { selector, .. }
            | Self::Click { selector }
            | Self::ExpectCount { selector, .. }
            | Self::ExpectValue { selector, .. } => Some(selector),
            Self::Navigate { .. } | Self::Screenshot { .. } => None,
        }
    }
}

impl fmt::Display for InteractionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate { url } => write!(f, "navigate to {url}"),
            Self::WaitFor {
                selector, state, ..
            } => write!(f, "wait for {selector} to be {state}"),
            Self::Fill { selector, value } => write!(f, "fill {selector} with {value:?}"),
            Self::Click { selector } => write!(f, "click {selector}"),
            Self::ExpectCount {
                selector, count, ..
            } => write!(f, "expect {count} match(es) for {selector}"),
            Self::ExpectValue {
                selector, value, ..
            } => {
                write!(f, "expect {selector} to hold {value:?}")
            }
            Self::Screenshot { path } => write!(f, "screenshot to {}", path.display()),
        }
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based index
    pub index: usize,
    /// Human-readable description
    pub description: String,
    /// Time the step took
    pub elapsed: Duration,
    /// Artifact written by a `Screenshot` step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

/// Runs single steps against a page
#[derive(Debug, Clone)]
pub struct StepExecutor {
    base_url: String,
    timeouts: Timeouts,
    artifacts: ArtifactConfig,
}

impl StepExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts, artifacts: ArtifactConfig) -> Self {
        Self {
            base_url: base_url.into(),
            timeouts,
            artifacts,
        }
    }

    /// Time bounds in use
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Join a relative URL onto the base URL
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        resolve_url(&self.base_url, url)
    }

    /// Execute one step
    pub async fn execute<D>(
        &self,
        driver: &mut D,
        index: usize,
        step: &InteractionStep,
    ) -> HarnessResult<StepReport>
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        info!(index, step = %step, "executing step");
        let artifact = match step {
            InteractionStep::Navigate { url } => {
                self.navigate(driver, url).await?;
                None
            }
            InteractionStep::WaitFor {
                selector,
                state,
                timeout_ms,
            } => {
                let timeout_ms = timeout_ms.unwrap_or(self.timeouts.step_ms);
                let state = *state;
                self.wait(
                    driver,
                    index,
                    selector,
                    timeout_ms,
                    format!("{selector} to be {state}"),
                    move |s| state.is_met(s),
                )
                .await?;
                None
            }
            InteractionStep::Fill { selector, value } => {
                let current = driver.element_state(selector).await?;
                check_fillable(index, selector, &current)?;
                if let Err(e) = driver.fill(selector, value).await {
                    return Err(detached_or(driver, index, selector, e).await);
                }
                None
            }
            InteractionStep::Click { selector } => {
                let current = driver.element_state(selector).await?;
                check_clickable(index, selector, &current)?;
                if let Err(e) = driver.click(selector).await {
                    return Err(detached_or(driver, index, selector, e).await);
                }
                None
            }
            InteractionStep::ExpectCount {
                selector,
                count,
                timeout_ms,
            } => {
                let timeout_ms = timeout_ms.unwrap_or(self.timeouts.step_ms);
                let expected = *count;
                self.wait(
                    driver,
                    index,
                    selector,
                    timeout_ms,
                    format!("exactly {expected} match(es) for {selector}"),
                    move |s| s.count == expected,
                )
                .await?;
                None
            }
            InteractionStep::ExpectValue {
                selector,
                value,
                timeout_ms,
            } => {
                let timeout_ms = timeout_ms.unwrap_or(self.timeouts.step_ms);
                self.expect_value(driver, index, selector, value, timeout_ms)
                    .await?;
                None
            }
            InteractionStep::Screenshot { path } => {
                let path = self.artifacts.resolve(path);
                let data = driver.screenshot().await?;
                Some(write_artifact(&path, &data, ArtifactKind::Step).await?)
            }
        };
        let elapsed = start.elapsed();
        debug!(index, ?elapsed, "step done");
        Ok(StepReport {
            index,
            description: step.to_string(),
            elapsed,
            artifact,
        })
    }

    /// Navigate under the navigation timeout, then settle
    pub async fn navigate<D>(&self, driver: &mut D, url: &str) -> HarnessResult<()>
    where
        D: PageDriver + ?Sized,
    {
        let url = self.resolve_url(url);
        info!(%url, "navigating");
        let settle = self.timeouts.settle();
        match tokio::time::timeout(self.timeouts.navigation(), driver.navigate(&url, settle)).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::navigation(
                url,
                format!("load did not settle within {}ms", self.timeouts.navigation_ms),
            )),
        }
    }

    async fn expect_value<D>(
        &self,
        driver: &mut D,
        index: usize,
        selector: &str,
        expected: &str,
        timeout_ms: u64,
    ) -> HarnessResult<()>
    where
        D: PageDriver + ?Sized,
    {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut actual = None;
        loop {
            match tokio::time::timeout_at(deadline, driver.input_value(selector)).await {
                Ok(value) => actual = value?,
                Err(_) => break,
            }
            if actual.as_deref() == Some(expected) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.timeouts.poll_interval().min(deadline - now)).await;
        }
        Err(HarnessError::StepTimeout {
            index,
            condition: format!("{selector} to hold {expected:?} (found {actual:?})"),
            timeout_ms,
        })
    }

    async fn wait<D, F>(
        &self,
        driver: &mut D,
        index: usize,
        selector: &str,
        timeout_ms: u64,
        condition: String,
        predicate: F,
    ) -> HarnessResult<ElementState>
    where
        D: PageDriver + ?Sized,
        F: FnMut(&ElementState) -> bool + Send,
    {
        poll_element(
            driver,
            selector,
            Duration::from_millis(timeout_ms),
            self.timeouts.poll_interval(),
            predicate,
        )
        .await?
        .ok_or(HarnessError::StepTimeout {
            index,
            condition,
            timeout_ms,
        })
    }
}

fn not_interactable(index: usize, selector: &str, reason: &str) -> HarnessError {
    HarnessError::ElementNotInteractable {
        index,
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

/// An action that failed because its target left the DOM after the
/// actionability check is reported as not interactable.
async fn detached_or<D>(
    driver: &mut D,
    index: usize,
    selector: &str,
    err: HarnessError,
) -> HarnessError
where
    D: PageDriver + ?Sized,
{
    match driver.element_state(selector).await {
        Ok(state) if !state.attached => not_interactable(index, selector, "not attached"),
        _ => err,
    }
}

fn check_fillable(index: usize, selector: &str, state: &ElementState) -> HarnessResult<()> {
    if !state.attached {
        return Err(not_interactable(index, selector, "not attached"));
    }
    if !state.enabled {
        return Err(not_interactable(index, selector, "disabled"));
    }
    if !state.editable {
        return Err(not_interactable(index, selector, "not editable"));
    }
    Ok(())
}

fn check_clickable(index: usize, selector: &str, state: &ElementState) -> HarnessResult<()> {
    if !state.attached {
        return Err(not_interactable(index, selector, "not attached"));
    }
    if !state.enabled {
        return Err(not_interactable(index, selector, "disabled"));
    }
    if !state.visible {
        return Err(not_interactable(index, selector, "not visible"));
    }
    Ok(())
}

/// Join `url` onto `base` unless it is already absolute
#[must_use]
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.contains("://") || base.is_empty() {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    if url.is_empty() {
        return base.to_string();
    }
    format!("{base}/{}", url.trim_start_matches('/'))
}
