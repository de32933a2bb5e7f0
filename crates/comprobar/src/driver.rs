//! Page Driver - Abstract Browser Automation Trait
//!
//! Everything the harness needs from a browser goes through [`PageDriver`], so
//! the verification flow can run against Chromium (feature `browser`) or
//! against the in-process [`MockDriver`].
//!
//! # Toyota Principles Applied
//!
//! - **Genchi Genbutsu**: The same session code drives a real or simulated page
//! - **Jidoka**: Script errors during load stop the line as navigation failures

use crate::browser::BrowserConfig;
use crate::network::{HttpMethod, InterceptDecision, Interceptor};
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot of what a selector currently resolves to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Number of matching nodes
    pub count: usize,
    /// At least one node is in the DOM
    pub attached: bool,
    /// First node is rendered and not hidden
    pub visible: bool,
    /// First node is not disabled
    pub enabled: bool,
    /// First node accepts text input
    pub editable: bool,
}

impl ElementState {
    /// State of a selector with no match
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            count: 0,
            attached: false,
            visible: false,
            enabled: false,
            editable: false,
        }
    }
}

/// Abstract driver for one browser page.
///
/// # Implementations
///
/// - `ChromiumDriver` - real Chromium over CDP (feature `browser`)
/// - [`MockDriver`] - simulated page for tests
#[async_trait]
pub trait PageDriver: Send {
    /// Route every subsequent page request through `interceptor`
    async fn enable_interception(&mut self, interceptor: Arc<Interceptor>) -> HarnessResult<()>;

    /// Load `url`, then let the page run for `settle` before returning.
    ///
    /// Uncaught script errors raised during load or settle are reported as
    /// [`HarnessError::Navigation`].
    async fn navigate(&mut self, url: &str, settle: Duration) -> HarnessResult<()>;

    /// Current state of `selector`
    async fn element_state(&mut self, selector: &str) -> HarnessResult<ElementState>;

    /// Replace the value of the first match and fire input events
    async fn fill(&mut self, selector: &str, value: &str) -> HarnessResult<()>;

    /// Click the first match
    async fn click(&mut self, selector: &str) -> HarnessResult<()>;

    /// Current value of the first match, if it has one
    async fn input_value(&mut self, selector: &str) -> HarnessResult<Option<String>>;

    /// Full-page PNG bytes
    async fn screenshot(&mut self) -> HarnessResult<Vec<u8>>;

    /// Release the browser
    async fn close(&mut self) -> HarnessResult<()>;
}

/// Starts a browser and yields its page driver
#[async_trait]
pub trait Launcher: Send + Sized {
    /// Driver produced by a successful launch
    type Driver: PageDriver;

    /// Launch with `config`
    async fn launch(self, config: &BrowserConfig) -> HarnessResult<Self::Driver>;
}

// =============================================================================
// MOCK PAGE MODEL
// =============================================================================

/// One resource requested while loading a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    /// Requested URL
    pub url: String,
    /// Rule that fulfilled it, `None` when it went to the network
    pub fulfilled_by: Option<String>,
    /// Synthetic body, when fulfilled
    pub body: Option<String>,
}

/// Everything the simulated page saw during one navigation
#[derive(Debug, Clone, Default)]
pub struct PageLoad {
    /// Navigated URL
    pub url: String,
    /// Resources in request order
    pub resources: Vec<LoadedResource>,
}

impl PageLoad {
    /// Resource whose URL ends with `suffix`
    #[must_use]
    pub fn resource(&self, suffix: &str) -> Option<&LoadedResource> {
        self.resources.iter().find(|r| r.url.ends_with(suffix))
    }
}

/// Simulated element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Selector this element answers to
    pub selector: String,
    /// Matching node count
    pub count: usize,
    /// Rendered and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Accepts text input
    pub editable: bool,
    /// Current input value
    pub value: Option<String>,
    /// Delay after load before the element is attached
    pub appears_after: Option<Duration>,
    /// Selectors made visible when this element is clicked
    pub reveals: Vec<String>,
}

impl MockElement {
    /// Visible, enabled, non-editable element
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            count: 1,
            visible: true,
            enabled: true,
            editable: false,
            value: None,
            appears_after: None,
            reveals: Vec::new(),
        }
    }

    /// Text input with an empty value
    #[must_use]
    pub fn input(selector: impl Into<String>) -> Self {
        Self {
            editable: true,
            value: Some(String::new()),
            ..Self::new(selector)
        }
    }

    /// Selector matching `count` nodes
    #[must_use]
    pub fn rows(selector: impl Into<String>, count: usize) -> Self {
        Self {
            count,
            ..Self::new(selector)
        }
    }

    /// Mark hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Attach only after `delay` has passed since load
    #[must_use]
    pub const fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    /// Show `selector` when clicked
    #[must_use]
    pub fn revealing(mut self, selector: impl Into<String>) -> Self {
        self.reveals.push(selector.into());
        self
    }
}

/// DOM produced by an app model for one page load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDom {
    elements: Vec<MockElement>,
}

impl MockDom {
    /// Empty DOM
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element
    #[must_use]
    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    fn find(&self, selector: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.selector == selector)
    }

    fn find_mut(&mut self, selector: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.selector == selector)
    }
}

/// Renders the page from what it loaded; `Err` is an uncaught script error
pub type AppModel = Arc<dyn Fn(&PageLoad) -> Result<MockDom, String> + Send + Sync>;

/// Shared view of what a [`MockDriver`] did, readable after the driver is consumed
#[derive(Debug, Default)]
pub struct MockProbe {
    calls: Mutex<Vec<String>>,
    network: Mutex<Vec<String>>,
    closes: Mutex<usize>,
}

impl MockProbe {
    /// Driver calls in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any call starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// URLs that reached the real network
    #[must_use]
    pub fn network_requests(&self) -> Vec<String> {
        self.network
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times the browser was closed
    #[must_use]
    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Simulated browser page for unit and integration tests
pub struct MockDriver {
    resources: Vec<String>,
    app: Option<AppModel>,
    interceptor: Option<Arc<Interceptor>>,
    dom: Option<MockDom>,
    loaded_at: Option<Instant>,
    load_delay: Duration,
    screenshot_data: Vec<u8>,
    screenshot_error: Option<String>,
    launch_error: Option<String>,
    probe: Arc<MockProbe>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("resources", &self.resources)
            .field("intercepting", &self.interceptor.is_some())
            .field("loaded", &self.dom.is_some())
            .field("load_delay", &self.load_delay)
            .finish_non_exhaustive()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// PNG signature, enough for a non-empty capture
const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl MockDriver {
    /// Page with no resources and an empty DOM
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            app: None,
            interceptor: None,
            dom: None,
            loaded_at: None,
            load_delay: Duration::ZERO,
            screenshot_data: MOCK_PNG.to_vec(),
            screenshot_error: None,
            launch_error: None,
            probe: Arc::new(MockProbe::default()),
        }
    }

    /// Resource the page requests on every load
    #[must_use]
    pub fn with_resource(mut self, url: impl Into<String>) -> Self {
        self.resources.push(url.into());
        self
    }

    /// Model that turns a load into a DOM
    #[must_use]
    pub fn with_app<F>(mut self, app: F) -> Self
    where
        F: Fn(&PageLoad) -> Result<MockDom, String> + Send + Sync + 'static,
    {
        self.app = Some(Arc::new(app));
        self
    }

    /// Delay before the load event
    #[must_use]
    pub const fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Bytes returned by screenshots
    #[must_use]
    pub fn with_screenshot(mut self, data: Vec<u8>) -> Self {
        self.screenshot_data = data;
        self
    }

    /// Make every screenshot fail
    #[must_use]
    pub fn failing_screenshots(mut self, message: impl Into<String>) -> Self {
        self.screenshot_error = Some(message.into());
        self
    }

    /// Make launch fail
    #[must_use]
    pub fn failing_launch(mut self, message: impl Into<String>) -> Self {
        self.launch_error = Some(message.into());
        self
    }

    /// Handle for inspecting calls after the driver is moved
    #[must_use]
    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }

    fn request(&self, url: &str) -> LoadedResource {
        let decision = self
            .interceptor
            .as_ref()
            .map_or(InterceptDecision::Continue, |i| i.decide(url, HttpMethod::Get));
        match decision {
            InterceptDecision::Fulfill { rule, response } => LoadedResource {
                url: url.to_string(),
                fulfilled_by: Some(rule),
                body: Some(response.body_string()),
            },
            InterceptDecision::Continue => {
                self.probe
                    .network
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(url.to_string());
                LoadedResource {
                    url: url.to_string(),
                    fulfilled_by: None,
                    body: None,
                }
            }
        }
    }

    fn attached<'a>(&'a self, selector: &str) -> Option<&'a MockElement> {
        let element = self.dom.as_ref()?.find(selector)?;
        let appeared = match (element.appears_after, self.loaded_at) {
            (Some(delay), Some(loaded)) => loaded.elapsed() >= delay,
            (Some(_), None) => false,
            (None, _) => true,
        };
        (appeared && element.count > 0).then_some(element)
    }

    fn missing(selector: &str) -> HarnessError {
        HarnessError::page(format!("no element matches {selector}"))
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn enable_interception(&mut self, interceptor: Arc<Interceptor>) -> HarnessResult<()> {
        self.probe
            .record(format!("enable_interception:{}", interceptor.route_count()));
        self.interceptor = Some(interceptor);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, settle: Duration) -> HarnessResult<()> {
        self.probe.record(format!("navigate:{url}"));
        let mut load = PageLoad {
            url: url.to_string(),
            resources: Vec::with_capacity(self.resources.len() + 1),
        };
        load.resources.push(self.request(url));
        for resource in &self.resources {
            load.resources.push(self.request(resource));
        }
        tokio::time::sleep(self.load_delay).await;

        let dom = match &self.app {
            Some(app) => app(&load).map_err(|e| {
                HarnessError::navigation(url, format!("uncaught exception: {e}"))
            })?,
            None => MockDom::new(),
        };
        self.dom = Some(dom);
        self.loaded_at = Some(Instant::now());
        tokio::time::sleep(settle).await;
        Ok(())
    }

    async fn element_state(&mut self, selector: &str) -> HarnessResult<ElementState> {
        Ok(self
            .attached(selector)
            .map_or(ElementState::detached(), |e| ElementState {
                count: e.count,
                attached: true,
                visible: e.visible,
                enabled: e.enabled,
                editable: e.editable,
            }))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> HarnessResult<()> {
        self.probe.record(format!("fill:{selector}={value}"));
        if self.attached(selector).is_none() {
            return Err(Self::missing(selector));
        }
        if let Some(element) = self.dom.as_mut().and_then(|d| d.find_mut(selector)) {
            element.value = Some(value.to_string());
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> HarnessResult<()> {
        self.probe.record(format!("click:{selector}"));
        let reveals = self
            .attached(selector)
            .ok_or_else(|| Self::missing(selector))?
            .reveals
            .clone();
        if let Some(dom) = self.dom.as_mut() {
            for target in reveals {
                if let Some(element) = dom.find_mut(&target) {
                    element.visible = true;
                }
            }
        }
        Ok(())
    }

    async fn input_value(&mut self, selector: &str) -> HarnessResult<Option<String>> {
        Ok(self.attached(selector).and_then(|e| e.value.clone()))
    }

    async fn screenshot(&mut self) -> HarnessResult<Vec<u8>> {
        self.probe.record("screenshot".to_string());
        match &self.screenshot_error {
            Some(message) => Err(HarnessError::capture(message.clone())),
            None => Ok(self.screenshot_data.clone()),
        }
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.probe.record("close".to_string());
        *self
            .probe
            .closes
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        self.dom = None;
        Ok(())
    }
}

#[async_trait]
impl Launcher for MockDriver {
    type Driver = Self;

    async fn launch(self, config: &BrowserConfig) -> HarnessResult<Self> {
        self.probe.record(format!(
            "launch:headless={},viewport={}x{}",
            config.headless, config.viewport_width, config.viewport_height
        ));
        match &self.launch_error {
            Some(message) => Err(HarnessError::BrowserLaunch {
                message: message.clone(),
            }),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::network::{RouteRule, SyntheticResponse, UrlPattern};

    fn settle() -> Duration {
        Duration::ZERO
    }

    mod mock_page_tests {
        use super::*;

        #[tokio::test]
        async fn test_unrouted_requests_reach_network() {
            let mut driver = MockDriver::new().with_resource("http://localhost/js/app.js");
            let probe = driver.probe();
            driver.navigate("http://localhost/", settle()).await.unwrap();
            assert_eq!(
                probe.network_requests(),
                vec!["http://localhost/", "http://localhost/js/app.js"]
            );
        }

        #[tokio::test]
        async fn test_routed_requests_are_fulfilled() {
            let mut interceptor = Interceptor::new();
            interceptor.register_route(RouteRule::new(
                "app",
                UrlPattern::glob("**/js/app.js"),
                SyntheticResponse::javascript("export const A = 1;"),
            ));
            let mut driver = MockDriver::new()
                .with_resource("http://localhost/js/app.js")
                .with_app(|load| {
                    let body = load.resource("app.js").and_then(|r| r.body.clone());
                    assert_eq!(body.as_deref(), Some("export const A = 1;"));
                    Ok(MockDom::new())
                });
            let probe = driver.probe();
            driver
                .enable_interception(Arc::new(interceptor))
                .await
                .unwrap();
            driver.navigate("http://localhost/", settle()).await.unwrap();
            assert_eq!(probe.network_requests(), vec!["http://localhost/"]);
        }

        #[tokio::test]
        async fn test_script_error_is_navigation_error() {
            let mut driver = MockDriver::new().with_app(|_| Err("boom".to_string()));
            let err = driver
                .navigate("http://localhost/", settle())
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::Navigation { .. }));
            assert!(err.to_string().contains("boom"));
        }

        #[tokio::test]
        async fn test_click_reveals_and_fill_sets_value() {
            let mut driver = MockDriver::new().with_app(|_| {
                Ok(MockDom::new()
                    .with(MockElement::new("#open").revealing("#modal"))
                    .with(MockElement::new("#modal").hidden())
                    .with(MockElement::input("#name")))
            });
            driver.navigate("http://localhost/", settle()).await.unwrap();
            assert!(!driver.element_state("#modal").await.unwrap().visible);
            driver.click("#open").await.unwrap();
            assert!(driver.element_state("#modal").await.unwrap().visible);
            driver.fill("#name", "x").await.unwrap();
            assert_eq!(
                driver.input_value("#name").await.unwrap().as_deref(),
                Some("x")
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_delayed_element_attaches_later() {
            let mut driver = MockDriver::new().with_app(|_| {
                Ok(MockDom::new()
                    .with(MockElement::rows("tr", 2).appearing_after(Duration::from_millis(100))))
            });
            driver.navigate("http://localhost/", settle()).await.unwrap();
            assert!(!driver.element_state("tr").await.unwrap().attached);
            tokio::time::sleep(Duration::from_millis(100)).await;
            let state = driver.element_state("tr").await.unwrap();
            assert!(state.attached);
            assert_eq!(state.count, 2);
        }

        #[tokio::test]
        async fn test_missing_element_actions_fail() {
            let mut driver = MockDriver::new();
            driver.navigate("http://localhost/", settle()).await.unwrap();
            assert!(driver.click("#nope").await.is_err());
            assert!(driver.fill("#nope", "v").await.is_err());
            assert_eq!(
                driver.element_state("#nope").await.unwrap(),
                ElementState::detached()
            );
        }
    }

    mod mock_launch_tests {
        use super::*;

        #[tokio::test]
        async fn test_launch_and_close_are_recorded() {
            let driver = MockDriver::new();
            let probe = driver.probe();
            let mut driver = driver.launch(&BrowserConfig::default()).await.unwrap();
            driver.close().await.unwrap();
            assert!(probe.was_called("launch:headless=true"));
            assert_eq!(probe.close_count(), 1);
        }

        #[tokio::test]
        async fn test_launch_failure() {
            let err = MockDriver::new()
                .failing_launch("no chromium")
                .launch(&BrowserConfig::default())
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::BrowserLaunch { .. }));
        }

        #[tokio::test]
        async fn test_screenshot_failure() {
            let mut driver = MockDriver::new().failing_screenshots("gpu lost");
            let err = driver.screenshot().await.unwrap_err();
            assert!(err.to_string().contains("gpu lost"));
        }
    }
}
