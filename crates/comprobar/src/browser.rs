//! Browser control for headless verification.
//!
//! With the `browser` feature this module drives Chromium over the Chrome
//! `DevTools` Protocol through chromiumoxide. Request interception uses the
//! Fetch domain with a catch-all pattern; the routing decision itself is made
//! by [`Interceptor`](crate::network::Interceptor) so it stays testable
//! without a browser.

use serde::{Deserialize, Serialize};

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]
mod cdp {
    use super::BrowserConfig;
    use crate::driver::{ElementState, Launcher, PageDriver};
    use crate::network::{HttpMethod, InterceptDecision, Interceptor};
    use crate::result::{HarnessError, HarnessResult};
    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::fetch::{
        ContinueRequestParams, EnableParams as FetchEnable, EventRequestPaused,
        FulfillRequestParams, HeaderEntry, RequestPattern, RequestStage,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        EnableParams as RuntimeEnable, EventExceptionThrown,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::fmt::Display;
    use std::future::Future;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    /// How long teardown waits for the Chromium process before killing it
    const PROCESS_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

    /// What happened while waiting for the browser process to exit
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ProcessExit {
        Exited,
        Failed(String),
        TimedOut,
    }

    async fn exit_within<F, T, E>(exit: F, limit: Duration) -> ProcessExit
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match tokio::time::timeout(limit, exit).await {
            Ok(Ok(_)) => ProcessExit::Exited,
            Ok(Err(e)) => ProcessExit::Failed(e.to_string()),
            Err(_) => ProcessExit::TimedOut,
        }
    }

    /// Launches Chromium and opens a single page
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ChromiumLauncher;

    #[async_trait]
    impl Launcher for ChromiumLauncher {
        type Driver = ChromiumDriver;

        async fn launch(self, config: &BrowserConfig) -> HarnessResult<ChromiumDriver> {
            ChromiumDriver::launch(config).await
        }
    }

    /// One Chromium browser with one page
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: CdpBrowser,
        page: CdpPage,
        handler: JoinHandle<()>,
        listeners: Vec<JoinHandle<()>>,
        page_errors: Arc<Mutex<Vec<String>>>,
        closed: bool,
    }

    fn launch_error(e: impl ToString) -> HarnessError {
        HarnessError::BrowserLaunch {
            message: e.to_string(),
        }
    }

    impl ChromiumDriver {
        /// Start Chromium and open `about:blank`
        pub async fn launch(config: &BrowserConfig) -> HarnessResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .request_timeout(Duration::from_secs(30));

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder.build().map_err(launch_error)?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(launch_error)?;

            let handler = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(launch_error)?;
            page.execute(RuntimeEnable::default())
                .await
                .map_err(launch_error)?;

            let page_errors = Arc::new(Mutex::new(Vec::new()));
            let mut exceptions = page
                .event_listener::<EventExceptionThrown>()
                .await
                .map_err(launch_error)?;
            let sink = Arc::clone(&page_errors);
            let exception_task = tokio::spawn(async move {
                while let Some(event) = exceptions.next().await {
                    let details = &event.exception_details;
                    let message = details
                        .exception
                        .as_ref()
                        .and_then(|e| e.description.clone())
                        .unwrap_or_else(|| details.text.clone());
                    warn!(%message, "uncaught page exception");
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(message);
                }
            });

            debug!(headless = config.headless, "chromium launched");
            Ok(Self {
                browser,
                page,
                handler,
                listeners: vec![exception_task],
                page_errors,
                closed: false,
            })
        }

        async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> HarnessResult<T> {
            self.page
                .evaluate(script)
                .await
                .map_err(|e| HarnessError::page(e.to_string()))?
                .into_value::<T>()
                .map_err(|e| HarnessError::page(e.to_string()))
        }

        fn take_page_errors(&self) -> Vec<String> {
            std::mem::take(
                &mut *self
                    .page_errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            )
        }
    }

    async fn answer(page: &CdpPage, interceptor: &Interceptor, event: &EventRequestPaused) {
        let method = HttpMethod::from_str(&event.request.method);
        let id = event.request_id.clone();
        let outcome = match interceptor.decide(&event.request.url, method) {
            InterceptDecision::Fulfill { response, .. } => {
                let headers = response
                    .header_pairs()
                    .into_iter()
                    .map(|(name, value)| HeaderEntry::new(name, value))
                    .collect::<Vec<_>>();
                let body = base64::engine::general_purpose::STANDARD.encode(&response.body);
                match FulfillRequestParams::builder()
                    .request_id(id.clone())
                    .response_code(i64::from(response.status))
                    .response_headers(headers)
                    .body(body)
                    .build()
                {
                    Ok(params) => page.execute(params).await.map(|_| ()),
                    Err(message) => {
                        warn!(%message, "could not build fulfill params");
                        page.execute(ContinueRequestParams::new(id)).await.map(|_| ())
                    }
                }
            }
            InterceptDecision::Continue => {
                page.execute(ContinueRequestParams::new(id)).await.map(|_| ())
            }
        };
        if let Err(e) = outcome {
            warn!(url = %event.request.url, error = %e, "paused request was not resumed");
        }
    }

    fn state_script(selector: &str) -> HarnessResult<String> {
        let selector = serde_json::to_string(selector)?;
        Ok(format!(
            r"(() => {{
  const nodes = document.querySelectorAll({selector});
  const el = nodes[0];
  if (!el) return {{ count: 0, attached: false, visible: false, enabled: false, editable: false }};
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  const visible = style.visibility !== 'hidden' && style.display !== 'none'
    && rect.width > 0 && rect.height > 0;
  const enabled = !el.disabled;
  const editable = enabled && !el.readOnly
    && (el.isContentEditable || ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName));
  return {{ count: nodes.length, attached: true, visible, enabled, editable }};
}})()"
        ))
    }

    fn fill_script(selector: &str, value: &str) -> HarnessResult<String> {
        let selector = serde_json::to_string(selector)?;
        let value = serde_json::to_string(value)?;
        Ok(format!(
            r"(() => {{
  const el = document.querySelector({selector});
  if (!el) return false;
  el.focus();
  el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"
        ))
    }

    fn value_script(selector: &str) -> HarnessResult<String> {
        let selector = serde_json::to_string(selector)?;
        Ok(format!(
            r"(() => {{
  const el = document.querySelector({selector});
  return el && typeof el.value === 'string' ? el.value : null;
}})()"
        ))
    }

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn enable_interception(&mut self, interceptor: Arc<Interceptor>) -> HarnessResult<()> {
            let mut paused = self
                .page
                .event_listener::<EventRequestPaused>()
                .await
                .map_err(|e| HarnessError::page(e.to_string()))?;
            let page = self.page.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = paused.next().await {
                    answer(&page, &interceptor, &event).await;
                }
            }));

            let enable = FetchEnable::builder()
                .pattern(
                    RequestPattern::builder()
                        .url_pattern("*")
                        .request_stage(RequestStage::Request)
                        .build(),
                )
                .build();
            self.page
                .execute(enable)
                .await
                .map_err(|e| HarnessError::page(e.to_string()))?;
            Ok(())
        }

        async fn navigate(&mut self, url: &str, settle: Duration) -> HarnessResult<()> {
            let _ = self.take_page_errors();
            self.page
                .goto(url)
                .await
                .map_err(|e| HarnessError::navigation(url, e.to_string()))?;
            tokio::time::sleep(settle).await;
            let errors = self.take_page_errors();
            if errors.is_empty() {
                Ok(())
            } else {
                Err(HarnessError::navigation(
                    url,
                    format!("uncaught exception: {}", errors.join("; ")),
                ))
            }
        }

        async fn element_state(&mut self, selector: &str) -> HarnessResult<ElementState> {
            self.evaluate(state_script(selector)?).await
        }

        async fn fill(&mut self, selector: &str, value: &str) -> HarnessResult<()> {
            let filled: bool = self.evaluate(fill_script(selector, value)?).await?;
            if filled {
                Ok(())
            } else {
                Err(HarnessError::page(format!("no element matches {selector}")))
            }
        }

        async fn click(&mut self, selector: &str) -> HarnessResult<()> {
            self.page
                .find_element(selector)
                .await
                .map_err(|e| HarnessError::page(e.to_string()))?
                .click()
                .await
                .map_err(|e| HarnessError::page(e.to_string()))?;
            Ok(())
        }

        async fn input_value(&mut self, selector: &str) -> HarnessResult<Option<String>> {
            self.evaluate(value_script(selector)?).await
        }

        async fn screenshot(&mut self) -> HarnessResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .capture_beyond_viewport(true)
                .build();
            let screenshot = self
                .page
                .execute(params)
                .await
                .map_err(|e| HarnessError::capture(e.to_string()))?;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| HarnessError::capture(e.to_string()))
        }

        async fn close(&mut self) -> HarnessResult<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            for task in self.listeners.drain(..) {
                task.abort();
            }
            let closed = self
                .browser
                .close()
                .await
                .map_err(|e| HarnessError::page(e.to_string()));
            match exit_within(self.browser.wait(), PROCESS_EXIT_TIMEOUT).await {
                ProcessExit::Exited => {}
                ProcessExit::Failed(e) => {
                    warn!(error = %e, "browser process did not exit cleanly");
                }
                ProcessExit::TimedOut => {
                    warn!(
                        timeout_ms = PROCESS_EXIT_TIMEOUT.as_millis() as u64,
                        "browser process did not exit; killing it"
                    );
                    if let Some(Err(e)) = self.browser.kill().await {
                        warn!(error = %e, "browser process could not be killed");
                    }
                }
            }
            self.handler.abort();
            closed.map(|_| ())
        }
    }

}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumDriver, ChromiumLauncher};
