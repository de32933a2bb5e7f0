//! Comprobar: Headless-Browser Verification Harness
//!
//! Comprobar (Spanish: "to verify") drives a real browser against a running web
//! application, swaps selected backend-facing modules for deterministic
//! fixtures through network interception, walks a scripted UI workflow, and
//! leaves a screenshot behind as evidence on both the success and the failure
//! path.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   COMPROBAR Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Session    │    │ Page       │            │
//! │   │ (YAML)     │───►│ Controller │───►│ Driver     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         │                 │                 ▲                    │
//! │         ▼                 ▼                 │                    │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Fixture    │───►│ Route      │───►│ Fetch      │            │
//! │   │ Library    │    │ Interceptor│    │ Domain     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use comprobar::prelude::*;
//!
//! # async fn demo() -> HarnessResult<()> {
//! let report = Verification::new(Scenario::admin_dashboard(), MockDriver::new())
//!     .run()
//!     .await?;
//! if let Some(artifact) = report.artifact() {
//!     println!("{}", artifact.path.display());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod browser;
mod capture;
mod config;
mod driver;
mod fixture;
mod harness;
mod result;
mod script;
mod session;
mod wait;

/// Network request interception
///
/// URL-pattern routes that answer matched requests with synthetic responses.
#[allow(clippy::missing_errors_doc)]
pub mod network;

pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumLauncher};
pub use capture::{write_artifact, Artifact, ArtifactCapturer, ArtifactConfig, ArtifactKind};
pub use config::{FixtureSpec, PatternSpec, Scenario};
pub use driver::{
    AppModel, ElementState, Launcher, LoadedResource, MockDom, MockDriver, MockElement, MockProbe,
    PageDriver, PageLoad,
};
pub use fixture::{
    AuthFixture, AuthOperation, CatalogFixture, DataOperation, Fixture, FixtureLibrary, Principal,
    ProductRecord, RecordId,
};
pub use harness::{FailureInfo, Outcome, RunReport, Verification};
pub use network::{
    HttpMethod, InterceptDecision, InterceptRecord, Interceptor, RouteRule, SyntheticResponse,
    UrlPattern,
};
pub use result::{ErrorKind, HarnessError, HarnessResult};
pub use script::{resolve_url, InteractionStep, StepExecutor, StepReport};
pub use session::{session_active, HarnessState, Session, StateTrail};
pub use wait::{
    poll_element, Timeouts, WaitState, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SETTLE_MS, DEFAULT_STEP_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::browser::*;
    pub use super::capture::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::fixture::*;
    pub use super::harness::*;
    pub use super::network::*;
    pub use super::result::*;
    pub use super::script::*;
    pub use super::session::*;
    pub use super::wait::*;
}
