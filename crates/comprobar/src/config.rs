//! Scenario configuration.
//!
//! A scenario is a YAML document naming the target page, the fixtures that
//! stand in for its backend modules, the interaction steps, and where the
//! evidence goes.

use crate::browser::BrowserConfig;
use crate::capture::ArtifactConfig;
use crate::fixture::{
    AuthFixture, AuthOperation, CatalogFixture, DataOperation, Fixture, FixtureLibrary, Principal,
    ProductRecord, RecordId,
};
use crate::network::{SyntheticResponse, UrlPattern};
use crate::result::{HarnessError, HarnessResult};
use crate::script::{resolve_url, InteractionStep};
use crate::wait::{Timeouts, WaitState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// URL pattern as written in a scenario: a bare string is a glob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    /// Glob shorthand
    Glob(String),
    /// Any pattern kind, e.g. `{ exact: "http://..." }`
    Pattern(UrlPattern),
}

impl PatternSpec {
    /// Pattern to match with
    #[must_use]
    pub fn to_pattern(&self) -> UrlPattern {
        match self {
            Self::Glob(g) => UrlPattern::Glob(g.clone()),
            Self::Pattern(p) => p.clone(),
        }
    }
}

impl From<UrlPattern> for PatternSpec {
    fn from(pattern: UrlPattern) -> Self {
        match pattern {
            UrlPattern::Glob(g) => Self::Glob(g),
            other => Self::Pattern(other),
        }
    }
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

fn auth_name() -> String {
    "auth".to_string()
}

fn catalog_name() -> String {
    "catalog".to_string()
}

/// Fixture as written in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureSpec {
    /// Authentication module
    Auth {
        /// Logical name
        #[serde(default = "auth_name")]
        name: String,
        /// Endpoint pattern
        pattern: PatternSpec,
        /// Synthetic principal
        principal: Principal,
        /// Operations left out of the module
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        omit: Vec<AuthOperation>,
    },
    /// Data-access module
    Catalog {
        /// Logical name
        #[serde(default = "catalog_name")]
        name: String,
        /// Endpoint pattern
        pattern: PatternSpec,
        /// Records served by reads
        #[serde(default)]
        records: Vec<ProductRecord>,
        /// URL returned by the upload acknowledgement
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upload_url: Option<String>,
        /// Operations left out of the module
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        omit: Vec<DataOperation>,
    },
    /// Raw response
    Static {
        /// Logical name
        name: String,
        /// Endpoint pattern
        pattern: PatternSpec,
        /// Status code
        #[serde(default = "default_status")]
        status: u16,
        /// Content type
        #[serde(default = "default_content_type")]
        content_type: String,
        /// Body text
        #[serde(default)]
        body: String,
    },
}

impl FixtureSpec {
    /// Logical name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Auth { name, .. } | Self::Catalog { name, .. } | Self::Static { name, .. } => {
                name
            }
        }
    }

    /// Render the immutable fixture
    pub fn build(&self) -> HarnessResult<Fixture> {
        match self {
            Self::Auth {
                name,
                pattern,
                principal,
                omit,
            } => omit
                .iter()
                .fold(
                    AuthFixture::new(pattern.to_pattern(), principal.clone()).named(name.clone()),
                    |f, op| f.without(*op),
                )
                .build(),
            Self::Catalog {
                name,
                pattern,
                records,
                upload_url,
                omit,
            } => {
                let mut fixture = CatalogFixture::new(pattern.to_pattern(), records.clone())
                    .named(name.clone());
                if let Some(url) = upload_url {
                    fixture = fixture.with_upload_url(url.clone());
                }
                omit.iter().fold(fixture, |f, op| f.without(*op)).build()
            }
            Self::Static {
                name,
                pattern,
                status,
                content_type,
                body,
            } => Ok(Fixture::new(
                name.clone(),
                pattern.to_pattern(),
                SyntheticResponse::new(*status, content_type.clone(), body.clone()),
            )),
        }
    }
}

/// A complete verification scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Base URL of the running application
    pub base_url: String,
    /// Page to load, relative to `base_url` or absolute
    pub target: String,
    /// Browser options
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Time bounds
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Artifact locations
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    /// Backend stand-ins
    #[serde(default)]
    pub fixtures: Vec<FixtureSpec>,
    /// Interaction script
    pub steps: Vec<InteractionStep>,
}

impl Scenario {
    /// Parse from YAML text
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&text)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Absolute target URL
    #[must_use]
    pub fn target_url(&self) -> String {
        resolve_url(&self.base_url, &self.target)
    }

    /// Check the scenario can run
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::config("scenario name must not be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(HarnessError::config("target must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(HarnessError::config("scenario has no steps"));
        }
        self.timeouts.validate()?;
        self.artifacts.validate()?;

        let mut names = HashSet::new();
        for fixture in &self.fixtures {
            if !names.insert(fixture.name()) {
                return Err(HarnessError::config(format!(
                    "duplicate fixture name '{}'",
                    fixture.name()
                )));
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.selector().is_some_and(|s| s.trim().is_empty()) {
                return Err(HarnessError::config(format!("step {index} has an empty selector")));
            }
            match step {
                InteractionStep::WaitFor {
                    timeout_ms: Some(0),
                    ..
                }
                | InteractionStep::ExpectCount {
                    timeout_ms: Some(0),
                    ..
                }
                | InteractionStep::ExpectValue {
                    timeout_ms: Some(0),
                    ..
                } => {
                    return Err(HarnessError::config(format!("step {index} has a zero timeout")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build every fixture, in order
    pub fn fixture_library(&self) -> HarnessResult<FixtureLibrary> {
        let mut library = FixtureLibrary::new();
        for spec in &self.fixtures {
            library.insert(spec.build()?)?;
        }
        Ok(library)
    }

    /// Fixture named `name`, for editing before a run
    pub fn fixture_mut(&mut self, name: &str) -> Option<&mut FixtureSpec> {
        self.fixtures.iter_mut().find(|f| f.name() == name)
    }

    /// The admin dashboard verification: list renders two products, the add
    /// dialog opens, and the form accepts input.
    #[must_use]
    pub fn admin_dashboard() -> Self {
        Self {
            name: "admin_dashboard".to_string(),
            base_url: "http://localhost:3000".to_string(),
            target: "/html/admin.html".to_string(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
            artifacts: ArtifactConfig {
                dir: PathBuf::from("verification"),
                success: PathBuf::from("admin_dashboard.png"),
                failure: PathBuf::from("error_screenshot.png"),
            },
            fixtures: vec![
                FixtureSpec::Auth {
                    name: auth_name(),
                    pattern: PatternSpec::Glob("**/js/services/auth.js".to_string()),
                    principal: Principal::admin("admin@test.com"),
                    omit: Vec::new(),
                },
                FixtureSpec::Catalog {
                    name: catalog_name(),
                    pattern: PatternSpec::Glob("**/js/services/db.js".to_string()),
                    records: vec![
                        ProductRecord::new(RecordId::Number(1), "TestBrand", "Test Product 1", 100.0)
                            .with_img("/img/fea1.png"),
                        ProductRecord::new(
                            RecordId::Text("auto-id-123".to_string()),
                            "NewBrand",
                            "Auto ID Product",
                            200.0,
                        )
                        .with_img("/img/fea2.png"),
                    ],
                    upload_url: Some("/img/fea3.png".to_string()),
                    omit: Vec::new(),
                },
            ],
            steps: vec![
                InteractionStep::wait_for("#productTableBody tr", WaitState::Attached),
                InteractionStep::expect_count("#productTableBody tr", 2),
                InteractionStep::click("#addProductBtn"),
                InteractionStep::wait_for("#productModal", WaitState::Visible),
                InteractionStep::fill("#brand", "My Brand"),
                InteractionStep::fill("#name", "My Cool Product"),
                InteractionStep::expect_value("#brand", "My Brand"),
                InteractionStep::expect_value("#name", "My Cool Product"),
            ],
        }
    }
}
