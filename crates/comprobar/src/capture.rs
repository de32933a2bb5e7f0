//! Artifact Capturer
//!
//! Writes page screenshots as human-checkable evidence. Success and failure
//! evidence always land at distinct paths.

use crate::driver::PageDriver;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which path produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Final state of a passing run
    Success,
    /// State at the point a run failed
    Failure,
    /// Requested by a `Screenshot` step
    Step,
}

/// A written artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Where it was written
    pub path: PathBuf,
    /// Size in bytes (zero is valid)
    pub bytes: u64,
    /// Hex SHA-256 of the content
    pub sha256: String,
    /// Which path produced it
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Whether the capture holds any data
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

/// Artifact locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory relative artifact paths resolve against
    pub dir: PathBuf,
    /// Success screenshot file
    pub success: PathBuf,
    /// Failure screenshot file
    pub failure: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("verification"),
            success: PathBuf::from("success.png"),
            failure: PathBuf::from("error_screenshot.png"),
        }
    }
}

impl ArtifactConfig {
    /// Resolve `path` against the artifact directory
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Resolved success path
    #[must_use]
    pub fn success_path(&self) -> PathBuf {
        self.resolve(&self.success)
    }

    /// Resolved failure path
    #[must_use]
    pub fn failure_path(&self) -> PathBuf {
        self.resolve(&self.failure)
    }

    /// Reject configurations where one run could overwrite another's evidence
    pub fn validate(&self) -> HarnessResult<()> {
        if self.success.as_os_str().is_empty() || self.failure.as_os_str().is_empty() {
            return Err(HarnessError::config("artifact file names must not be empty"));
        }
        if self.success_path() == self.failure_path() {
            return Err(HarnessError::config(format!(
                "success and failure artifacts both resolve to {}",
                self.success_path().display()
            )));
        }
        Ok(())
    }
}

/// Takes screenshots and writes them to disk
#[derive(Debug, Clone)]
pub struct ArtifactCapturer {
    config: ArtifactConfig,
}

impl ArtifactCapturer {
    /// Create a capturer; fails if success and failure paths coincide
    pub fn new(config: ArtifactConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Artifact locations
    #[must_use]
    pub const fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    /// Screenshot the page into `path` (resolved against the artifact directory)
    pub async fn capture<D>(
        &self,
        driver: &mut D,
        path: impl AsRef<Path> + Send,
        kind: ArtifactKind,
    ) -> HarnessResult<Artifact>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.config.resolve(path);
        let data = driver.screenshot().await?;
        write_artifact(&path, &data, kind).await
    }

    /// Capture the success artifact
    pub async fn capture_success<D>(&self, driver: &mut D) -> HarnessResult<Artifact>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.config.success_path();
        self.capture(driver, path, ArtifactKind::Success).await
    }

    /// Capture the failure artifact. Never fails; problems are logged.
    pub async fn capture_failure<D>(&self, driver: &mut D) -> Option<Artifact>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.config.failure_path();
        match self.capture(driver, &path, ArtifactKind::Failure).await {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failure screenshot could not be captured");
                None
            }
        }
    }
}

/// Write `data` to `path`, creating parent directories
pub async fn write_artifact(path: &Path, data: &[u8], kind: ArtifactKind) -> HarnessResult<Artifact> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HarnessError::capture(format!("{}: {e}", parent.display())))?;
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| HarnessError::capture(format!("{}: {e}", path.display())))?;

    let sha256 = Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    info!(path = %path.display(), bytes = data.len(), ?kind, "artifact written");
    Ok(Artifact {
        path: path.to_path_buf(),
        bytes: data.len() as u64,
        sha256,
        kind,
    })
}
