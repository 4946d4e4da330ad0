// src/press.rs

//! Wheel fabrication from explicit conda package URLs
//!
//! The press wraps the external `conda press` tool, which converts one conda
//! package archive into a wheel dropped into the working directory. This
//! module adds the lifecycle the tool itself lacks:
//!
//! - at-most-once fabrication per build invocation (the tool is not assumed
//!   idempotent), keyed on the staging directory's existence
//! - deterministic staged filenames, so the manifest can reference a wheel
//!   before it exists
//! - explicit artifact discovery (exact base-name prefix match), with
//!   ambiguous or missing output treated as a hard failure

use crate::conda::PackageUrl;
use crate::error::{Error, Result};
use crate::registry::normalize_name;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Staging directory pressed wheels are collected in, relative to the
/// build's working directory
pub const STAGING_DIR_NAME: &str = "portable_wheels";

/// Version field of staged wheel filenames. The pressed wheel's real
/// version is irrelevant: the manifest references the file by path.
const PLACEHOLDER_VERSION: &str = "0.1.0";

/// Compatibility tag of staged wheel filenames
const WHEEL_TAG: &str = "py3-none-any";

/// Deterministic staged path for a package's pressed wheel
///
/// Derived from the normalized name only, so the classifier can promise
/// this path in the manifest at generation time and the press delivers on
/// it at build time.
pub fn expected_wheel_path(staging_dir: &Path, normalized_name: &str) -> PathBuf {
    staging_dir.join(format!(
        "{}-{}-{}.whl",
        wheel_escape(normalized_name),
        PLACEHOLDER_VERSION,
        WHEEL_TAG
    ))
}

/// Wheel filenames separate their fields with `-`, so hyphens inside the
/// name field are escaped to `_` per the wheel filename convention.
fn wheel_escape(normalized_name: &str) -> String {
    normalized_name.replace('-', "_")
}

/// Configuration for the wheel press
#[derive(Debug, Clone)]
pub struct PressConfig {
    /// Directory staged wheels are moved into
    pub staging_dir: PathBuf,
    /// Directory the press tool runs in and drops its output into
    pub work_dir: PathBuf,
    /// Conversion command; the package URL is appended as the final argument
    pub press_command: Vec<String>,
}

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(STAGING_DIR_NAME),
            work_dir: PathBuf::from("."),
            press_command: ["conda", "press", "--skip-python", "--fatten"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Presses conda packages into wheels and stages them for the build
pub struct WheelPress {
    config: PressConfig,
}

impl WheelPress {
    /// Create a press with the given configuration
    pub fn new(config: PressConfig) -> Self {
        Self { config }
    }

    /// Create a press with default configuration
    pub fn with_defaults() -> Self {
        Self::new(PressConfig::default())
    }

    /// The staging directory this press populates
    pub fn staging_dir(&self) -> &Path {
        &self.config.staging_dir
    }

    /// Press every explicit package URL into a staged wheel
    ///
    /// Idempotent within one build invocation: if the staging directory
    /// already exists, an earlier call did the work and this one is a no-op.
    /// On failure the partially populated staging directory is removed, so
    /// a later attempt is not fooled into skipping fabrication.
    pub fn fabricate(&self, urls: &[PackageUrl]) -> Result<()> {
        if self.config.staging_dir.exists() {
            debug!(
                "Staging directory {} already present, skipping fabrication",
                self.config.staging_dir.display()
            );
            return Ok(());
        }

        info!("Pressing {} conda package(s) into wheels", urls.len());
        fs::create_dir_all(&self.config.staging_dir)?;

        let result = self.press_all(urls);
        if result.is_err() {
            if let Err(e) = fs::remove_dir_all(&self.config.staging_dir) {
                warn!(
                    "Failed to remove staging directory {} after press failure: {}",
                    self.config.staging_dir.display(),
                    e
                );
            }
        }
        result
    }

    fn press_all(&self, urls: &[PackageUrl]) -> Result<()> {
        for url in urls {
            self.press_one(url)?;
        }
        Ok(())
    }

    /// Press one package and stage its wheel under the deterministic name
    fn press_one(&self, url: &PackageUrl) -> Result<()> {
        let package = url.base_name();
        info!("Pressing {}", url.filename());

        let (program, args) = self
            .config
            .press_command
            .split_first()
            .ok_or_else(|| Error::InitError("Press command is empty".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .arg(url.as_str())
            .current_dir(&self.config.work_dir)
            .output()
            .map_err(|e| Error::PressFailed {
                package: package.clone(),
                reason: format!("Failed to run {program}: {e}"),
            })?;

        if !output.status.success() {
            return Err(Error::PressFailed {
                package,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let artifact = self.find_artifact(&package)?;
        let staged = expected_wheel_path(&self.config.staging_dir, &normalize_name(&package));
        fs::rename(&artifact, &staged).map_err(|e| {
            Error::IoError(format!(
                "Failed to stage {} as {}: {e}",
                artifact.display(),
                staged.display()
            ))
        })?;

        debug!("Staged {} as {}", artifact.display(), staged.display());
        Ok(())
    }

    /// Locate the wheel the press produced for `package`
    ///
    /// The press tool's contract is to name its output with the package's
    /// base name as a prefix. The match is exact (`<base>-*.whl`); zero
    /// matches means the press lied about succeeding, several mean the
    /// output is ambiguous, and neither is recoverable.
    fn find_artifact(&self, package: &str) -> Result<PathBuf> {
        let prefix = format!("{package}-");
        let mut matches = Vec::new();

        for entry in fs::read_dir(&self.config.work_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".whl") {
                matches.push(entry.path());
            }
        }

        match matches.len() {
            0 => Err(Error::PressFailed {
                package: package.to_string(),
                reason: "press exited successfully but produced no matching wheel".to_string(),
            }),
            1 => Ok(matches.remove(0)),
            n => Err(Error::AmbiguousArtifact {
                package: package.to_string(),
                count: n,
            }),
        }
    }
}
