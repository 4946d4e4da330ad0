// src/conda.rs

//! Interface to the conda tooling on the host system
//!
//! Everything conda-specific lives here: exporting the active environment,
//! listing explicit package URLs, querying configured channels, and the
//! filename conventions of conda package archives. The rest of the crate
//! consumes the parsed documents and never shells out to conda itself.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::process::Command;
use tracing::{debug, warn};
use url::Url;

/// Channels assumed when the channel query fails or returns nothing
pub const DEFAULT_CHANNELS: &[&str] = &["conda-forge", "defaults"];

/// A parsed `conda env export` document
///
/// Only the fields the classifier consumes are modelled; conda emits more
/// (`prefix`, variables) and those are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// One entry of the exported dependency list: either a plain conda spec
/// string (`name[=version[=build]]`) or a nested mapping such as the
/// `pip:` block listing pip-style specifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    Spec(String),
    Nested(BTreeMap<String, Vec<String>>),
}

/// Split a plain conda spec into its name and optional version pin.
///
/// Conda pins use single `=` separators (`numpy=1.26=py312h...`), but a
/// doubled `==` shows up in hand-written files; empty segments are skipped
/// so both forms parse the same way.
pub fn split_spec(spec: &str) -> (&str, Option<&str>) {
    let mut parts = spec.split('=').filter(|s| !s.is_empty());
    let name = parts.next().unwrap_or("");
    (name, parts.next())
}

/// Parse an environment document from YAML text
pub fn parse_environment(yaml: &str) -> Result<EnvironmentDoc> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::ParseError(format!("Invalid environment export: {e}")))
}

/// Export the active conda environment
///
/// Failure here is fatal for the invocation: without the export there is
/// nothing to classify and no manifest may be written.
pub fn export_environment() -> Result<EnvironmentDoc> {
    debug!("Exporting conda environment");

    let output = Command::new("conda")
        .args(["env", "export"])
        .output()
        .map_err(|e| Error::ExportFailed(format!("Failed to run conda: {e}. Is conda installed?")))?;

    if !output.status.success() {
        return Err(Error::ExportFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_environment(&String::from_utf8_lossy(&output.stdout))
}

/// Query the channels configured on this machine
///
/// Falls back to [`DEFAULT_CHANNELS`] on any failure — a missing channel
/// list degrades the generated manifest but must never abort generation.
pub fn configured_channels() -> Vec<String> {
    let output = Command::new("conda")
        .args(["config", "--show", "channels", "--json"])
        .output();

    let fallback = || DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect();

    match output {
        Ok(out) if out.status.success() => {
            parse_channels(&String::from_utf8_lossy(&out.stdout)).unwrap_or_else(|| {
                warn!("conda config returned no channel list, using defaults");
                fallback()
            })
        }
        Ok(out) => {
            warn!(
                "conda config failed ({}), using default channels",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            fallback()
        }
        Err(e) => {
            warn!("Failed to run conda config: {}, using default channels", e);
            fallback()
        }
    }
}

/// Extract the channel list from `conda config --json` output
fn parse_channels(json: &str) -> Option<Vec<String>> {
    #[derive(Deserialize)]
    struct ChannelConfig {
        channels: Vec<String>,
    }

    let parsed: ChannelConfig = serde_json::from_str(json).ok()?;
    if parsed.channels.is_empty() {
        None
    } else {
        Some(parsed.channels)
    }
}

/// Derive a `requires-python` bound from the environment's own interpreter
/// pin (`python=3.11[.5]`), when one is present.
pub fn python_requires(doc: &EnvironmentDoc) -> Option<String> {
    for entry in &doc.dependencies {
        if let DependencyEntry::Spec(spec) = entry {
            let (name, version) = split_spec(spec);
            if name == "python" {
                let version = version?;
                let major_minor: Vec<&str> = version
                    .split('.')
                    .take(2)
                    .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
                    .collect();
                if major_minor.is_empty() {
                    return None;
                }
                return Some(format!(">={}", major_minor.join(".")));
            }
        }
    }
    None
}

/// One explicit conda package reference from `conda list --explicit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrl {
    url: Url,
}

impl PackageUrl {
    /// Parse a listing line; returns `None` for anything that is not an
    /// `http(s)` URL (the `@EXPLICIT` header, comments, checksums).
    pub fn parse(line: &str) -> Option<Self> {
        let url = Url::parse(line.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        Some(Self { url })
    }

    /// The full URL string
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The archive filename, e.g. `numpy-1.26.4-py312h8813227_0.conda`
    pub fn filename(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or("")
    }

    /// The package's base name with the instance-specific
    /// `-<version>-<build>.<ext>` suffix stripped.
    ///
    /// Conda archive names are `<name>-<version>-<build>` where `<name>`
    /// itself may contain hyphens, so the two rightmost segments go.
    pub fn base_name(&self) -> String {
        let filename = self.filename();
        let stem = filename
            .strip_suffix(".tar.bz2")
            .or_else(|| filename.strip_suffix(".conda"))
            .unwrap_or_else(|| {
                filename
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(filename)
            });

        stem.rsplitn(3, '-').nth(2).unwrap_or(stem).to_string()
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Parse `conda list --explicit` output into package references
pub fn parse_explicit_listing(listing: &str) -> Vec<PackageUrl> {
    listing.lines().filter_map(PackageUrl::parse).collect()
}

/// List the explicit package URLs of the active environment
///
/// A failed listing propagates: silently pressing nothing would let the
/// build continue and fail much later with a missing-wheel install error.
pub fn explicit_package_urls() -> Result<Vec<PackageUrl>> {
    debug!("Listing explicit conda package URLs");

    let output = Command::new("conda")
        .args(["list", "--explicit"])
        .output()
        .map_err(|e| Error::ExportFailed(format!("Failed to run conda: {e}. Is conda installed?")))?;

    if !output.status.success() {
        return Err(Error::ExportFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(parse_explicit_listing(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EXPORT: &str = "\
name: science
channels:
  - conda-forge
  - defaults
dependencies:
  - python=3.11.5=h2628c8c_0
  - numpy=1.26.0
  - libffi
  - pip:
    - requests==2.31.0
    - rich>=13.0
prefix: /opt/conda/envs/science
";

    #[test]
    fn test_parse_environment_mixed_entries() {
        let doc = parse_environment(SAMPLE_EXPORT).unwrap();
        assert_eq!(doc.name.as_deref(), Some("science"));
        assert_eq!(doc.channels, vec!["conda-forge", "defaults"]);
        assert_eq!(doc.dependencies.len(), 4);

        match &doc.dependencies[3] {
            DependencyEntry::Nested(map) => {
                assert_eq!(map["pip"], vec!["requests==2.31.0", "rich>=13.0"]);
            }
            other => panic!("expected nested pip entry, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_environment_no_dependencies() {
        let doc = parse_environment("name: empty\n").unwrap();
        assert!(doc.dependencies.is_empty());
    }

    #[test]
    fn test_parse_environment_rejects_garbage() {
        assert!(parse_environment("dependencies: {not: [a, list").is_err());
    }

    #[test]
    fn test_split_spec() {
        assert_eq!(split_spec("numpy=1.26=py312h8813227_0"), ("numpy", Some("1.26")));
        assert_eq!(split_spec("numpy=1.26"), ("numpy", Some("1.26")));
        assert_eq!(split_spec("numpy==1.26"), ("numpy", Some("1.26")));
        assert_eq!(split_spec("libffi"), ("libffi", None));
        assert_eq!(split_spec(""), ("", None));
    }

    #[test]
    fn test_python_requires_from_pin() {
        let doc = parse_environment(SAMPLE_EXPORT).unwrap();
        assert_eq!(python_requires(&doc).as_deref(), Some(">=3.11"));
    }

    #[test]
    fn test_python_requires_absent() {
        let doc = parse_environment("dependencies:\n  - numpy=1.26\n").unwrap();
        assert_eq!(python_requires(&doc), None);

        let unpinned = parse_environment("dependencies:\n  - python\n").unwrap();
        assert_eq!(python_requires(&unpinned), None);
    }

    #[test]
    fn test_parse_explicit_listing_filters_non_urls() {
        let listing = "\
# This file may be used to create an environment using:
# $ conda create --name <env> --file <this file>
@EXPLICIT
https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.4-py312h8813227_0.conda
http://internal.example.com/pkgs/foo-1.0-0.tar.bz2
not a url at all
";
        let urls = parse_explicit_listing(listing);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].base_name(), "numpy");
        assert_eq!(urls[1].base_name(), "foo");
    }

    #[test]
    fn test_base_name_strips_version_and_build() {
        let url = PackageUrl::parse(
            "https://conda.anaconda.org/conda-forge/noarch/python-dateutil-2.9.0-pyhd8ed1ab_0.conda",
        )
        .unwrap();
        assert_eq!(url.base_name(), "python-dateutil");
        assert_eq!(url.filename(), "python-dateutil-2.9.0-pyhd8ed1ab_0.conda");
    }

    #[test]
    fn test_base_name_tar_bz2() {
        let url = PackageUrl::parse(
            "https://repo.anaconda.com/pkgs/main/linux-64/zlib-1.2.13-h5eee18b_1.tar.bz2",
        )
        .unwrap();
        assert_eq!(url.base_name(), "zlib");
    }

    #[test]
    fn test_base_name_without_enough_segments() {
        let url = PackageUrl::parse("https://example.com/pkgs/standalone.conda").unwrap();
        assert_eq!(url.base_name(), "standalone");
    }

    #[test]
    fn test_parse_channels() {
        assert_eq!(
            parse_channels(r#"{"channels": ["conda-forge", "bioconda"]}"#),
            Some(vec!["conda-forge".to_string(), "bioconda".to_string()])
        );
        assert_eq!(parse_channels(r#"{"channels": []}"#), None);
        assert_eq!(parse_channels("not json"), None);
        assert_eq!(parse_channels(r#"{"other": 1}"#), None);
    }
}
