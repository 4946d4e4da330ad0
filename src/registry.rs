// src/registry.rs

//! PyPI existence oracle
//!
//! Answers one question for the classifier: does a given project exist on
//! the target package index? The check is a single bounded request to the
//! per-project JSON endpoint. Every failure mode (transport error, timeout,
//! non-2xx status) is folded into "does not exist", which steers the
//! classifier toward local fabrication — the path that always installs.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Default package index queried for project existence
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// Timeout for the existence check; one bounded request, no retries
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// The existence question, kept behind a trait so the classifier can be
/// tested against a canned answer set instead of a live index.
pub trait RegistryOracle {
    /// Whether `name` (normalized per the index's naming rule) is published
    fn exists(&self, name: &str) -> bool;
}

/// Normalize a project name per the index naming rule (PEP 503):
/// lowercase, with runs of `-`, `_` and `.` collapsed to a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !prev_sep {
                out.push('-');
            }
            prev_sep = true;
        } else {
            out.extend(c.to_lowercase());
            prev_sep = false;
        }
    }
    out
}

/// Oracle backed by a real package index (PyPI or a compatible mirror)
pub struct PypiRegistry {
    client: Client,
    base_url: String,
}

impl PypiRegistry {
    /// Create an oracle pointed at the default index
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_INDEX_URL)
    }

    /// Create an oracle pointed at a custom index URL
    ///
    /// PyPI rejects anonymous clients without an identifying User-Agent,
    /// so one is always attached.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REGISTRY_TIMEOUT)
            .user_agent(format!("wheelwright/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn project_url(&self, normalized: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, normalized)
    }
}

impl RegistryOracle for PypiRegistry {
    fn exists(&self, name: &str) -> bool {
        let normalized = normalize_name(name);
        let url = self.project_url(&normalized);

        match self.client.get(&url).send() {
            Ok(response) => {
                let found = response.status().is_success();
                debug!(
                    "Index check for {}: HTTP {} -> {}",
                    normalized,
                    response.status(),
                    if found { "found" } else { "not found" }
                );
                found
            }
            Err(e) => {
                // Unknown existence is treated as absence; fabricating a
                // wheel for a package that did exist is recoverable, a
                // manifest naming a package that does not is not.
                debug!("Index check for {} failed ({}), assuming absent", normalized, e);
                false
            }
        }
    }
}
