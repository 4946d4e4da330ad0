// src/error.rs

//! Central error type for wheelwright
//!
//! Classification-time failures that have a safe default (an unreachable
//! registry, for instance) are handled where they occur and never reach this
//! type. Everything here is either fatal for the invocation or fatal for the
//! build that triggered it.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// `conda env export` failed; carries the tool's stderr for the user
    #[error("conda environment export failed: {0}")]
    ExportFailed(String),

    /// A document from an external tool could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Filesystem or subprocess I/O failure
    #[error("IO error: {0}")]
    IoError(String),

    /// A component could not be constructed (e.g. HTTP client)
    #[error("Initialization error: {0}")]
    InitError(String),

    /// The wheel press tool failed for one package
    #[error("wheel press failed for '{package}': {reason}")]
    PressFailed { package: String, reason: String },

    /// The press produced more than one artifact matching a package's
    /// base name; picking one silently would stage the wrong wheel
    #[error("ambiguous press output for '{package}': {count} artifacts match")]
    AmbiguousArtifact { package: String, count: usize },

    /// The delegated build backend reported a failure
    #[error("build backend error: {0}")]
    BackendError(String),

    /// The assembled manifest could not be serialized
    #[error("Manifest error: {0}")]
    ManifestError(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}
