// src/lib.rs

//! Wheelwright
//!
//! Converts the active conda environment into a pip-installable project:
//! a `pyproject.toml` whose dependencies are classified against PyPI,
//! plus a PEP 517 hook module that presses conda-only packages into
//! local wheels at build time.
//!
//! # Architecture
//!
//! - Registry oracle: one bounded existence check per package; any
//!   failure reads as "not published", biasing toward local fabrication
//! - Classifier: routes every exported dependency to registry name,
//!   promised local wheel, or pass-through pin; pure and infallible
//! - Wheel press: wraps the external conversion tool with at-most-once
//!   fabrication, deterministic staged names, and failure cleanup
//! - Hook delegator: decorates a standard build backend, fabricating
//!   before the wheel phase and removing staging on every exit path
//! - Manifest assembler: pure mapping from classification to the
//!   `pyproject.toml` document

pub mod backend;
pub mod classify;
pub mod conda;
mod error;
pub mod manifest;
pub mod press;
pub mod registry;

pub use backend::{BuildBackend, HookDelegator, StagingGuard, HOOK_MODULE_SOURCE};
pub use classify::{ClassifiedDependency, Classifier, ClassifierConfig, DEFAULT_BLACKLIST};
pub use conda::{
    parse_environment, DependencyEntry, EnvironmentDoc, PackageUrl, DEFAULT_CHANNELS,
};
pub use error::{Error, Result};
pub use manifest::{assemble, write_project, ProjectMetadata, PyprojectManifest, UnidepEntry};
pub use press::{expected_wheel_path, PressConfig, WheelPress, STAGING_DIR_NAME};
pub use registry::{normalize_name, PypiRegistry, RegistryOracle, DEFAULT_INDEX_URL};
