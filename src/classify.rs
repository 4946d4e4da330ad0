// src/classify.rs

//! Dependency classification
//!
//! Every dependency of an exported conda environment is routed to exactly
//! one installation strategy:
//!
//! - blacklisted names (interpreter, toolchain shims) are dropped entirely
//! - pip-section entries pass through verbatim, version pins intact
//! - conda specs whose project exists on the package index resolve from
//!   the registry by name
//! - everything else is promised as a locally pressed wheel at a path
//!   that is fully determined before fabrication ever runs
//!
//! Classification is pure routing: it performs no filesystem work and
//! never fails. Registry lookups that error are indistinguishable from
//! "not published", which errs on the side of pressing a wheel we may not
//! have needed rather than declaring an index dependency that cannot
//! resolve.

use crate::conda::{split_spec, DependencyEntry, EnvironmentDoc};
use crate::press;
use crate::registry::{normalize_name, RegistryOracle};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::debug;

/// Names never worth carrying into a pip-installable project: the
/// interpreter itself and conda's low-level toolchain pins, which have no
/// meaning outside a conda environment.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "python",
    "_python_abi3_support",
    "pip",
    "_libgcc_mutex",
    "_openmp_mutex",
    "ld_impl_linux-64",
    "libgcc-ng",
    "libstdcxx-ng",
    "libgomp",
];

/// One environment dependency, routed to its installation strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedDependency {
    /// Published on the package index; resolvable by name
    RegistryResolvable { name: String },
    /// Not published; satisfied by a wheel pressed into the staging
    /// directory at build time
    LocallyFabricated { name: String, wheel_path: PathBuf },
    /// Pip-section entry, carried verbatim
    PassThrough { spec: String },
}

/// Configuration for the classifier
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Names to drop, held in normalized form
    pub blacklist: HashSet<String>,
    /// Staging directory promised wheel paths are rooted in
    pub staging_dir: PathBuf,
}

impl ClassifierConfig {
    /// Configuration with a custom blacklist; names are normalized on the
    /// way in so lookups match regardless of spelling
    pub fn with_blacklist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blacklist: names
                .into_iter()
                .map(|n| normalize_name(n.as_ref()))
                .collect(),
            staging_dir: PathBuf::from(press::STAGING_DIR_NAME),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::with_blacklist(DEFAULT_BLACKLIST.iter().copied())
    }
}

/// Routes environment dependencies to installation strategies
pub struct Classifier<'a> {
    config: &'a ClassifierConfig,
    oracle: &'a dyn RegistryOracle,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a ClassifierConfig, oracle: &'a dyn RegistryOracle) -> Self {
        Self { config, oracle }
    }

    /// Classify every dependency of the exported environment
    ///
    /// Order follows the export. When the same project appears more than
    /// once (a conda spec and a pip pin, say), the last occurrence wins
    /// and keeps the first occurrence's position.
    pub fn classify(&self, doc: &EnvironmentDoc) -> Vec<ClassifiedDependency> {
        let mut results: Vec<ClassifiedDependency> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for entry in &doc.dependencies {
            match entry {
                DependencyEntry::Spec(spec) => {
                    let (name, _) = split_spec(spec);
                    if name.is_empty() {
                        continue;
                    }
                    let normalized = normalize_name(name);
                    if self.config.blacklist.contains(&normalized) {
                        debug!("Dropping blacklisted dependency '{}'", name);
                        continue;
                    }
                    let classified = self.classify_conda_spec(&normalized);
                    upsert(&mut results, &mut seen, normalized, classified);
                }
                DependencyEntry::Nested(sections) => {
                    let Some(pip_specs) = sections.get("pip") else {
                        debug!("Ignoring unrecognized nested dependency entry");
                        continue;
                    };
                    for spec in pip_specs {
                        let base = pip_base_name(spec);
                        if base.is_empty() {
                            continue;
                        }
                        let normalized = normalize_name(base);
                        if self.config.blacklist.contains(&normalized) {
                            debug!("Dropping blacklisted pip dependency '{}'", base);
                            continue;
                        }
                        upsert(
                            &mut results,
                            &mut seen,
                            normalized,
                            ClassifiedDependency::PassThrough { spec: spec.clone() },
                        );
                    }
                }
            }
        }

        results
    }

    fn classify_conda_spec(&self, normalized: &str) -> ClassifiedDependency {
        if self.oracle.exists(normalized) {
            debug!("'{}' resolves from the package index", normalized);
            ClassifiedDependency::RegistryResolvable {
                name: normalized.to_string(),
            }
        } else {
            let wheel_path = press::expected_wheel_path(&self.config.staging_dir, normalized);
            debug!(
                "'{}' is not on the index, promising wheel at {}",
                normalized,
                wheel_path.display()
            );
            ClassifiedDependency::LocallyFabricated {
                name: normalized.to_string(),
                wheel_path,
            }
        }
    }
}

/// Insert keyed on normalized name; a repeated name overwrites in place
/// so the final list holds one entry per project
fn upsert(
    results: &mut Vec<ClassifiedDependency>,
    seen: &mut HashMap<String, usize>,
    key: String,
    value: ClassifiedDependency,
) {
    match seen.get(&key) {
        Some(&slot) => results[slot] = value,
        None => {
            seen.insert(key, results.len());
            results.push(value);
        }
    }
}

/// Base project name of a pip requirement specifier
///
/// Cuts at the first version operator, extras bracket, environment marker,
/// or direct-reference separator: `requests==2.0` and
/// `pkg[extra]; python_version < "3.9"` both yield their bare name.
pub fn pip_base_name(spec: &str) -> &str {
    let spec = spec.trim();
    let end = spec
        .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | '[' | ';' | '@' | ' '))
        .unwrap_or(spec.len());
    spec[..end].trim_end()
}
