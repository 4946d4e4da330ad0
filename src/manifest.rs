// src/manifest.rs

//! Manifest assembly and project output
//!
//! Assembly itself is a pure mapping from classified dependencies and
//! channel list to the `pyproject.toml` structure; the only I/O lives in
//! [`write_project`], which materializes the manifest and the build-hook
//! module into the target directory.
//!
//! The generated manifest declares `dependencies` as dynamic and routes
//! everything through `[tool.unidep]`: registry-resolvable names stay
//! bare, and both pass-through pins and promised local wheels become pip
//! entries. The build-backend declaration points at the emitted hook
//! module next to the manifest.

use crate::backend::HOOK_MODULE_SOURCE;
use crate::classify::ClassifiedDependency;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Manifest filename within the generated project
pub const MANIFEST_FILE: &str = "pyproject.toml";

/// Hook module filename within the generated project
pub const HOOK_MODULE_FILE: &str = "build_hooks.py";

/// Build-time requirements of the generated project. The press tool and
/// the hook module's own imports must be importable when pip runs the
/// hooks in its isolated build environment.
const BUILD_REQUIRES: &[&str] = &["setuptools", "unidep", "conda-press", "tomli-w", "pyyaml"];

/// Module name the build-backend declaration points at
const BUILD_BACKEND: &str = "build_hooks";

/// User-supplied project identity carried into the manifest
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Interpreter constraint derived from the exported environment's own
    /// python pin; omitted from the manifest when the environment has none
    pub requires_python: Option<String>,
}

/// The assembled `pyproject.toml` document
#[derive(Debug, Serialize)]
pub struct PyprojectManifest {
    pub project: Project,
    #[serde(rename = "build-system")]
    pub build_system: BuildSystem,
    pub tool: Tool,
}

#[derive(Debug, Serialize)]
pub struct Project {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Dependencies are resolved by the unidep backend at build time
    pub dynamic: Vec<String>,
    #[serde(rename = "requires-python", skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildSystem {
    pub requires: Vec<String>,
    #[serde(rename = "build-backend")]
    pub build_backend: String,
    #[serde(rename = "backend-path")]
    pub backend_path: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub unidep: Unidep,
}

#[derive(Debug, Serialize)]
pub struct Unidep {
    pub channels: Vec<String>,
    pub dependencies: Vec<UnidepEntry>,
}

/// One `[tool.unidep]` dependency entry
///
/// Serializes as either a bare string or an inline `{ pip = "..." }`
/// table, matching the mixed array unidep consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UnidepEntry {
    Name(String),
    Pip { pip: String },
}

impl PyprojectManifest {
    /// Render the manifest as a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ManifestError(e.to_string()))
    }
}

/// Assemble the manifest from classified dependencies and channels
///
/// Pure: no filesystem or network access. Every classified dependency
/// maps to exactly one `[tool.unidep]` entry.
pub fn assemble(
    metadata: &ProjectMetadata,
    classified: &[ClassifiedDependency],
    channels: &[String],
) -> PyprojectManifest {
    let dependencies = classified.iter().map(unidep_entry).collect();

    PyprojectManifest {
        project: Project {
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            description: metadata.description.clone(),
            dynamic: vec!["dependencies".to_string()],
            requires_python: metadata.requires_python.clone(),
        },
        build_system: BuildSystem {
            requires: BUILD_REQUIRES.iter().map(|s| s.to_string()).collect(),
            build_backend: BUILD_BACKEND.to_string(),
            backend_path: vec![".".to_string()],
        },
        tool: Tool {
            unidep: Unidep {
                channels: channels.to_vec(),
                dependencies,
            },
        },
    }
}

fn unidep_entry(dep: &ClassifiedDependency) -> UnidepEntry {
    match dep {
        ClassifiedDependency::RegistryResolvable { name } => UnidepEntry::Name(name.clone()),
        ClassifiedDependency::LocallyFabricated { wheel_path, .. } => UnidepEntry::Pip {
            pip: local_reference(wheel_path),
        },
        ClassifiedDependency::PassThrough { spec } => UnidepEntry::Pip { pip: spec.clone() },
    }
}

/// Direct local-file reference for a staged wheel, anchored at the
/// project root where pip resolves it from
fn local_reference(wheel_path: &Path) -> String {
    if wheel_path.is_absolute() {
        wheel_path.display().to_string()
    } else {
        format!("./{}", wheel_path.display())
    }
}

/// Write the manifest and the build-hook module into `target_dir`
///
/// The directory is created if absent; existing files are overwritten.
/// Returns the absolute path of the project directory for reporting.
pub fn write_project(target_dir: &Path, manifest: &PyprojectManifest) -> Result<PathBuf> {
    fs::create_dir_all(target_dir)?;

    let document = manifest.to_toml_string()?;
    fs::write(target_dir.join(MANIFEST_FILE), document)?;
    fs::write(target_dir.join(HOOK_MODULE_FILE), HOOK_MODULE_SOURCE)?;

    let absolute = target_dir.canonicalize()?;
    info!(
        "Wrote {} and {} to {}",
        MANIFEST_FILE,
        HOOK_MODULE_FILE,
        absolute.display()
    );
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata() -> ProjectMetadata {
        ProjectMetadata {
            name: "demo".to_string(),
            version: "0.1.0".to_string(),
            description: "A demo project".to_string(),
            requires_python: Some(">=3.11".to_string()),
        }
    }

    fn classified() -> Vec<ClassifiedDependency> {
        vec![
            ClassifiedDependency::RegistryResolvable {
                name: "numpy".to_string(),
            },
            ClassifiedDependency::LocallyFabricated {
                name: "some-internal-lib".to_string(),
                wheel_path: PathBuf::from(
                    "portable_wheels/some_internal_lib-0.1.0-py3-none-any.whl",
                ),
            },
            ClassifiedDependency::PassThrough {
                spec: "requests==2.0".to_string(),
            },
        ]
    }

    fn channels() -> Vec<String> {
        vec!["conda-forge".to_string(), "defaults".to_string()]
    }

    #[test]
    fn test_assemble_maps_each_variant() {
        let manifest = assemble(&metadata(), &classified(), &channels());

        assert_eq!(
            manifest.tool.unidep.dependencies,
            vec![
                UnidepEntry::Name("numpy".to_string()),
                UnidepEntry::Pip {
                    pip: "./portable_wheels/some_internal_lib-0.1.0-py3-none-any.whl".to_string()
                },
                UnidepEntry::Pip {
                    pip: "requests==2.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_manifest_document_shape() {
        let manifest = assemble(&metadata(), &classified(), &channels());
        let document = manifest.to_toml_string().unwrap();

        // Parse the rendered document back instead of matching on layout
        let value: toml::Value = toml::from_str(&document).unwrap();

        assert_eq!(value["project"]["name"].as_str(), Some("demo"));
        assert_eq!(value["project"]["version"].as_str(), Some("0.1.0"));
        assert_eq!(value["project"]["requires-python"].as_str(), Some(">=3.11"));
        assert_eq!(
            value["project"]["dynamic"][0].as_str(),
            Some("dependencies")
        );

        assert_eq!(
            value["build-system"]["build-backend"].as_str(),
            Some("build_hooks")
        );
        assert_eq!(value["build-system"]["backend-path"][0].as_str(), Some("."));
        let requires = value["build-system"]["requires"].as_array().unwrap();
        assert!(requires.iter().any(|r| r.as_str() == Some("conda-press")));

        assert_eq!(
            value["tool"]["unidep"]["channels"][0].as_str(),
            Some("conda-forge")
        );
        let deps = value["tool"]["unidep"]["dependencies"].as_array().unwrap();
        assert_eq!(deps[0].as_str(), Some("numpy"));
        assert_eq!(
            deps[1]["pip"].as_str(),
            Some("./portable_wheels/some_internal_lib-0.1.0-py3-none-any.whl")
        );
        assert_eq!(deps[2]["pip"].as_str(), Some("requests==2.0"));
    }

    #[test]
    fn test_requires_python_omitted_when_unknown() {
        let mut metadata = metadata();
        metadata.requires_python = None;

        let manifest = assemble(&metadata, &[], &channels());
        let document = manifest.to_toml_string().unwrap();

        assert!(!document.contains("requires-python"));
    }

    #[test]
    fn test_write_project_emits_manifest_and_hooks() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("demo");
        let manifest = assemble(&metadata(), &classified(), &channels());

        let reported = write_project(&target, &manifest).unwrap();

        assert!(reported.is_absolute());
        assert!(target.join(MANIFEST_FILE).exists());
        let hooks = fs::read_to_string(target.join(HOOK_MODULE_FILE)).unwrap();
        assert!(hooks.contains("def build_wheel("));

        // Rerunning into an existing directory overwrites in place
        write_project(&target, &manifest).unwrap();
    }

    #[test]
    fn test_manifest_round_trips_promised_wheel_path() {
        // The path written to the manifest is exactly the classifier's
        // promised artifact path, ./-anchored
        let dep = ClassifiedDependency::LocallyFabricated {
            name: "foo".to_string(),
            wheel_path: PathBuf::from("portable_wheels/foo-0.1.0-py3-none-any.whl"),
        };
        assert_eq!(
            unidep_entry(&dep),
            UnidepEntry::Pip {
                pip: "./portable_wheels/foo-0.1.0-py3-none-any.whl".to_string()
            }
        );
    }
}
