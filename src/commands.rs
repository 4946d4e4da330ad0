// src/commands.rs
//! Command handler for the wheelwright CLI

use anyhow::Result;
use std::path::Path;
use tracing::info;
use wheelwright::classify::{Classifier, ClassifierConfig};
use wheelwright::conda;
use wheelwright::manifest::{self, ProjectMetadata};
use wheelwright::registry::PypiRegistry;

/// Generate a pip-installable project from the active conda environment
///
/// Export failure is fatal and carries the conda tool's own error text;
/// nothing is written in that case. Everything after a successful export
/// degrades safely: unreachable registry means "press locally", missing
/// channel configuration falls back to the defaults.
pub fn cmd_generate(project_name: &str, project_description: &str, version: &str) -> Result<()> {
    info!("Exporting the active conda environment");
    let doc = conda::export_environment()?;
    let channels = conda::configured_channels();

    let oracle = PypiRegistry::new()?;
    let config = ClassifierConfig::default();
    let classified = Classifier::new(&config, &oracle).classify(&doc);
    info!("Classified {} dependencies", classified.len());

    let metadata = ProjectMetadata {
        name: project_name.to_string(),
        version: version.to_string(),
        description: project_description.to_string(),
        requires_python: conda::python_requires(&doc),
    };
    let manifest = manifest::assemble(&metadata, &classified, &channels);

    let location = manifest::write_project(Path::new(project_name), &manifest)?;
    println!("Successfully generated project in: {}", location.display());
    Ok(())
}
