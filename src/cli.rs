// src/cli.rs
//! CLI definitions for wheelwright
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementation is in the `commands` module.
//!
//! `--version` is the version written into the generated manifest, not the
//! tool's own; clap's automatic version flag stays disabled so the two
//! cannot collide.

use clap::Parser;

#[derive(Parser)]
#[command(name = "wheelwright")]
#[command(author = "Wheelwright Contributors")]
#[command(
    about = "Convert the active conda environment into a pip-installable project",
    long_about = None
)]
pub struct Cli {
    /// Name of the generated project; also the output directory
    #[arg(long)]
    pub project_name: String,

    /// One-line description recorded in the manifest
    #[arg(long)]
    pub project_description: String,

    /// Project version recorded in the manifest
    #[arg(long, default_value = "0.1.0")]
    pub version: String,
}
