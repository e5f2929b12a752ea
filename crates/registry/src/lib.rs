//! Registry crate for Omnicmd commands.
//!
//! Holds the three-index [`CommandRegistry`], projects commands onto a clap
//! command tree, and loads commands declared in JSON or YAML manifests.

pub mod clap_builder;
pub mod manifest;
pub mod models;

pub use clap_builder::{
    CliApp, CliCommand, CliEnvironment, CliNode, EXIT_USAGE, ToCli, build_command_tree, render_output,
    report_parse_error, to_cli,
};
pub use manifest::{CommandManifest, ManifestCommand, ManifestError};
pub use models::CommandRegistry;
