//! Pure projection helpers shared by the surface crates.
//!
//! - [`usage`]: positional ordering and bracket notation, the single
//!   algorithm both the CLI projector and the help projector use
//! - [`schema`]: JSON Schema generation, HTTP request extraction, tool
//!   names and API paths
//! - [`help`]: plain text help, Markdown documentation and command lists

pub mod help;
pub mod path_processing;
pub mod schema;
pub mod usage;

pub use help::{generate_command_list, generate_help, generate_markdown};
pub use path_processing::expand_tilde;
pub use schema::{TOOL_NAMESPACE, agent_tool_name, api_path, coerce_str, extract_from_request, to_json_schema};
pub use usage::{flag_parameters, flag_syntax, positional_syntax, sorted_positionals, usage_line};
