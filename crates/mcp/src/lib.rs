//! Agent tool surface for Omnicmd commands.
//!
//! Each command projects onto an [`AgentTool`] (name, description, JSON
//! input schema, execute). [`OmnicmdMcpCore`] serves the registry's tools
//! through rmcp over stdio or streamable HTTP.

pub mod server;
pub mod tool;

pub use server::{McpHttpServer, OmnicmdMcpCore, RunningMcpHttpServer, resolve_bind_address, serve_stdio};
pub use tool::{AgentTool, ToAgentTool, ToolOutput, to_mcp};
