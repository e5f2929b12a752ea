mod core;
mod http;
mod stdio;

pub use core::OmnicmdMcpCore;
pub use http::{McpHttpServer, RunningMcpHttpServer, resolve_bind_address};
pub use stdio::serve_stdio;
