use std::sync::Arc;

use indexmap::IndexMap;
use omnicmd_registry::CommandRegistry;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ErrorData, Implementation, ListToolsResult, PaginatedRequestParams,
    ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{RoleServer, ServerHandler, service::RequestContext};
use tracing::debug;

use crate::{AgentTool, to_mcp};

/// rmcp handler exposing registry commands as agent tools.
#[derive(Debug, Clone)]
pub struct OmnicmdMcpCore {
    tools: Arc<IndexMap<String, AgentTool>>,
    instructions: Option<String>,
}

impl OmnicmdMcpCore {
    /// Snapshot of the registry's commands, keyed by tool name.
    pub fn new(registry: &CommandRegistry) -> Self {
        let mut tools = IndexMap::new();
        for command in registry.commands() {
            let tool = to_mcp(command);
            tools.insert(tool.name.clone(), tool);
        }
        debug!(count = tools.len(), "agent tools ready");
        Self {
            tools: Arc::new(tools),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool(&self, name: &str) -> Option<&AgentTool> {
        self.tools.get(name)
    }

    pub fn tools(&self) -> impl Iterator<Item = &AgentTool> {
        self.tools.values()
    }

    /// Dispatches a call by tool name. Unknown names are protocol errors;
    /// command failures are successful calls flagged `is_error`.
    pub async fn call(&self, request: CallToolRequestParams) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = self.tools.get(request.name.as_ref()) else {
            return Err(ErrorData::invalid_params(format!("unknown tool '{}'", request.name), None));
        };
        debug!(tool = %tool.name, "calling agent tool");
        let output = tool.execute(request.arguments.unwrap_or_default()).await;
        Ok(output.into_call_result())
    }
}

impl ServerHandler for OmnicmdMcpCore {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        let tools = self.tools.values().map(AgentTool::to_rmcp).collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        self.call(request)
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "omnicmd".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Omnicmd MCP".to_string()),
                ..Default::default()
            },
            instructions: self.instructions.clone(),
        }
    }
}
