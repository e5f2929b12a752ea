//! Agent tool projection of a command.

use std::sync::Arc;

use omnicmd_engine::Command;
use omnicmd_types::{ExecutionContext, Interface};
use omnicmd_util::{agent_tool_name, to_json_schema};
use rmcp::model::{CallToolResult, Content, Tool};
use serde_json::{Map, Value};
use tracing::warn;

/// A command exposed as an agent tool: name, description and input schema
/// plus an `execute` that reports every outcome as text.
#[derive(Debug, Clone)]
pub struct AgentTool {
    pub name: String,
    pub description: String,
    pub input_schema: Map<String, Value>,
    command: Arc<Command>,
}

/// Text outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn into_call_result(self) -> CallToolResult {
        let content = vec![Content::text(self.text)];
        if self.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

pub trait ToAgentTool {
    fn to_mcp(&self) -> AgentTool;
}

impl ToAgentTool for Arc<Command> {
    fn to_mcp(&self) -> AgentTool {
        to_mcp(self)
    }
}

/// Builds the tool definition from metadata alone; handlers stay unresolved.
pub fn to_mcp(command: &Arc<Command>) -> AgentTool {
    let schema = command.metadata();
    AgentTool {
        name: agent_tool_name(schema),
        description: schema.description.clone(),
        input_schema: to_json_schema(&schema.parameters),
        command: command.clone(),
    }
}

impl AgentTool {
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Runs the command. Never fails: errors come back as `Error: <message>`
    /// with `is_error` set, results as pretty printed JSON.
    pub async fn execute(&self, args: Map<String, Value>) -> ToolOutput {
        let context = ExecutionContext::new(Interface::Mcp);
        match self.command.execute(&args, context).await {
            Ok(value) => ToolOutput {
                text: serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                is_error: false,
            },
            Err(error) => {
                warn!(tool = %self.name, kind = error.kind(), %error, "agent tool call failed");
                ToolOutput {
                    text: format!("Error: {error}"),
                    is_error: true,
                }
            }
        }
    }

    pub fn to_rmcp(&self) -> Tool {
        Tool::new(self.name.clone(), self.description.clone(), Arc::new(self.input_schema.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicmd_engine::handler_fn;
    use omnicmd_types::{CommandError, CommandSchema, McpOptions, Parameter};
    use serde_json::json;

    fn greet() -> Arc<Command> {
        let schema = CommandSchema::new("greet", "Say hello").param(Parameter::string("name").required());
        Arc::new(
            Command::new(
                schema,
                handler_fn(|args, _| async move { Ok(json!(format!("Hello, {}!", args.str("name").unwrap_or_default()))) }),
            )
            .expect("command"),
        )
    }

    #[test]
    fn projects_name_and_schema() {
        let tool = greet().to_mcp();
        assert_eq!(tool.name, "omnicmd_greet");
        assert_eq!(tool.description, "Say hello");
        assert_eq!(tool.input_schema["required"], json!(["name"]));

        let rmcp_tool = tool.to_rmcp();
        assert_eq!(rmcp_tool.name, "omnicmd_greet");
        assert_eq!(rmcp_tool.input_schema["type"], json!("object"));
    }

    #[test]
    fn override_name_is_used_verbatim() {
        let schema = CommandSchema::new("git commit", "Commit").mcp(McpOptions {
            tool_name: Some("commit_changes".into()),
        });
        let command = Arc::new(Command::new(schema, handler_fn(|_, _| async { Ok(Value::Null) })).expect("command"));
        assert_eq!(command.to_mcp().name, "commit_changes");
    }

    #[tokio::test]
    async fn success_is_pretty_json_text() {
        let mut args = Map::new();
        args.insert("name".into(), json!("World"));
        let output = greet().to_mcp().execute(args).await;
        assert_eq!(output, ToolOutput {
            text: "\"Hello, World!\"".into(),
            is_error: false,
        });
    }

    #[tokio::test]
    async fn failures_are_reported_as_text() {
        let output = greet().to_mcp().execute(Map::new()).await;
        assert!(output.is_error);
        assert_eq!(output.text, "Error: Validation failed: name: Parameter 'name' is required");

        let failing = Arc::new(
            Command::new(
                CommandSchema::new("boom", "Fails"),
                handler_fn(|_, _| async { Err(CommandError::failed("exploded")) }),
            )
            .expect("command"),
        );
        let output = failing.to_mcp().execute(Map::new()).await;
        assert_eq!(output.text, "Error: exploded");
        assert_eq!(output.into_call_result().is_error, Some(true));
    }
}
