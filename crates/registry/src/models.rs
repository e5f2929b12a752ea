use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use omnicmd_engine::Command;
use omnicmd_types::CommandSchema;
use omnicmd_util::{agent_tool_name, api_path};
use tracing::debug;

/// Keyed lookup of commands by name, agent tool name and API path.
///
/// Registering a command whose key is already taken replaces the previous
/// entry in that index (last write wins). A command replaced by name also
/// loses its stale tool and path entries.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    by_name: IndexMap<String, Arc<Command>>,
    by_tool_name: HashMap<String, Arc<Command>>,
    by_api_path: HashMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, returning the shared handle stored in the indices.
    pub fn register(&mut self, command: Command) -> Arc<Command> {
        let command = Arc::new(command);
        self.register_shared(command.clone());
        command
    }

    pub fn register_shared(&mut self, command: Arc<Command>) {
        let schema = command.metadata();
        let name = schema.name.clone();
        let tool_name = agent_tool_name(schema);
        let path = api_path(schema);

        if let Some(previous) = self.by_name.insert(name.clone(), command.clone()) {
            debug!(command = %name, "replacing previously registered command");
            self.forget_secondary(&previous);
        }
        if let Some(previous) = self.by_tool_name.insert(tool_name.clone(), command.clone())
            && previous.name() != name
        {
            debug!(tool = %tool_name, previous = %previous.name(), command = %name, "agent tool name reassigned");
        }
        if let Some(previous) = self.by_api_path.insert(path.clone(), command)
            && previous.name() != name
        {
            debug!(path = %path, previous = %previous.name(), command = %name, "API path reassigned");
        }
    }

    pub fn extend<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = Command>,
    {
        for command in commands {
            self.register(command);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Command>> {
        let removed = self.by_name.shift_remove(name)?;
        self.forget_secondary(&removed);
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        self.by_name.get(name)
    }

    pub fn get_by_tool_name(&self, tool_name: &str) -> Option<&Arc<Command>> {
        self.by_tool_name.get(tool_name)
    }

    pub fn get_by_api_path(&self, path: &str) -> Option<&Arc<Command>> {
        self.by_api_path.get(path)
    }

    /// Commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.by_name.values()
    }

    pub fn to_vec(&self) -> Vec<Arc<Command>> {
        self.by_name.values().cloned().collect()
    }

    pub fn schemas(&self) -> Vec<&CommandSchema> {
        self.by_name.values().map(|command| command.metadata()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn forget_secondary(&mut self, stale: &Arc<Command>) {
        self.by_tool_name.retain(|_, command| !Arc::ptr_eq(command, stale));
        self.by_api_path.retain(|_, command| !Arc::ptr_eq(command, stale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicmd_engine::handler_fn;
    use omnicmd_types::{ApiOptions, McpOptions};
    use serde_json::json;

    fn command(schema: CommandSchema) -> Command {
        Command::new(schema, handler_fn(|_, _| async { Ok(json!(null)) })).expect("command")
    }

    #[test]
    fn indexes_by_all_three_keys() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandSchema::new("git commit", "Record changes")));

        assert!(registry.get("git commit").is_some());
        assert!(registry.get_by_tool_name("omnicmd_git_commit").is_some());
        assert!(registry.get_by_api_path("/git/commit").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_registration_wins_and_drops_stale_keys() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandSchema::new("deploy", "First").mcp(McpOptions {
            tool_name: Some("ship".into()),
        })));
        registry.register(command(CommandSchema::new("deploy", "Second").api(ApiOptions {
            path: Some("/releases".into()),
            ..Default::default()
        })));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("deploy").expect("by name").metadata().description, "Second");
        assert!(registry.get_by_tool_name("ship").is_none());
        assert!(registry.get_by_tool_name("omnicmd_deploy").is_some());
        assert!(registry.get_by_api_path("/deploy").is_none());
        assert!(registry.get_by_api_path("/releases").is_some());
    }

    #[test]
    fn colliding_secondary_keys_point_at_latest() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandSchema::new("a", "A").mcp(McpOptions {
            tool_name: Some("shared".into()),
        })));
        registry.register(command(CommandSchema::new("b", "B").mcp(McpOptions {
            tool_name: Some("shared".into()),
        })));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get_by_tool_name("shared").expect("tool").name(), "b");
    }

    #[test]
    fn remove_clears_every_index() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandSchema::new("status", "Show status")));
        let removed = registry.remove("status").expect("removed");
        assert_eq!(removed.name(), "status");
        assert!(registry.is_empty());
        assert!(registry.get_by_tool_name("omnicmd_status").is_none());
        assert!(registry.get_by_api_path("/status").is_none());
    }
}
