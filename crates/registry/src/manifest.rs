//! Command manifests: command schemas declared in JSON or YAML, each bound
//! to a handler reference that is resolved lazily on first execution.
//!
//! ```yaml
//! commands:
//!   - name: math sum
//!     description: Add numbers
//!     handler: math#sum
//!     parameters:
//!       - name: values
//!         type: array
//!         variadic: true
//!         required: true
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use omnicmd_engine::{Command, HandlerLoader, HandlerReference};
use omnicmd_types::{CommandError, CommandSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::CommandRegistry;

/// Errors emitted while reading a command manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Source was neither valid JSON nor valid YAML.
    #[error("manifest is not valid JSON or YAML: {0}")]
    Parse(String),
    #[error("invalid command '{name}' in manifest: {source}")]
    Command {
        name: String,
        #[source]
        source: CommandError,
    },
}

/// One manifest entry: a schema plus the reference to its handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestCommand {
    #[serde(flatten)]
    pub schema: CommandSchema,
    /// `module#export`; the export defaults to `handler`.
    pub handler: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandManifest {
    #[serde(default)]
    pub commands: Vec<ManifestCommand>,
}

impl CommandManifest {
    /// Parses JSON, falling back to YAML.
    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        serde_json::from_str::<Self>(source)
            .or_else(|_| serde_yaml::from_str::<Self>(source))
            .map_err(|error| ManifestError::Parse(error.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Builds lazy commands bound to `loader`. Nothing is resolved here.
    pub fn into_commands(self, loader: Arc<dyn HandlerLoader>) -> Result<Vec<Command>, ManifestError> {
        self.commands
            .into_iter()
            .map(|entry| {
                let name = entry.schema.name.clone();
                let reference = HandlerReference::parse(&entry.handler);
                Command::lazy(entry.schema, reference, loader.clone())
                    .map_err(|source| ManifestError::Command { name, source })
            })
            .collect()
    }
}

impl CommandRegistry {
    /// Loads a manifest file and registers its commands, returning how many
    /// were added.
    pub fn load_manifest(&mut self, path: &Path, loader: Arc<dyn HandlerLoader>) -> Result<usize, ManifestError> {
        let commands = CommandManifest::load(path)?.into_commands(loader)?;
        let count = commands.len();
        self.extend(commands);
        debug!(path = %path.display(), count, "loaded command manifest");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicmd_engine::{HandlerTable, LazyState, handler_fn};
    use omnicmd_types::{ExecutionContext, ParamType};
    use serde_json::{Map, json};
    use std::io::Write;

    const YAML: &str = r#"
commands:
  - name: greet
    description: Say hello
    handler: greetings#greet
    parameters:
      - name: name
        type: string
        required: true
  - name: list
    description: List things
    handler: lists
    parameters:
      - name: limit
        type: number
        default: 10
        min: 1
        max: 100
"#;

    fn loader() -> Arc<dyn HandlerLoader> {
        Arc::new(HandlerTable::new().with_handler(
            "greetings",
            "greet",
            handler_fn(|args, _| async move { Ok(json!(format!("Hello, {}!", args.str("name").unwrap_or_default()))) }),
        ))
    }

    #[test]
    fn parses_yaml_and_json() {
        let manifest = CommandManifest::parse(YAML).expect("yaml");
        assert_eq!(manifest.commands.len(), 2);
        assert_eq!(manifest.commands[1].schema.parameters[0].r#type, ParamType::Number);
        assert_eq!(manifest.commands[1].schema.parameters[0].min, Some(1.0));

        let json = r#"{"commands": [{"name": "x", "description": "X", "handler": "m#h"}]}"#;
        let manifest = CommandManifest::parse(json).expect("json");
        assert_eq!(manifest.commands[0].handler, "m#h");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(CommandManifest::parse("commands: [: nope"), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn invalid_entries_name_the_command() {
        let manifest = CommandManifest::parse(r#"{"commands": [{"name": "x", "description": "", "handler": "m"}]}"#)
            .expect("parse");
        let error = manifest.into_commands(loader()).unwrap_err();
        assert!(matches!(error, ManifestError::Command { ref name, .. } if name == "x"));
    }

    #[tokio::test]
    async fn manifest_commands_are_lazy() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(YAML.as_bytes()).expect("write manifest");

        let mut registry = CommandRegistry::new();
        let count = registry.load_manifest(file.path(), loader()).expect("load");
        assert_eq!(count, 2);

        let greet = registry.get("greet").expect("greet").clone();
        assert_eq!(greet.lazy_state(), Some(LazyState::Unloaded));

        let mut input = Map::new();
        input.insert("name".into(), json!("World"));
        let output = greet.execute(&input, ExecutionContext::test()).await.expect("execute");
        assert_eq!(output, json!("Hello, World!"));
        assert!(greet.is_handler_loaded());

        let list = registry.get("list").expect("list").clone();
        let error = list.execute(&Map::new(), ExecutionContext::test()).await.unwrap_err();
        assert!(matches!(error, CommandError::HandlerLoad(_)));
        assert_eq!(error.exit_code(), 78);
    }
}
