use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Parameter;

/// Shape of a command's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Json,
    Text,
    Stream,
}

/// Custom CLI rendering of a command's result.
#[derive(Clone)]
pub struct OutputFormatter(Arc<dyn Fn(&Value) -> String + Send + Sync>);

impl OutputFormatter {
    pub fn new<F>(format: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(format))
    }

    pub fn format(&self, value: &Value) -> String {
        (self.0)(value)
    }
}

impl fmt::Debug for OutputFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputFormatter(..)")
    }
}

/// CLI-specific options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliOptions {
    /// Explicit command path; overrides splitting the command name on spaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    /// Additional invocation names for the leaf command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub allow_unknown_option: bool,
    /// Accept arguments after a literal `--` and hand them to the handler.
    #[serde(default)]
    pub pass_through_options: bool,
    /// Give the handler a writable stream for incremental output.
    #[serde(default)]
    pub streaming: bool,
    #[serde(skip)]
    pub format: Option<OutputFormatter>,
}

/// HTTP verbs a command route may answer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache directives, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revalidate: Option<u64>,
}

/// HTTP API options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOptions {
    #[serde(default)]
    pub method: HttpMethod,
    /// Route override, e.g. `/users/{id}`. Defaults to the command path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheControl>,
}

/// Agent tool options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// The declarative description of one command.
///
/// `name` is a space separated hierarchical path such as `"git commit"`.
/// The schema is plain data; the handler lives on the engine's `Command`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSchema {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub output: OutputType,
    #[serde(default)]
    pub cli: CliOptions,
    #[serde(default)]
    pub api: ApiOptions,
    #[serde(default)]
    pub mcp: McpOptions,
}

impl CommandSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn output(mut self, output: OutputType) -> Self {
        self.output = output;
        self
    }

    pub fn cli(mut self, cli: CliOptions) -> Self {
        self.cli = cli;
        self
    }

    pub fn api(mut self, api: ApiOptions) -> Self {
        self.api = api;
        self
    }

    pub fn mcp(mut self, mcp: McpOptions) -> Self {
        self.mcp = mcp;
        self
    }

    /// Path segments of the command: `cli.path` when set, otherwise the
    /// whitespace separated components of `name`.
    pub fn path_segments(&self) -> Vec<String> {
        match &self.cli.path {
            Some(path) if !path.is_empty() => path.clone(),
            _ => self.name.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// The last path segment, used as the CLI subcommand name.
    pub fn leaf_name(&self) -> String {
        self.path_segments().pop().unwrap_or_else(|| self.name.clone())
    }
}
