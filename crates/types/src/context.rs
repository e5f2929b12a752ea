use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex},
};

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiRequest, CommandError};

/// The surface that is invoking a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Cli,
    Api,
    Mcp,
    Test,
}

/// A writable output sink handed to handlers.
///
/// Writes are fire-and-forget: I/O failures are dropped, buffering is the
/// caller's concern. `Memory` collects output for inspection in tests.
#[derive(Debug, Clone)]
pub enum OutputStream {
    Stdout,
    Stderr,
    Memory(Arc<Mutex<Vec<u8>>>),
}

impl OutputStream {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn write_str(&self, text: &str) {
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Self::Stderr => {
                let _ = std::io::stderr().lock().write_all(text.as_bytes());
            }
            Self::Memory(buffer) => {
                if let Ok(mut bytes) = buffer.lock() {
                    bytes.extend_from_slice(text.as_bytes());
                }
            }
        }
    }

    pub fn write_line(&self, text: &str) {
        self.write_str(text);
        self.write_str("\n");
    }

    /// Collected output of a `Memory` stream; empty for process streams.
    pub fn contents(&self) -> String {
        match self {
            Self::Memory(buffer) => buffer
                .lock()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// Asynchronous question/answer callback offered to interactive handlers.
#[derive(Clone)]
pub struct PromptFn(Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, CommandError>> + Send + Sync>);

impl PromptFn {
    pub fn new<F>(prompt: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, Result<String, CommandError>> + Send + Sync + 'static,
    {
        Self(Arc::new(prompt))
    }

    pub fn ask(&self, question: impl Into<String>) -> BoxFuture<'static, Result<String, CommandError>> {
        (self.0)(question.into())
    }
}

impl fmt::Debug for PromptFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PromptFn(..)")
    }
}

/// Per-invocation details passed through to the handler untouched.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub interface: Interface,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
    /// Present for streaming CLI commands.
    pub stream: Option<OutputStream>,
    /// The originating HTTP request for API calls.
    pub request: Option<ApiRequest>,
    /// Root-level CLI flags such as `--json` and `--verbose`.
    pub global_flags: IndexMap<String, Value>,
    /// Arguments following a literal `--`.
    pub pass_through: Vec<String>,
    pub prompt: Option<PromptFn>,
}

impl ExecutionContext {
    pub fn new(interface: Interface) -> Self {
        Self {
            interface,
            stdout: None,
            stderr: None,
            stream: None,
            request: None,
            global_flags: IndexMap::new(),
            pass_through: Vec::new(),
            prompt: None,
        }
    }

    pub fn test() -> Self {
        Self::new(Interface::Test)
    }

    pub fn with_stdout(mut self, stream: OutputStream) -> Self {
        self.stdout = Some(stream);
        self
    }

    pub fn with_stderr(mut self, stream: OutputStream) -> Self {
        self.stderr = Some(stream);
        self
    }

    pub fn with_stream(mut self, stream: OutputStream) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_request(mut self, request: ApiRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_global_flag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.global_flags.insert(name.into(), value.into());
        self
    }

    pub fn with_pass_through(mut self, args: Vec<String>) -> Self {
        self.pass_through = args;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptFn) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Reads a boolean global flag, treating absence as false.
    pub fn global_flag(&self, name: &str) -> bool {
        self.global_flags.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}
