//! Closed error taxonomy shared by every surface.
//!
//! Each kind carries a fixed CLI exit code (sysexits style) and HTTP status.

use serde_json::Value;
use thiserror::Error;

use crate::FieldError;

/// Failure to resolve a lazily referenced handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("handler module '{path}' could not be loaded: {reason}")]
    ModuleNotFound { path: String, reason: String },

    #[error("handler module '{path}' has no export '{export}' (available exports: {})", list_or_none(.available))]
    ExportNotFound {
        path: String,
        export: String,
        available: Vec<String>,
    },

    #[error("export '{export}' of handler module '{path}' is not callable (available exports: {})", list_or_none(.available))]
    NotCallable {
        path: String,
        export: String,
        available: Vec<String>,
    },
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

/// Error raised by command execution on any surface.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("Validation failed: {}", summarize(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    HandlerLoad(#[from] LoadError),

    #[error("{0}")]
    Failed(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.path, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CommandError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 64,
            Self::Authentication(_) | Self::Authorization(_) => 77,
            Self::NotFound(_) => 66,
            Self::Timeout(_) => 124,
            Self::Configuration(_) | Self::HandlerLoad(_) => 78,
            Self::Failed(_) => 1,
        }
    }

    /// HTTP status for the API surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authentication(_) => 401,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Timeout(_) => 504,
            Self::Configuration(_) | Self::HandlerLoad(_) | Self::Failed(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Authentication(_) => "authentication",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Configuration(_) => "configuration",
            Self::HandlerLoad(_) => "handler_load",
            Self::Failed(_) => "command",
        }
    }

    /// Structured details for API error bodies: the field errors of a
    /// validation failure, `null` otherwise.
    pub fn details(&self) -> Value {
        match self {
            Self::Validation { errors } => serde_json::to_value(errors).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Field errors when this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}
