//! Shared type definitions for omnicmd.
//!
//! This crate holds the declarative pieces every other crate agrees on: the
//! parameter and command schemas, the per-surface option blocks, the
//! validation result shapes, the execution context handed to handlers, and
//! the closed error taxonomy with its exit/status mapping.

pub mod command;
pub mod context;
pub mod error;
pub mod param;
pub mod request;
pub mod validation;

pub use command::{ApiOptions, CacheControl, CliOptions, CommandSchema, HttpMethod, McpOptions, OutputFormatter, OutputType};
pub use context::{ExecutionContext, Interface, OutputStream, PromptFn};
pub use error::{CommandError, LoadError};
pub use param::{ParamType, Parameter};
pub use request::ApiRequest;
pub use validation::{FieldError, ValidatedArgs, ValidationResult};
