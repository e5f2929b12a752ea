//! # Omnicmd Engine
//!
//! Validates raw input against declared parameters and executes commands.
//!
//! ## Architecture
//!
//! - **`validate`**: pure validation and defaulting of untyped input
//! - **`definition`**: construction-time checks on command schemas
//! - **`command`**: the `Command` type binding a schema to a handler
//! - **`loader`** / **`lazy`**: deferred handler resolution through the
//!   `HandlerLoader` seam, with a cached, forward-only state machine
//!
//! ## Usage
//!
//! ```rust
//! use omnicmd_engine::{Command, handler_fn};
//! use omnicmd_types::{CommandSchema, ExecutionContext, Parameter};
//! use serde_json::{Map, json};
//!
//! # tokio_test_block(async {
//! let schema = CommandSchema::new("greet", "Say hello").param(Parameter::string("name").required());
//! let command = Command::new(
//!     schema,
//!     handler_fn(|args, _| async move { Ok(json!(format!("Hello, {}!", args.str("name").unwrap_or_default()))) }),
//! )?;
//!
//! let mut input = Map::new();
//! input.insert("name".into(), json!("World"));
//! let output = command.execute(&input, ExecutionContext::test()).await?;
//! assert_eq!(output, json!("Hello, World!"));
//! # Ok::<(), omnicmd_types::CommandError>(())
//! # });
//! # fn tokio_test_block<F: std::future::Future<Output = Result<(), omnicmd_types::CommandError>>>(future: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future).unwrap();
//! # }
//! ```

pub mod command;
pub mod definition;
pub mod handler;
pub mod lazy;
pub mod loader;
pub mod validate;

pub use command::Command;
pub use handler::{Handler, HandlerResult, handler_fn};
pub use lazy::{LazyHandler, LazyState};
pub use loader::{DEFAULT_EXPORT, HandlerLoader, HandlerReference, HandlerTable, ModuleExport};
pub use validate::validate;
