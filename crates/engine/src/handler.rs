use std::{future::Future, sync::Arc};

use futures_util::future::BoxFuture;
use omnicmd_types::{CommandError, ExecutionContext, ValidatedArgs};
use serde_json::Value;

/// Result produced by a command handler.
pub type HandlerResult = Result<Value, CommandError>;

/// A command implementation: validated arguments plus the invocation
/// context in, a JSON value out.
pub type Handler = Arc<dyn Fn(ValidatedArgs, ExecutionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wraps an async function or closure as a [`Handler`].
///
/// ```rust
/// use omnicmd_engine::handler_fn;
/// use serde_json::json;
///
/// let greet = handler_fn(|args, _context| async move {
///     let name = args.str("name").unwrap_or("World").to_string();
///     Ok(json!(format!("Hello, {name}!")))
/// });
/// # let _ = greet;
/// ```
pub fn handler_fn<F, Fut>(handler: F) -> Handler
where
    F: Fn(ValidatedArgs, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |args, context| Box::pin(handler(args, context)))
}
