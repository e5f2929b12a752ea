use std::{fmt, sync::Arc};

use omnicmd_types::{CommandError, CommandSchema, ExecutionContext, Parameter, ValidationResult};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Handler, HandlerLoader, HandlerReference, LazyHandler, LazyState, definition::check_schema, validate::validate};

enum HandlerBinding {
    Eager(Handler),
    Lazy(LazyHandler),
}

/// One schema bound to one handler: the unit registries index and every
/// surface executes.
///
/// A command built with [`Command::lazy`] only holds a reference to its
/// handler. Metadata, validation and all projections work without loading
/// it; the first [`Command::execute`] with valid input or an explicit
/// [`Command::preload`] resolves it.
pub struct Command {
    schema: CommandSchema,
    binding: HandlerBinding,
}

impl Command {
    /// Creates a command with an already available handler.
    pub fn new(schema: CommandSchema, handler: Handler) -> Result<Self, CommandError> {
        check_schema(&schema)?;
        Ok(Self {
            schema,
            binding: HandlerBinding::Eager(handler),
        })
    }

    /// Creates a command whose handler is resolved through `loader` on first use.
    pub fn lazy(
        schema: CommandSchema,
        reference: HandlerReference,
        loader: Arc<dyn HandlerLoader>,
    ) -> Result<Self, CommandError> {
        check_schema(&schema)?;
        if reference.path.trim().is_empty() {
            return Err(CommandError::configuration(format!(
                "command '{}' must reference a handler path",
                schema.name
            )));
        }
        if reference.export.trim().is_empty() {
            return Err(CommandError::configuration(format!(
                "command '{}' must reference a handler export",
                schema.name
            )));
        }
        Ok(Self {
            schema,
            binding: HandlerBinding::Lazy(LazyHandler::new(reference, loader)),
        })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn metadata(&self) -> &CommandSchema {
        &self.schema
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.schema.parameters
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.binding, HandlerBinding::Lazy(_))
    }

    /// True for eager commands and for lazy commands that resolved successfully.
    pub fn is_handler_loaded(&self) -> bool {
        match &self.binding {
            HandlerBinding::Eager(_) => true,
            HandlerBinding::Lazy(lazy) => lazy.is_loaded(),
        }
    }

    /// Resolution state, for lazy commands only.
    pub fn lazy_state(&self) -> Option<LazyState> {
        match &self.binding {
            HandlerBinding::Eager(_) => None,
            HandlerBinding::Lazy(lazy) => Some(lazy.state()),
        }
    }

    pub fn handler_reference(&self) -> Option<&HandlerReference> {
        match &self.binding {
            HandlerBinding::Eager(_) => None,
            HandlerBinding::Lazy(lazy) => Some(lazy.reference()),
        }
    }

    pub fn validate(&self, input: &Map<String, Value>) -> ValidationResult {
        validate(&self.schema.parameters, input)
    }

    /// Forces handler resolution ahead of the first call.
    pub async fn preload(&self) -> Result<(), CommandError> {
        self.handler().await.map(|_| ())
    }

    /// Validates `input`, resolves the handler if needed, and runs it.
    ///
    /// Invalid input fails with [`CommandError::Validation`] before any
    /// resolution is attempted. Handler errors are returned unchanged.
    pub async fn execute(&self, input: &Map<String, Value>, context: ExecutionContext) -> Result<Value, CommandError> {
        let args = self.validate(input).into_result().inspect_err(|error| {
            debug!(command = %self.schema.name, %error, "rejected invalid input");
        })?;
        let handler = self.handler().await?;
        debug!(command = %self.schema.name, interface = ?context.interface, "executing command");
        handler(args, context).await
    }

    async fn handler(&self) -> Result<Handler, CommandError> {
        match &self.binding {
            HandlerBinding::Eager(handler) => Ok(handler.clone()),
            HandlerBinding::Lazy(lazy) => lazy.resolve().await.map_err(CommandError::from),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.schema.name)
            .field("lazy", &self.is_lazy())
            .field("loaded", &self.is_handler_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandlerTable, handler_fn};
    use async_trait::async_trait;
    use omnicmd_types::{LoadError, ValidatedArgs};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn greet_schema() -> CommandSchema {
        CommandSchema::new("greet", "Say hello").param(Parameter::string("name").required())
    }

    fn greet_handler() -> Handler {
        handler_fn(|args: ValidatedArgs, _| async move {
            let name = args.str("name").unwrap_or_default().to_string();
            Ok(json!(format!("Hello, {name}!")))
        })
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[derive(Default)]
    struct CountingLoader {
        attempts: AtomicUsize,
        inner: HandlerTable,
    }

    #[async_trait]
    impl HandlerLoader for CountingLoader {
        async fn resolve(&self, reference: &HandlerReference) -> Result<Handler, LoadError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(reference).await
        }
    }

    #[tokio::test]
    async fn missing_required_input_is_a_validation_error() {
        let command = Command::new(greet_schema(), greet_handler()).expect("command");
        let error = command.execute(&input(json!({})), ExecutionContext::test()).await.unwrap_err();
        match error {
            CommandError::Validation { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "name");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_input_reaches_handler() {
        let command = Command::new(greet_schema(), greet_handler()).expect("command");
        let value = command
            .execute(&input(json!({"name": "World"})), ExecutionContext::test())
            .await
            .expect("execute");
        assert_eq!(value, json!("Hello, World!"));
    }

    #[tokio::test]
    async fn handler_receives_defaults() {
        let schema = CommandSchema::new("list", "List things")
            .param(Parameter::number("limit").with_default(10).with_min(1.0).with_max(100.0));
        let command = Command::new(schema, handler_fn(|args, _| async move { Ok(args.to_json()) })).expect("command");
        let value = command.execute(&input(json!({})), ExecutionContext::test()).await.expect("execute");
        assert_eq!(value, json!({"limit": 10}));

        let error = command
            .execute(&input(json!({"limit": 0})), ExecutionContext::test())
            .await
            .unwrap_err();
        assert_eq!(error.field_errors()[0].path, "limit");
    }

    #[tokio::test]
    async fn handler_errors_propagate_unchanged() {
        let command = Command::new(
            CommandSchema::new("fail", "Always fails"),
            handler_fn(|_, _| async { Err(CommandError::not_found("no such thing")) }),
        )
        .expect("command");
        let error = command.execute(&Map::new(), ExecutionContext::test()).await.unwrap_err();
        assert!(matches!(error, CommandError::NotFound(ref message) if message == "no such thing"));
    }

    #[test]
    fn construction_rejects_incomplete_definitions() {
        assert!(Command::new(CommandSchema::new("", "x"), greet_handler()).is_err());
        assert!(Command::new(CommandSchema::new("x", ""), greet_handler()).is_err());
        let loader: Arc<dyn HandlerLoader> = Arc::new(HandlerTable::new());
        assert!(Command::lazy(greet_schema(), HandlerReference::new(""), loader).is_err());
    }

    #[tokio::test]
    async fn lazy_metadata_and_validation_do_not_resolve() {
        let loader = Arc::new(CountingLoader::default());
        let command = Command::lazy(greet_schema(), HandlerReference::new("greet"), loader.clone()).expect("command");
        assert_eq!(command.metadata().name, "greet");
        assert!(!command.validate(&input(json!({}))).is_valid());
        assert!(!command.is_handler_loaded());
        assert_eq!(command.lazy_state(), Some(LazyState::Unloaded));

        let error = command.execute(&input(json!({})), ExecutionContext::test()).await.unwrap_err();
        assert!(matches!(error, CommandError::Validation { .. }));
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lazy_resolves_on_first_valid_execute() {
        let loader = Arc::new(CountingLoader {
            attempts: AtomicUsize::new(0),
            inner: HandlerTable::new().with_handler("greet", "handler", greet_handler()),
        });
        let command = Command::lazy(greet_schema(), HandlerReference::new("greet"), loader.clone()).expect("command");
        for _ in 0..2 {
            let value = command
                .execute(&input(json!({"name": "World"})), ExecutionContext::test())
                .await
                .expect("execute");
            assert_eq!(value, json!("Hello, World!"));
        }
        assert!(command.is_handler_loaded());
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lazy_load_failure_is_replayed_without_retry() {
        let loader = Arc::new(CountingLoader::default());
        let command =
            Command::lazy(greet_schema(), HandlerReference::new("./missing/handler"), loader.clone()).expect("command");
        let args = input(json!({"name": "World"}));

        let first = command.execute(&args, ExecutionContext::test()).await.unwrap_err();
        let second = command.execute(&args, ExecutionContext::test()).await.unwrap_err();

        assert!(matches!(first, CommandError::HandlerLoad(LoadError::ModuleNotFound { .. })));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(command.lazy_state(), Some(LazyState::Failed(_))));
    }

    #[tokio::test]
    async fn preload_resolves_ahead_of_execute() {
        let loader = Arc::new(CountingLoader {
            attempts: AtomicUsize::new(0),
            inner: HandlerTable::new().with_handler("greet", "handler", greet_handler()),
        });
        let command = Command::lazy(greet_schema(), HandlerReference::new("greet"), loader.clone()).expect("command");
        command.preload().await.expect("preload");
        assert!(command.is_handler_loaded());
        command
            .execute(&input(json!({"name": "x"})), ExecutionContext::test())
            .await
            .expect("execute");
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eager_commands_report_loaded() {
        let command = Command::new(greet_schema(), greet_handler()).expect("command");
        assert!(command.is_handler_loaded());
        assert!(command.lazy_state().is_none());
        assert!(command.handler_reference().is_none());
    }
}
