//! Handler resolution seam used by lazy commands.
//!
//! A [`HandlerReference`] names a module and one of its exports. A
//! [`HandlerLoader`] turns that reference into a callable [`Handler`]. The
//! bundled [`HandlerTable`] resolves against an in-process table of modules;
//! other loaders (plugin directories, remote registries) plug in through the
//! same trait.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use indexmap::IndexMap;
use omnicmd_types::LoadError;
use serde_json::Value;

use crate::Handler;

/// Export looked up when a reference does not name one.
pub const DEFAULT_EXPORT: &str = "handler";

/// Points at one export of one handler module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerReference {
    pub path: String,
    pub export: String,
}

impl HandlerReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            export: DEFAULT_EXPORT.to_string(),
        }
    }

    pub fn with_export(mut self, export: impl Into<String>) -> Self {
        self.export = export.into();
        self
    }

    /// Parses `module#export`; a missing or empty export means [`DEFAULT_EXPORT`].
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('#') {
            Some((path, export)) if !export.trim().is_empty() => Self::new(path.trim()).with_export(export.trim()),
            Some((path, _)) => Self::new(path.trim()),
            None => Self::new(reference.trim()),
        }
    }
}

impl fmt::Display for HandlerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.export)
    }
}

/// Resolves handler references to callables.
#[async_trait]
pub trait HandlerLoader: Send + Sync {
    async fn resolve(&self, reference: &HandlerReference) -> Result<Handler, LoadError>;
}

/// One named export of a handler module.
#[derive(Clone)]
pub enum ModuleExport {
    Handler(Handler),
    /// Plain data; resolving it as a handler fails with `NotCallable`.
    Value(Value),
}

/// In-process module table keyed by module path.
#[derive(Clone, Default)]
pub struct HandlerTable {
    modules: HashMap<String, IndexMap<String, ModuleExport>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<String>, export: impl Into<String>, handler: Handler) -> &mut Self {
        self.modules
            .entry(path.into())
            .or_default()
            .insert(export.into(), ModuleExport::Handler(handler));
        self
    }

    pub fn register_value(&mut self, path: impl Into<String>, export: impl Into<String>, value: Value) -> &mut Self {
        self.modules
            .entry(path.into())
            .or_default()
            .insert(export.into(), ModuleExport::Value(value));
        self
    }

    pub fn with_handler(mut self, path: impl Into<String>, export: impl Into<String>, handler: Handler) -> Self {
        self.register(path, export, handler);
        self
    }

    pub fn contains_module(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<&String> = self.modules.keys().collect();
        modules.sort();
        f.debug_struct("HandlerTable").field("modules", &modules).finish()
    }
}

#[async_trait]
impl HandlerLoader for HandlerTable {
    async fn resolve(&self, reference: &HandlerReference) -> Result<Handler, LoadError> {
        let module = self.modules.get(&reference.path).ok_or_else(|| LoadError::ModuleNotFound {
            path: reference.path.clone(),
            reason: "no module registered under this path".to_string(),
        })?;
        let available = || module.keys().cloned().collect::<Vec<_>>();

        match module.get(&reference.export) {
            Some(ModuleExport::Handler(handler)) => Ok(handler.clone()),
            Some(ModuleExport::Value(_)) => Err(LoadError::NotCallable {
                path: reference.path.clone(),
                export: reference.export.clone(),
                available: available(),
            }),
            None => Err(LoadError::ExportNotFound {
                path: reference.path.clone(),
                export: reference.export.clone(),
                available: available(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use omnicmd_types::ExecutionContext;
    use serde_json::json;

    fn table() -> HandlerTable {
        let mut table = HandlerTable::new();
        table
            .register("math", "add", handler_fn(|_, _| async { Ok(json!(3)) }))
            .register_value("math", "PI", json!(3.14));
        table
    }

    #[test]
    fn parses_references() {
        assert_eq!(HandlerReference::parse("math#add"), HandlerReference::new("math").with_export("add"));
        assert_eq!(HandlerReference::parse("math").export, DEFAULT_EXPORT);
        assert_eq!(HandlerReference::parse("math#").export, DEFAULT_EXPORT);
        assert_eq!(HandlerReference::parse("math#add").to_string(), "math#add");
    }

    #[tokio::test]
    async fn resolves_registered_handler() {
        let handler = table()
            .resolve(&HandlerReference::parse("math#add"))
            .await
            .expect("resolve");
        let value = handler(Default::default(), ExecutionContext::test()).await.expect("run");
        assert_eq!(value, json!(3));
    }

    #[tokio::test]
    async fn distinguishes_failure_modes() {
        let table = table();
        let missing_module = table.resolve(&HandlerReference::new("nope")).await.err();
        assert!(matches!(missing_module, Some(LoadError::ModuleNotFound { .. })));

        let missing_export = table.resolve(&HandlerReference::new("math")).await.err();
        assert_eq!(
            missing_export,
            Some(LoadError::ExportNotFound {
                path: "math".into(),
                export: "handler".into(),
                available: vec!["add".into(), "PI".into()],
            })
        );

        let not_callable = table.resolve(&HandlerReference::parse("math#PI")).await.err();
        assert!(matches!(not_callable, Some(LoadError::NotCallable { .. })));
    }
}
