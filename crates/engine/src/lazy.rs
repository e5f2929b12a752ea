//! Deferred handler resolution.
//!
//! A lazy handler starts unloaded and moves forward exactly once: to
//! resolved, caching the callable, or to failed, caching the error. Every
//! later call replays the cached outcome without consulting the loader
//! again. Concurrent first calls share a single resolution future.

use std::{fmt, sync::Arc};

use omnicmd_types::LoadError;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{Handler, HandlerLoader, HandlerReference};

/// Observable resolution state of a lazy handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LazyState {
    Unloaded,
    Resolved,
    Failed(LoadError),
}

pub struct LazyHandler {
    reference: HandlerReference,
    loader: Arc<dyn HandlerLoader>,
    outcome: OnceCell<Result<Handler, LoadError>>,
}

impl LazyHandler {
    pub fn new(reference: HandlerReference, loader: Arc<dyn HandlerLoader>) -> Self {
        Self {
            reference,
            loader,
            outcome: OnceCell::new(),
        }
    }

    pub fn reference(&self) -> &HandlerReference {
        &self.reference
    }

    pub fn state(&self) -> LazyState {
        match self.outcome.get() {
            None => LazyState::Unloaded,
            Some(Ok(_)) => LazyState::Resolved,
            Some(Err(error)) => LazyState::Failed(error.clone()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(_)))
    }

    /// Resolves the handler on first use and returns the cached outcome after.
    pub async fn resolve(&self) -> Result<Handler, LoadError> {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                debug!(reference = %self.reference, "resolving lazy handler");
                let result = self.loader.resolve(&self.reference).await;
                match &result {
                    Ok(_) => debug!(reference = %self.reference, "lazy handler resolved"),
                    Err(error) => warn!(reference = %self.reference, %error, "lazy handler failed to resolve"),
                }
                result
            })
            .await;
        outcome.clone()
    }
}

impl fmt::Debug for LazyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandler")
            .field("reference", &self.reference)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        attempts: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl HandlerLoader for CountingLoader {
        async fn resolve(&self, reference: &HandlerReference) -> Result<Handler, LoadError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                Err(LoadError::ModuleNotFound {
                    path: reference.path.clone(),
                    reason: "missing".into(),
                })
            } else {
                Ok(handler_fn(|_, _| async { Ok(json!("ok")) }))
            }
        }
    }

    fn lazy(fail: bool) -> (Arc<CountingLoader>, LazyHandler) {
        let loader = Arc::new(CountingLoader {
            attempts: AtomicUsize::new(0),
            fail,
        });
        let handler = LazyHandler::new(HandlerReference::new("mod"), loader.clone());
        (loader, handler)
    }

    #[tokio::test]
    async fn success_is_cached() {
        let (loader, handler) = lazy(false);
        assert_eq!(handler.state(), LazyState::Unloaded);
        handler.resolve().await.expect("first");
        handler.resolve().await.expect("second");
        assert_eq!(handler.state(), LazyState::Resolved);
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_cached_and_replayed() {
        let (loader, handler) = lazy(true);
        let first = handler.resolve().await.err();
        let second = handler.resolve().await.err();
        assert!(first.is_some());
        assert_eq!(first, second);
        assert!(matches!(handler.state(), LazyState::Failed(_)));
        assert!(!handler.is_loaded());
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_resolution() {
        let (loader, handler) = lazy(false);
        let (a, b) = tokio::join!(handler.resolve(), handler.resolve());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }
}
