//! Relational-first dispatch with per-call fallback to the document store

use std::future::Future;
use std::sync::Arc;

use crate::error::StoreResult;

use super::BackendSelector;

/// Routes one component's calls to the relational or document implementation
///
/// `S` is the component trait object (e.g. `dyn ListStore`).
pub struct Dispatcher<S: ?Sized> {
    selector: Arc<BackendSelector>,
    relational: Option<Arc<S>>,
    document: Arc<S>,
}

impl<S: ?Sized> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            selector: Arc::clone(&self.selector),
            relational: self.relational.clone(),
            document: Arc::clone(&self.document),
        }
    }
}

impl<S: ?Sized + Send + Sync> Dispatcher<S> {
    pub fn new(selector: Arc<BackendSelector>, relational: Option<Arc<S>>, document: Arc<S>) -> Self {
        Self {
            selector,
            relational,
            document,
        }
    }

    /// Relational implementation, only when the selector reports it ready
    pub fn relational_if_ready(&self) -> Option<Arc<S>> {
        if self.selector.is_active_backend_ready() {
            self.relational.clone()
        } else {
            None
        }
    }

    pub fn document(&self) -> Arc<S> {
        Arc::clone(&self.document)
    }

    /// Active implementation without fallback (audit writes)
    pub fn active(&self) -> Arc<S> {
        self.relational_if_ready().unwrap_or_else(|| self.document())
    }

    /// Try the relational path when ready; on an operational failure log and
    /// rerun the same call against the document store. Nothing is cached.
    pub async fn run<T, F, Fut>(&self, op: &str, call: F) -> StoreResult<T>
    where
        F: Fn(Arc<S>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        if let Some(relational) = self.relational_if_ready() {
            match call(relational).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_operational() => {
                    log::warn!(
                        "⚠️  {} failed on relational backend, falling back to document store: {}",
                        op,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        call(self.document()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendType;
    use crate::error::StoreError;

    trait Probe: Send + Sync {
        fn answer(&self) -> StoreResult<&'static str>;
    }

    struct Healthy(&'static str);
    impl Probe for Healthy {
        fn answer(&self) -> StoreResult<&'static str> {
            Ok(self.0)
        }
    }

    struct Broken(StoreErrorKind);
    #[derive(Clone, Copy)]
    enum StoreErrorKind {
        Database,
        Immutable,
    }
    impl Probe for Broken {
        fn answer(&self) -> StoreResult<&'static str> {
            match self.0 {
                StoreErrorKind::Database => Err(StoreError::Database("disk I/O error".to_string())),
                StoreErrorKind::Immutable => Err(StoreError::Immutable("vote_marks is immutable".to_string())),
            }
        }
    }

    fn dispatcher(selector: BackendSelector, relational: Arc<dyn Probe>) -> Dispatcher<dyn Probe> {
        let document: Arc<dyn Probe> = Arc::new(Healthy("document"));
        Dispatcher::new(Arc::new(selector), Some(relational), document)
    }

    #[tokio::test]
    async fn test_uses_relational_when_ready() {
        let d = dispatcher(BackendSelector::relational_ready(), Arc::new(Healthy("relational")));
        let got = d.run("probe", |s| async move { s.answer() }).await.unwrap();
        assert_eq!(got, "relational");
    }

    #[tokio::test]
    async fn test_document_when_not_ready() {
        let d = dispatcher(BackendSelector::new(BackendType::Relational), Arc::new(Healthy("relational")));
        let got = d.run("probe", |s| async move { s.answer() }).await.unwrap();
        assert_eq!(got, "document");
    }

    #[tokio::test]
    async fn test_operational_failure_falls_back_every_call() {
        let d = dispatcher(BackendSelector::relational_ready(), Arc::new(Broken(StoreErrorKind::Database)));
        for _ in 0..2 {
            let got = d.run("probe", |s| async move { s.answer() }).await.unwrap();
            assert_eq!(got, "document");
        }
        // The fallback is per call: readiness is untouched
        assert!(d.selector.is_active_backend_ready());
    }

    #[tokio::test]
    async fn test_immutable_error_is_not_swallowed() {
        let d = dispatcher(BackendSelector::relational_ready(), Arc::new(Broken(StoreErrorKind::Immutable)));
        let err = d.run("probe", |s| async move { s.answer() }).await.unwrap_err();
        assert!(matches!(err, StoreError::Immutable(_)));
    }
}
