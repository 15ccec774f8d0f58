//! Per-instance backend readiness
//!
//! The relational store is authoritative only once it is configured AND its
//! schema setup has completed. Readiness is re-read on every call.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::BackendType;

#[derive(Debug)]
pub struct BackendSelector {
    configured: BackendType,
    ready: AtomicBool,
}

impl BackendSelector {
    pub fn new(configured: BackendType) -> Self {
        Self {
            configured,
            ready: AtomicBool::new(false),
        }
    }

    /// Selector that never uses the relational store
    pub fn document_only() -> Self {
        Self::new(BackendType::Document)
    }

    /// Selector with the relational store configured and already marked ready
    pub fn relational_ready() -> Self {
        let selector = Self::new(BackendType::Relational);
        selector.mark_ready();
        selector
    }

    /// Called once the relational connection and schema are set up
    pub fn mark_ready(&self) {
        if self.configured == BackendType::Relational {
            self.ready.store(true, Ordering::SeqCst);
            log::info!("✅ Relational backend ready");
        } else {
            log::debug!("mark_ready ignored: relational backend not configured");
        }
    }

    pub fn mark_unready(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            log::warn!("⚠️  Relational backend marked unavailable");
        }
    }

    pub fn is_active_backend_ready(&self) -> bool {
        self.configured == BackendType::Relational && self.ready.load(Ordering::SeqCst)
    }

    pub fn active_backend(&self) -> BackendType {
        if self.is_active_backend_ready() {
            BackendType::Relational
        } else {
            BackendType::Document
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_requires_configuration() {
        let selector = BackendSelector::document_only();
        selector.mark_ready();
        assert!(!selector.is_active_backend_ready());
        assert_eq!(selector.active_backend(), BackendType::Document);
    }

    #[test]
    fn test_readiness_is_rechecked() {
        let selector = BackendSelector::new(BackendType::Relational);
        assert!(!selector.is_active_backend_ready());

        selector.mark_ready();
        assert!(selector.is_active_backend_ready());

        selector.mark_unready();
        assert!(!selector.is_active_backend_ready());
        assert_eq!(selector.active_backend(), BackendType::Document);
    }
}
