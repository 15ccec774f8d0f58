//! Wiring: one selector, both stores, and the services built on them

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::backend::{BackendSelector, Dispatcher};
use crate::config::{BackendType, EngineConfig};
use crate::segment::ListManager;
use crate::store::{
    AuditStore, ContactDirectory, DocumentStore, InteractionStore, ListStore, SegmentStore,
    SqliteStore, VotedStore,
};
use crate::support::{InteractionAggregator, TallyEngine};

/// Initialise `env_logger` on stderr, defaulting to `info`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Load `.env` (if present), then read the configuration from the environment
pub fn init_from_env() -> EngineConfig {
    dotenv::dotenv().ok();
    EngineConfig::from_env()
}

pub struct Engine {
    pub config: EngineConfig,
    pub selector: Arc<BackendSelector>,
    pub lists: ListManager,
    pub audit: AuditLog,
    pub interactions: InteractionAggregator,
    pub tally: TallyEngine,
    pub contacts: Dispatcher<dyn ContactDirectory>,
}

impl Engine {
    /// Open the stores named by `config` and wire the services
    ///
    /// A relational store that fails to open leaves the engine on the
    /// document store; readiness stays false.
    pub fn open(config: EngineConfig) -> Self {
        let selector = Arc::new(BackendSelector::new(config.backend));

        let relational = match config.backend {
            BackendType::Relational => match SqliteStore::open(&config.db_path) {
                Ok(store) => {
                    selector.mark_ready();
                    Some(Arc::new(store))
                }
                Err(e) => {
                    log::warn!(
                        "⚠️  Failed to open relational store at {}, using document store: {}",
                        config.db_path.display(),
                        e
                    );
                    None
                }
            },
            BackendType::Document => None,
        };
        let document = Arc::new(DocumentStore::new(&config.data_dir));

        let contacts: Dispatcher<dyn ContactDirectory> = Dispatcher::new(
            selector.clone(),
            relational.clone().map(|s| s as Arc<dyn ContactDirectory>),
            document.clone(),
        );
        log::info!("🚀 Scrutineer engine starting");
        log::info!("   DATA_BACKEND: {}", config.backend.as_str());
        log::info!("   Active backend: {}", contacts.active().backend_type());
        log::info!("   Data dir: {}", config.data_dir.display());

        let segments: Dispatcher<dyn SegmentStore> = Dispatcher::new(
            selector.clone(),
            relational.clone().map(|s| s as Arc<dyn SegmentStore>),
            document.clone(),
        );
        let list_store: Dispatcher<dyn ListStore> = Dispatcher::new(
            selector.clone(),
            relational.clone().map(|s| s as Arc<dyn ListStore>),
            document.clone(),
        );
        let audit_store: Dispatcher<dyn AuditStore> = Dispatcher::new(
            selector.clone(),
            relational.clone().map(|s| s as Arc<dyn AuditStore>),
            document.clone(),
        );
        let voted: Dispatcher<dyn VotedStore> = Dispatcher::new(
            selector.clone(),
            relational.clone().map(|s| s as Arc<dyn VotedStore>),
            document,
        );

        let interactions = InteractionAggregator::new(
            selector.clone(),
            relational.map(|s| s as Arc<dyn InteractionStore>),
        );

        Self {
            lists: ListManager::new(segments, list_store, config.default_page_size),
            audit: AuditLog::new(audit_store),
            tally: TallyEngine::new(voted, contacts.clone(), interactions.clone()),
            interactions,
            contacts,
            selector,
            config,
        }
    }

    pub fn is_active_backend_ready(&self) -> bool {
        self.selector.is_active_backend_ready()
    }
}
