//! Voter segmentation, scrutineering audit log and support tally
//!
//! Every component has a relational (SQLite) and a document (per-account
//! JSON) implementation. A `BackendSelector` decides which one is
//! authoritative; reads fall back to the document store per call when the
//! relational one fails.

pub mod audit;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod segment;
pub mod sqlite_pragma;
pub mod store;
pub mod support;
pub mod types;

pub use config::{BackendType, EngineConfig};
pub use engine::{init_from_env, init_logging, Engine};
pub use error::{StoreError, StoreResult, ValidationCode, ValidationError};
