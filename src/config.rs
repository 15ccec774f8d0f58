//! Engine configuration from environment variables

use std::env;
use std::path::PathBuf;

/// Which store is authoritative when it is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Per-account JSON files
    Document,
    /// SQLite database
    Relational,
}

impl BackendType {
    /// Parse a `DATA_BACKEND` value; anything unrecognised falls back to `Document`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "sqlite" | "pg" | "postgres" | "relational" => BackendType::Relational,
            "json" | "document" | "" => BackendType::Document,
            other => {
                log::warn!("Invalid DATA_BACKEND '{}', defaulting to json", other);
                BackendType::Document
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Document => "json",
            BackendType::Relational => "sqlite",
        }
    }
}

/// Configuration for an `Engine`
///
/// Loaded from environment variables with defaults, or built directly in tests.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Configured backend
    pub backend: BackendType,

    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Root directory of the per-account JSON files
    pub data_dir: PathBuf,

    /// Page size used when a query does not set a limit
    pub default_page_size: usize,
}

pub const DEFAULT_DB_PATH: &str = "data/scrutineer.db";
pub const DEFAULT_DATA_DIR: &str = "data/shared-data";
pub const DEFAULT_PAGE_SIZE: usize = 100;

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATA_BACKEND` (default: json; sqlite/pg/relational select the relational store)
    /// - `SCRUTINEER_DB_PATH` (default: data/scrutineer.db)
    /// - `SCRUTINEER_DATA_DIR` (default: data/shared-data)
    /// - `SCRUTINEER_DEFAULT_PAGE_SIZE` (default: 100)
    pub fn from_env() -> Self {
        Self {
            backend: env::var("DATA_BACKEND")
                .map(|v| BackendType::parse(&v))
                .unwrap_or(BackendType::Document),

            db_path: env::var("SCRUTINEER_DB_PATH")
                .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
                .into(),

            data_dir: env::var("SCRUTINEER_DATA_DIR")
                .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string())
                .into(),

            default_page_size: env::var("SCRUTINEER_DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    /// Document-only configuration rooted at `data_dir`
    pub fn document(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backend: BackendType::Document,
            db_path: data_dir.join("scrutineer.db"),
            data_dir,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Relational configuration; the document store still lives under `data_dir`
    pub fn relational(db_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendType::Relational,
            db_path: db_path.into(),
            data_dir: data_dir.into(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
