//! Storage layer for Delve
//!
//! The passage store is the document collection every retriever resolves
//! node ids against.

pub mod database;

pub use database::{Database, DbPool, DbStats, DocumentUpsert, PassageRecord};

use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;

/// Path of the SQLite passage store for a configuration
pub fn store_path(config: &Config) -> PathBuf {
    config.store_dir().join("corpus.sqlite")
}

/// Open the passage store for querying; fails if nothing was ingested yet
pub fn open_store(config: &Config) -> Result<Database> {
    Database::open_existing(&store_path(config))
}

/// Open or create the passage store for ingestion
pub fn create_store(config: &Config) -> Result<Database> {
    Database::new(&store_path(config))
}
