//! Delve - deep research over a private document collection
//!
//! Ingests local text documents, retrieves passages with fused keyword and
//! vector search, and answers research questions by decomposing them into
//! subtasks that are each synthesized with source attribution.

pub mod app;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod ingest;
pub mod llm;
pub mod research;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod storage;

pub use error::{DelveError, Result};
