//! SMS Archive - SMS Backup & Restore exports made browsable
//!
//! Streams an SMS/MMS backup XML file into a SQLite database plus a directory
//! of extracted attachments, then renders it as a static HTML archive or
//! serves it through a small local search server.
//!
//! # Features
//!
//! - Constant-memory streaming import of very large backups
//! - Inline MMS attachments decoded to uniquely named files
//! - FTS5 full-text index with substring fallback
//! - Static per-contact HTML pages, optionally split by year
//! - Search and conversation browsing over HTTP

/// Configuration management
pub mod config;
/// Archive database creation and writes
pub mod db;
/// Error types
pub mod error;
/// Static HTML archive
pub mod export;
/// Import pipeline
pub mod importer;
/// Logging setup and utilities
pub mod logging;
/// Attachment extraction
pub mod media;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Record normalization
pub mod normalize;
/// Streaming XML reader
pub mod parser;
/// HTML fragments
pub mod render;
/// Read-side queries
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Search server
pub mod server;
/// Naming helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::{Database, SearchIndexMode};
pub use error::{ArchiveError, Result};
pub use importer::{import_file, BatchPolicy, ImportOptions, ImportSummary};
pub use models::{Direction, Message, MessageKind};
pub use repository::{ArchiveRepository, SqliteRepository};
