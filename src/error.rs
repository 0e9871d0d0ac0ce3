//! Error types for the sms-archive library.
//!
//! This module provides custom error types using `thiserror` for better error handling
//! and more specific error messages throughout the application.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while importing, exporting or serving an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Malformed source document
    #[error("XML error at byte {position}: {source}")]
    Xml {
        /// Byte offset reported by the reader
        position: u64,
        /// Underlying parser error
        #[source]
        source: quick_xml::Error,
    },

    /// Document ended before every open element was closed
    #[error("XML document truncated: <{0}> was never closed")]
    Truncated(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pattern compilation errors
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// CSV writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required input path does not exist
    #[error("Path not found: {}", .0.display())]
    MissingPath(PathBuf),

    /// The output location already holds an archive
    #[error("Output already contains an archive: {}", .0.display())]
    OutputExists(PathBuf),

    /// Rejected path (traversal, absolute, control characters)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience type alias for Result with `ArchiveError`
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Wrap a reader error together with the position it occurred at.
    pub(crate) const fn xml(position: u64, source: quick_xml::Error) -> Self {
        Self::Xml { position, source }
    }
}
