//! Import pipeline
//!
//! Drives the stream parser into the record sink: each record is normalized,
//! its attachments are written to the media directory, and then the message
//! row is inserted. Rows are committed every [`BatchPolicy::batch_size`]
//! messages.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::db::{Database, SearchIndexMode};
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::media::MediaStore;
use crate::metrics::ImportMetrics;
use crate::models::RawRecord;
use crate::normalize::normalize;
use crate::parser::BackupReader;
use crate::validation::InputValidator;

/// Default number of messages per write transaction
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// How often the importer commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Messages per transaction
    pub batch_size: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchPolicy {
    /// Policy committing every `batch_size` messages
    pub fn new(batch_size: usize) -> Result<Self> {
        InputValidator::validate_batch_size(batch_size)?;
        Ok(Self { batch_size })
    }
}

/// Options for [`import_file`]
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Stop after this many records
    pub limit: Option<usize>,
    /// Commit cadence
    pub batch: BatchPolicy,
    /// Whether to build the full-text index
    pub index_mode: SearchIndexMode,
    /// Database file name inside the output directory
    pub db_file_name: String,
    /// Media directory name inside the output directory
    pub media_dir_name: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            limit: None,
            batch: BatchPolicy::default(),
            index_mode: SearchIndexMode::Auto,
            db_file_name: "messages.db".to_string(),
            media_dir_name: "media".to_string(),
        }
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Messages persisted
    pub messages: u64,
    /// Attachment files written
    pub attachments: u64,
    /// Multimedia parts dropped because their payload did not decode
    pub dropped_parts: u64,
    /// Transactions committed
    pub batches: u64,
    /// Whether the full-text index was built
    pub fts_enabled: bool,
    /// Database file
    pub db_path: PathBuf,
    /// Media directory
    pub media_dir: PathBuf,
}

/// Record sink owning the database connection and the media store
pub struct Importer {
    db: Database,
    media: MediaStore,
    policy: BatchPolicy,
    metrics: ImportMetrics,
    messages: u64,
    dropped_parts: u64,
    batches: u64,
    in_batch: usize,
}

impl Importer {
    /// Sink writing into `db` and `media`
    #[must_use]
    pub const fn new(db: Database, media: MediaStore, policy: BatchPolicy) -> Self {
        Self {
            db,
            media,
            policy,
            metrics: ImportMetrics,
            messages: 0,
            dropped_parts: 0,
            batches: 0,
            in_batch: 0,
        }
    }

    /// Consume `records`, stopping after `limit` of them.
    ///
    /// On error the open transaction is discarded with the connection;
    /// batches committed before it stay in the database.
    pub fn run<I>(mut self, records: I, limit: Option<usize>) -> Result<ImportSummary>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        let timer = OperationTimer::new("import");

        for record in records.into_iter().take(limit.unwrap_or(usize::MAX)) {
            self.accept(record?)?;
        }
        self.flush()?;

        let summary = ImportSummary {
            messages: self.messages,
            attachments: self.media.files_written(),
            dropped_parts: self.dropped_parts,
            batches: self.batches,
            fts_enabled: self.db.fts_enabled(),
            db_path: self.db.path().to_path_buf(),
            media_dir: self.media.dir().to_path_buf(),
        };
        self.db.close()?;

        self.metrics
            .record_finished(timer.finish(), summary.fts_enabled);
        info!(
            messages = summary.messages,
            attachments = summary.attachments,
            dropped_parts = summary.dropped_parts,
            batches = summary.batches,
            fts = summary.fts_enabled,
            "Import finished"
        );
        Ok(summary)
    }

    /// Persist one record: media files first, then the rows.
    fn accept(&mut self, record: RawRecord) -> Result<()> {
        let normalized = normalize(record);
        let message = normalized.message;

        let mut stored = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            stored.push(self.media.store(attachment)?);
        }

        self.db.begin_batch()?;
        let id = self.db.insert_message(&message, &stored)?;
        debug!(
            id,
            kind = message.kind.as_str(),
            attachments = stored.len(),
            "Message stored"
        );

        self.messages += 1;
        self.dropped_parts += normalized.dropped_parts as u64;
        self.metrics
            .record_message(stored.len(), normalized.dropped_parts);

        self.in_batch += 1;
        if self.in_batch >= self.policy.batch_size {
            self.flush()?;
            info!(
                messages = self.messages,
                attachments = self.media.files_written(),
                "Batch committed"
            );
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.in_batch > 0 {
            self.db.commit_batch()?;
            self.batches += 1;
            self.in_batch = 0;
            self.metrics.record_commit();
        }
        Ok(())
    }
}

/// Import the backup at `xml` into a fresh archive under `out_dir`.
///
/// Creates `out_dir/<db_file_name>` and `out_dir/<media_dir_name>/`. Fails
/// before doing any work when the input is missing or the database file
/// already exists.
pub fn import_file(xml: &Path, out_dir: &Path, options: &ImportOptions) -> Result<ImportSummary> {
    InputValidator::validate_input_file(xml)?;
    InputValidator::validate_limit(options.limit)?;

    let db = Database::create(out_dir.join(&options.db_file_name), options.index_mode)?;
    let media = MediaStore::create(out_dir.join(&options.media_dir_name))?;
    let reader = BackupReader::open(xml)?;

    info!(
        input = %xml.display(),
        output = %out_dir.display(),
        batch_size = options.batch.batch_size,
        limit = ?options.limit,
        "Import started"
    );

    Importer::new(db, media, options.batch).run(reader, options.limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::models::{Attributes, MessageKind};
    use tempfile::tempdir;

    fn sms(body: &str) -> Result<RawRecord> {
        let attributes: Attributes = [("address", "+1555"), ("type", "1"), ("body", body)]
            .into_iter()
            .collect();
        Ok(RawRecord {
            kind: MessageKind::Sms,
            attributes,
            parts: Vec::new(),
        })
    }

    fn importer(dir: &Path, batch_size: usize) -> Importer {
        let db = Database::create(dir.join("messages.db"), SearchIndexMode::Auto).expect("create db");
        let media = MediaStore::create(dir.join("media")).expect("create media");
        Importer::new(db, media, BatchPolicy::new(batch_size).expect("policy"))
    }

    #[test]
    fn test_batch_policy_rejects_zero() {
        assert!(BatchPolicy::new(0).is_err());
        assert_eq!(BatchPolicy::default().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_commits_every_batch_plus_tail() {
        let dir = tempdir().expect("Failed to create temp directory");
        let records: Vec<_> = (0..7).map(|i| sms(&format!("m{i}"))).collect();
        let summary = importer(dir.path(), 3).run(records, None).expect("run");
        assert_eq!(summary.messages, 7);
        assert_eq!(summary.batches, 3);
    }

    #[test]
    fn test_limit_stops_consuming() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut pulled = 0;
        let records = std::iter::from_fn(|| {
            pulled += 1;
            Some(sms("x"))
        });
        let summary = importer(dir.path(), 100).run(records, Some(4)).expect("run");
        assert_eq!(summary.messages, 4);
        assert_eq!(pulled, 4);
    }

    #[test]
    fn test_error_keeps_committed_batches() {
        let dir = tempdir().expect("Failed to create temp directory");
        let records = vec![
            sms("a"),
            sms("b"),
            sms("c"),
            Err(ArchiveError::Truncated("smses".to_string())),
        ];
        let result = importer(dir.path(), 2).run(records, None);
        assert!(matches!(result, Err(ArchiveError::Truncated(_))));

        let conn = rusqlite::Connection::open(dir.path().join("messages.db")).expect("reopen");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_import_file_missing_input() {
        let dir = tempdir().expect("Failed to create temp directory");
        let result = import_file(&dir.path().join("nope.xml"), dir.path(), &ImportOptions::default());
        assert!(matches!(result, Err(ArchiveError::MissingPath(_))));
        assert!(!dir.path().join("messages.db").exists());
    }
}
