use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::repository::SearchMethod;

/// Metric names used by the importer and the server
pub mod names {
    /// Messages persisted
    pub const MESSAGES_IMPORTED: &str = "sms_archive_messages_imported_total";
    /// Attachment files written
    pub const ATTACHMENTS_EXTRACTED: &str = "sms_archive_attachments_extracted_total";
    /// Multimedia parts dropped because their payload did not decode
    pub const PARTS_DROPPED: &str = "sms_archive_parts_dropped_total";
    /// Write transactions committed
    pub const BATCH_COMMITS: &str = "sms_archive_batch_commits_total";
    /// Wall time of a whole import run
    pub const IMPORT_DURATION: &str = "sms_archive_import_duration_seconds";
    /// Whether the last import built a full-text index (1/0)
    pub const SEARCH_INDEX_ENABLED: &str = "sms_archive_search_index_enabled";
    /// Search requests served, labelled by method
    pub const SEARCH_REQUESTS: &str = "sms_archive_search_requests_total";
}

/// Metrics emitted during one import run
///
/// Thin wrapper over the `metrics` facade. Without an installed recorder
/// every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportMetrics;

impl ImportMetrics {
    /// Record one persisted message and what it carried
    pub fn record_message(&self, attachments: usize, dropped_parts: usize) {
        counter!(names::MESSAGES_IMPORTED).increment(1);
        if attachments > 0 {
            counter!(names::ATTACHMENTS_EXTRACTED).increment(attachments as u64);
        }
        if dropped_parts > 0 {
            counter!(names::PARTS_DROPPED).increment(dropped_parts as u64);
        }
    }

    /// Record a committed batch
    pub fn record_commit(&self) {
        counter!(names::BATCH_COMMITS).increment(1);
    }

    /// Record the end of a run
    pub fn record_finished(&self, duration: Duration, fts_enabled: bool) {
        histogram!(names::IMPORT_DURATION).record(duration.as_secs_f64());
        gauge!(names::SEARCH_INDEX_ENABLED).set(if fts_enabled { 1.0 } else { 0.0 });
    }
}

/// Record one search request
pub fn record_search(method: SearchMethod) {
    let method = match method {
        SearchMethod::FullText => "fts",
        SearchMethod::Substring => "like",
    };
    counter!(names::SEARCH_REQUESTS, "method" => method).increment(1);
}
