use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::error::{ArchiveError, Result};
use crate::models::{Message, StoredAttachment};
use crate::schema::{media, messages, messages_fts};

/// Whether to try creating the full-text shadow table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchIndexMode {
    /// Create the FTS5 table when SQLite supports it
    #[default]
    Auto,
    /// Never create it; search falls back to substring matching
    Disabled,
}

impl SearchIndexMode {
    /// Parse the configuration value (`auto` / `off`)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "on" => Some(Self::Auto),
            "off" | "disabled" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Write side of the archive database, owned by one import run
pub struct Database {
    conn: Connection,
    path: PathBuf,
    fts_enabled: bool,
    in_batch: bool,
}

impl Database {
    /// Create a fresh archive database at `path`.
    ///
    /// Refuses to reuse an existing file: every import writes a new archive.
    pub fn create(path: impl AsRef<Path>, index_mode: SearchIndexMode) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ArchiveError::OutputExists(path.to_path_buf()));
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::run_migrations(&conn)?;
        let fts_enabled = Self::negotiate_search_index(&conn, index_mode);

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            fts_enabled,
            in_batch: false,
        })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2025-03-15-000000_create_tables/up.sql"))?;
        conn.execute_batch(include_str!("../migrations/2025-03-15-000001_add_lookup_indexes/up.sql"))?;
        Ok(())
    }

    /// Create the FTS5 table if allowed and supported.
    fn negotiate_search_index(conn: &Connection, mode: SearchIndexMode) -> bool {
        if mode == SearchIndexMode::Disabled {
            info!("Full-text index disabled; search will use substring matching");
            return false;
        }
        match conn.execute_batch(messages_fts::CREATE) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "FTS5 not available; search will use substring matching");
                false
            }
        }
    }

    /// Path of the database file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the full-text shadow table is maintained
    #[must_use]
    pub const fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    /// Open a write transaction unless one is already open.
    pub fn begin_batch(&mut self) -> Result<()> {
        if !self.in_batch {
            self.conn.execute_batch("BEGIN")?;
            self.in_batch = true;
        }
        Ok(())
    }

    /// Commit the open write transaction, if any.
    pub fn commit_batch(&mut self) -> Result<()> {
        if self.in_batch {
            self.conn.execute_batch("COMMIT")?;
            self.in_batch = false;
        }
        Ok(())
    }

    /// Insert one message, its search entry and its media rows.
    ///
    /// The attachment files must already be on disk.
    pub fn insert_message(&self, message: &Message, stored: &[StoredAttachment]) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            messages::TABLE,
            messages::KIND,
            messages::ADDRESS,
            messages::CONTACT_NAME,
            messages::DATE_MS,
            messages::DATE_ISO,
            messages::DIRECTION,
            messages::BODY,
        ))?;
        stmt.execute(params![
            message.kind.as_str(),
            message.address,
            message.contact_name,
            message.timestamp_ms,
            message.timestamp_iso(),
            message.direction.as_str(),
            message.body,
        ])?;
        let id = self.conn.last_insert_rowid();

        if self.fts_enabled {
            let mut fts = self.conn.prepare_cached(&format!(
                "INSERT INTO {} (rowid, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
                messages_fts::TABLE,
                messages::BODY,
                messages::ADDRESS,
                messages::CONTACT_NAME,
            ))?;
            fts.execute(params![id, message.body, message.address, message.contact_name])?;
        }

        if !stored.is_empty() {
            let mut media_stmt = self.conn.prepare_cached(&format!(
                "INSERT INTO {} ({}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
                media::TABLE,
                media::MESSAGE_ID,
                media::FILENAME,
                media::CONTENT_TYPE,
                media::ORIG_NAME,
            ))?;
            for attachment in stored {
                media_stmt.execute(params![
                    id,
                    attachment.stored_filename,
                    attachment.content_type,
                    attachment.original_name,
                ])?;
            }
        }

        Ok(id)
    }

    /// Number of message rows
    pub fn message_count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", messages::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Commit any pending batch and close the connection.
    pub fn close(mut self) -> Result<()> {
        self.commit_batch()?;
        self.conn.close().map_err(|(_, e)| ArchiveError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, MessageKind};
    use tempfile::tempdir;

    fn sample_message() -> Message {
        Message {
            kind: MessageKind::Sms,
            address: "+15551234567".to_string(),
            contact_name: "Alice".to_string(),
            timestamp_ms: Some(1_700_000_000_000),
            direction: Direction::Inbound,
            body: "Hello there".to_string(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_search_index_mode_parse() {
        assert_eq!(SearchIndexMode::parse("auto"), Some(SearchIndexMode::Auto));
        assert_eq!(SearchIndexMode::parse("OFF"), Some(SearchIndexMode::Disabled));
        assert_eq!(SearchIndexMode::parse("maybe"), None);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().expect("Failed to create temp directory");
        let path = dir.path().join("messages.db");
        fs::write(&path, b"").expect("seed file");
        assert!(matches!(
            Database::create(&path, SearchIndexMode::Auto),
            Err(ArchiveError::OutputExists(_))
        ));
    }

    #[test]
    fn test_insert_message_with_media() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut db = Database::create(dir.path().join("messages.db"), SearchIndexMode::Auto)
            .expect("Failed to create database");
        assert!(db.fts_enabled());

        db.begin_batch().expect("begin");
        let stored = vec![StoredAttachment {
            stored_filename: "media_000000001.png".to_string(),
            content_type: "image/png".to_string(),
            original_name: "cat.png".to_string(),
        }];
        let id = db.insert_message(&sample_message(), &stored).expect("insert");
        db.commit_batch().expect("commit");

        assert_eq!(id, 1);
        assert_eq!(db.message_count().expect("count"), 1);
        let media_rows: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM media WHERE message_id = ?1", [id], |row| row.get(0))
            .expect("media count");
        assert_eq!(media_rows, 1);
    }

    #[test]
    fn test_disabled_index_skips_fts_table() {
        let dir = tempdir().expect("Failed to create temp directory");
        let db = Database::create(dir.path().join("messages.db"), SearchIndexMode::Disabled)
            .expect("Failed to create database");
        assert!(!db.fts_enabled());
        let tables: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'messages_fts'",
                [],
                |row| row.get(0),
            )
            .expect("table lookup");
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_uncommitted_batch_is_lost_on_drop() {
        let dir = tempdir().expect("Failed to create temp directory");
        let path = dir.path().join("messages.db");
        {
            let mut db = Database::create(&path, SearchIndexMode::Auto).expect("create");
            db.begin_batch().expect("begin");
            db.insert_message(&sample_message(), &[]).expect("insert");
            db.commit_batch().expect("commit");
            db.begin_batch().expect("begin");
            db.insert_message(&sample_message(), &[]).expect("insert");
        }
        let conn = Connection::open(&path).expect("reopen");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
