//! Read-only access to an imported archive
//!
//! The [`ArchiveRepository`] trait is what the static exporter and the search
//! server consume; [`SqliteRepository`] implements it over a small r2d2 pool.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::models::{ContactSummary, DbMedia, DbMessage, Direction, MessageKind};
use crate::schema::{media, messages, messages_fts};

// Type alias for the read connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// How a search was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    /// FTS5 `MATCH`
    FullText,
    /// `LIKE '%query%'` over body, address and contact name
    Substring,
}

/// Messages matching a query, newest first
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Matching messages with their media
    pub messages: Vec<DbMessage>,
    /// Strategy that produced them
    pub method: SearchMethod,
}

/// Queries the browsing surfaces need
pub trait ArchiveRepository: Send + Sync {
    /// Keyword search over body, address and contact name
    fn search(&self, query: &str, limit: usize) -> Result<SearchResults>;

    /// One message by id
    fn message(&self, id: i64) -> Result<Option<DbMessage>>;

    /// Every message exchanged with the counterparty of message `id`, oldest first
    fn conversation(&self, id: i64) -> Result<Vec<DbMessage>>;

    /// Counterparties ordered by message count, largest first
    fn contacts(&self) -> Result<Vec<ContactSummary>>;

    /// Every message exchanged with one counterparty, oldest first
    fn contact_messages(&self, contact: &ContactSummary) -> Result<Vec<DbMessage>>;
}

/// [`ArchiveRepository`] over an archive database file
pub struct SqliteRepository {
    pool: DbPool,
    fts_available: bool,
}

impl SqliteRepository {
    /// Open an existing archive.
    pub fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ArchiveError::MissingPath(path.to_path_buf()));
        }

        // Read-write open so WAL shared memory can be created; writes are refused
        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|conn| conn.pragma_update(None, "query_only", true));
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .build(manager)?;

        let conn = pool.get()?;
        let fts_available: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![messages_fts::TABLE],
            |row| row.get(0),
        )?;
        drop(conn);

        Ok(Self { pool, fts_available })
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// True when the archive carries a full-text index
    #[must_use]
    pub const fn fts_available(&self) -> bool {
        self.fts_available
    }

    /// Total number of messages
    pub fn message_count(&self) -> Result<u64> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", messages::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn fulltext_ids(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT m.{id} FROM {fts} JOIN {table} m ON m.{id} = {fts}.rowid \
             WHERE {fts} MATCH ?1 \
             ORDER BY m.{date} DESC, m.{id} DESC LIMIT ?2",
            fts = messages_fts::TABLE,
            table = messages::TABLE,
            id = messages::ID,
            date = messages::DATE_MS,
        ))?;
        let ids = stmt
            .query_map(params![query, limit_param(limit)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn substring_ids(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<i64>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = conn.prepare(&format!(
            "SELECT {id} FROM {table} \
             WHERE {body} LIKE ?1 ESCAPE '\\' OR {address} LIKE ?1 ESCAPE '\\' OR {name} LIKE ?1 ESCAPE '\\' \
             ORDER BY {date} DESC, {id} DESC LIMIT ?2",
            id = messages::ID,
            date = messages::DATE_MS,
            table = messages::TABLE,
            body = messages::BODY,
            address = messages::ADDRESS,
            name = messages::CONTACT_NAME,
        ))?;
        let ids = stmt
            .query_map(params![pattern, limit_param(limit)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Load messages by id, newest first, with their media.
    fn load_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<DbMessage>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} IN ({placeholders}) ORDER BY {} DESC, {} DESC",
            messages::TABLE,
            messages::ID,
            messages::DATE_MS,
            messages::ID,
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), map_db_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Self::attach_media(conn, rows)
    }

    fn load_by_counterparty(conn: &Connection, address: &str, contact_name: &str) -> Result<Vec<DbMessage>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT * FROM {} WHERE {} = ?1 AND {} = ?2 ORDER BY {}, {}",
            messages::TABLE,
            messages::ADDRESS,
            messages::CONTACT_NAME,
            messages::DATE_MS,
            messages::ID,
        ))?;
        let rows = stmt
            .query_map(params![address, contact_name], map_db_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Self::attach_media(conn, rows)
    }

    fn attach_media(conn: &Connection, mut rows: Vec<DbMessage>) -> Result<Vec<DbMessage>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}",
            media::TABLE,
            media::MESSAGE_ID,
            media::ID,
        ))?;
        for row in &mut rows {
            row.media = stmt
                .query_map(params![row.id], map_db_media)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(rows)
    }
}

impl ArchiveRepository for SqliteRepository {
    fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let conn = self.get_connection()?;

        let fulltext = if self.fts_available {
            match Self::fulltext_ids(&conn, query, limit) {
                Ok(ids) => Some(ids),
                Err(e) => {
                    debug!(error = %e, query, "MATCH rejected, using substring search");
                    None
                }
            }
        } else {
            None
        };

        let (ids, method) = match fulltext {
            Some(ids) => (ids, SearchMethod::FullText),
            None => (Self::substring_ids(&conn, query, limit)?, SearchMethod::Substring),
        };

        let messages = Self::load_by_ids(&conn, &ids)?;
        Ok(SearchResults { messages, method })
    }

    fn message(&self, id: i64) -> Result<Option<DbMessage>> {
        let conn = self.get_connection()?;
        let message = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE {} = ?1", messages::TABLE, messages::ID),
                params![id],
                map_db_message,
            )
            .optional()?;
        match message {
            Some(message) => Ok(Self::attach_media(&conn, vec![message])?.pop()),
            None => Ok(None),
        }
    }

    fn conversation(&self, id: i64) -> Result<Vec<DbMessage>> {
        let anchor = self
            .message(id)?
            .ok_or_else(|| ArchiveError::NotFound(format!("message {id}")))?;
        let conn = self.get_connection()?;
        Self::load_by_counterparty(&conn, &anchor.address, &anchor.contact_name)
    }

    fn contacts(&self) -> Result<Vec<ContactSummary>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {address}, {name}, COUNT(*) AS message_count FROM {table} \
             GROUP BY {address}, {name} \
             ORDER BY message_count DESC, {address}, {name}",
            address = messages::ADDRESS,
            name = messages::CONTACT_NAME,
            table = messages::TABLE,
        ))?;
        let contacts = stmt
            .query_map([], |row| {
                Ok(ContactSummary {
                    address: row.get(0)?,
                    contact_name: row.get(1)?,
                    message_count: u64::try_from(row.get::<_, i64>(2)?).unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    fn contact_messages(&self, contact: &ContactSummary) -> Result<Vec<DbMessage>> {
        let conn = self.get_connection()?;
        Self::load_by_counterparty(&conn, &contact.address, &contact.contact_name)
    }
}

/// Map a database row to a `DbMessage` (media filled in separately)
fn map_db_message(row: &Row<'_>) -> rusqlite::Result<DbMessage> {
    let kind: String = row.get(messages::KIND)?;
    let direction: String = row.get(messages::DIRECTION)?;
    Ok(DbMessage {
        id: row.get(messages::ID)?,
        kind: MessageKind::from_tag(kind.as_bytes()).unwrap_or(MessageKind::Sms),
        address: row.get(messages::ADDRESS)?,
        contact_name: row.get(messages::CONTACT_NAME)?,
        date_ms: row.get(messages::DATE_MS)?,
        date_iso: row.get(messages::DATE_ISO)?,
        direction: Direction::from_stored(&direction),
        body: row.get(messages::BODY)?,
        media: Vec::new(),
    })
}

/// Map a database row to a `DbMedia`
fn map_db_media(row: &Row<'_>) -> rusqlite::Result<DbMedia> {
    Ok(DbMedia {
        id: row.get(media::ID)?,
        message_id: row.get(media::MESSAGE_ID)?,
        filename: row.get(media::FILENAME)?,
        content_type: row.get(media::CONTENT_TYPE)?,
        original_name: row.get(media::ORIG_NAME)?,
    })
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
