//! Database schema definitions
//!
//! Table and column names shared by the importer, the repository and the
//! migrations under `migrations/`.

/// Messages table schema
pub mod messages {
    /// Table name
    pub const TABLE: &str = "messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Record kind column (`sms` / `mms`)
    pub const KIND: &str = "typ";
    /// Counterparty address column
    pub const ADDRESS: &str = "address";
    /// Counterparty display name column
    pub const CONTACT_NAME: &str = "contact_name";
    /// Timestamp in milliseconds since epoch
    pub const DATE_MS: &str = "date_ms";
    /// Local ISO-8601 rendering of `date_ms`
    pub const DATE_ISO: &str = "date_iso";
    /// Direction column (`in` / `out`)
    pub const DIRECTION: &str = "direction";
    /// Message text column
    pub const BODY: &str = "body";
}

/// Extracted media table schema
pub mod media {
    /// Table name
    pub const TABLE: &str = "media";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to messages table
    pub const MESSAGE_ID: &str = "message_id";
    /// Generated file name inside the media directory
    pub const FILENAME: &str = "filename";
    /// Declared content type
    pub const CONTENT_TYPE: &str = "content_type";
    /// Declared original name
    pub const ORIG_NAME: &str = "orig_name";
}

/// Full-text shadow table (FTS5, external content on `messages`)
pub mod messages_fts {
    /// Table name
    pub const TABLE: &str = "messages_fts";
    /// Statement creating the virtual table
    pub const CREATE: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts \
         USING fts5(body, address, contact_name, content='messages', content_rowid='id')";
}
