//! Data models for message import and browsing
//!
//! This module contains the data structures used throughout the application:
//! raw records as read from the backup, normalized messages, extracted
//! attachments and the rows read back by the repository.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Kind of a source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text message (`<sms>`)
    Sms,
    /// Multimedia message with parts (`<mms>`)
    Mms,
}

impl MessageKind {
    /// Tag name in the backup and value stored in `messages.typ`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Mms => "mms",
        }
    }

    /// Recognize a record element name, ignoring ASCII case.
    #[must_use]
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        if tag.eq_ignore_ascii_case(b"sms") {
            Some(Self::Sms)
        } else if tag.eq_ignore_ascii_case(b"mms") {
            Some(Self::Mms)
        } else {
            None
        }
    }
}

/// Direction of a message relative to the phone owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Received by the phone owner
    #[serde(rename = "in")]
    Inbound,
    /// Sent by the phone owner
    #[serde(rename = "out")]
    Outbound,
}

impl Direction {
    /// Map a backup box/type code to a direction.
    ///
    /// `"1"` (inbox) is inbound. Every other value, including a missing code
    /// and codes this tool does not know, is outbound.
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("1") => Self::Inbound,
            _ => Self::Outbound,
        }
    }

    /// Value stored in `messages.direction`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        }
    }

    /// Parse a stored direction; anything unknown reads back as outbound.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value == "in" {
            Self::Inbound
        } else {
            Self::Outbound
        }
    }
}

/// Attribute list of one XML element, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Empty attribute list
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an attribute
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Raw value of `key`, if the attribute is declared
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key` when declared and non-empty
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// First non-empty value among `keys`
    #[must_use]
    pub fn first_present(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.non_empty(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One record exactly as the stream parser saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Record kind, from the element name
    pub kind: MessageKind,
    /// Attributes of the record element
    pub attributes: Attributes,
    /// Attributes of each `<part>` (multimedia records only)
    pub parts: Vec<Attributes>,
}

/// A decoded attachment waiting to be written to the media directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Declared content type, may be empty
    pub content_type: String,
    /// Declared original name, may be empty
    pub original_name: String,
    /// Decoded payload
    pub bytes: Vec<u8>,
}

/// An attachment after its bytes were saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAttachment {
    /// Generated run-unique file name
    pub stored_filename: String,
    /// Declared content type
    pub content_type: String,
    /// Declared original name
    pub original_name: String,
}

/// A fully normalized message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Record kind
    pub kind: MessageKind,
    /// Phone number or email-like address of the other party
    pub address: String,
    /// Display name of the other party
    pub contact_name: String,
    /// Milliseconds since epoch, when the source value was usable
    pub timestamp_ms: Option<i64>,
    /// Inbound or outbound
    pub direction: Direction,
    /// Text content
    pub body: String,
    /// Decoded attachments in source order
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Local ISO-8601 rendering of the timestamp
    #[must_use]
    pub fn timestamp_iso(&self) -> Option<String> {
        self.timestamp_ms.and_then(millis_to_local_iso)
    }
}

/// Render epoch milliseconds as local `YYYY-MM-DDTHH:MM:SS[.mmm]`.
#[must_use]
pub fn millis_to_local_iso(ms: i64) -> Option<String> {
    let dt = Local.timestamp_millis_opt(ms).single()?;
    let fmt = if ms.rem_euclid(1000) == 0 {
        "%Y-%m-%dT%H:%M:%S"
    } else {
        "%Y-%m-%dT%H:%M:%S%.3f"
    };
    Some(dt.naive_local().format(fmt).to_string())
}

/// A message row read back from the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbMessage {
    /// Database primary key
    pub id: i64,
    /// Record kind
    pub kind: MessageKind,
    /// Counterparty address
    pub address: String,
    /// Counterparty display name
    pub contact_name: String,
    /// Milliseconds since epoch
    pub date_ms: Option<i64>,
    /// Local ISO-8601 timestamp
    pub date_iso: Option<String>,
    /// Inbound or outbound
    pub direction: Direction,
    /// Text content
    pub body: String,
    /// Media attached to this message
    pub media: Vec<DbMedia>,
}

impl DbMessage {
    /// Name shown for the other party
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.contact_name.is_empty() {
            &self.address
        } else {
            &self.contact_name
        }
    }

    /// Calendar year of the local timestamp
    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.date_iso.as_deref().and_then(|iso| iso.get(..4))
    }
}

/// A media row read back from the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbMedia {
    /// Database primary key
    pub id: i64,
    /// Owning message
    pub message_id: i64,
    /// File name inside the media directory
    pub filename: String,
    /// Declared content type
    pub content_type: String,
    /// Declared original name
    pub original_name: String,
}

/// Message count for one (address, name) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactSummary {
    /// Counterparty address
    pub address: String,
    /// Counterparty display name
    pub contact_name: String,
    /// Number of messages
    pub message_count: u64,
}

impl ContactSummary {
    /// Human-readable key, `"Name (address)"` when both are known
    #[must_use]
    pub fn key(&self) -> String {
        crate::utils::contact_key(&self.address, &self.contact_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_code() {
        assert_eq!(Direction::from_code(Some("1")), Direction::Inbound);
        assert_eq!(Direction::from_code(Some("2")), Direction::Outbound);
        assert_eq!(Direction::from_code(Some("")), Direction::Outbound);
        assert_eq!(Direction::from_code(Some("128")), Direction::Outbound);
        assert_eq!(Direction::from_code(None), Direction::Outbound);
    }

    #[test]
    fn test_direction_round_trip_through_storage() {
        for direction in [Direction::Inbound, Direction::Outbound] {
            assert_eq!(Direction::from_stored(direction.as_str()), direction);
        }
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(MessageKind::from_tag(b"sms"), Some(MessageKind::Sms));
        assert_eq!(MessageKind::from_tag(b"MMS"), Some(MessageKind::Mms));
        assert_eq!(MessageKind::from_tag(b"call"), None);
    }

    #[test]
    fn test_first_present_skips_empty() {
        let attrs: Attributes = [("msg_box", ""), ("box", "1"), ("m_type", "132")]
            .into_iter()
            .collect();
        assert_eq!(attrs.first_present(&["msg_box", "box", "m_type"]), Some("1"));
        assert_eq!(attrs.first_present(&["missing"]), None);
    }

    #[test]
    fn test_millis_to_local_iso_shape() {
        let iso = millis_to_local_iso(1_700_000_000_000).unwrap_or_default();
        assert_eq!(iso.len(), "2023-11-14T22:13:20".len());
        assert_eq!(&iso[4..5], "-");
        assert_eq!(&iso[10..11], "T");

        let with_fraction = millis_to_local_iso(1_700_000_000_123).unwrap_or_default();
        assert!(with_fraction.ends_with(".123"));
    }
}
