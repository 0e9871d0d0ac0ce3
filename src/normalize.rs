//! Record normalization
//!
//! Turns a [`RawRecord`] into a [`Message`]. Multimedia parts are classified
//! by which attributes they carry: inline text, inline base64 payload, or a
//! name referring to a file the backup did not include.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::warn;

use crate::models::{Attachment, Attributes, Direction, Message, MessageKind, RawRecord};

/// Attribute names, in fallback order
const ADDRESS_KEYS: &[&str] = &["address", "address_email"];
const NAME_KEYS: &[&str] = &["contact_name", "name"];
const MMS_BOX_KEYS: &[&str] = &["msg_box", "box", "m_type"];
const PART_NAME_KEYS: &[&str] = &["name", "cl"];

/// Result of normalizing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// The normalized message
    pub message: Message,
    /// Binary parts whose payload could not be decoded
    pub dropped_parts: usize,
}

/// Normalize a raw record.
#[must_use]
pub fn normalize(record: RawRecord) -> NormalizedRecord {
    match record.kind {
        MessageKind::Sms => NormalizedRecord {
            message: normalize_sms(&record.attributes),
            dropped_parts: 0,
        },
        MessageKind::Mms => normalize_mms(&record.attributes, &record.parts),
    }
}

fn normalize_sms(attrs: &Attributes) -> Message {
    Message {
        kind: MessageKind::Sms,
        address: text_of(attrs, ADDRESS_KEYS),
        contact_name: text_of(attrs, NAME_KEYS),
        timestamp_ms: parse_timestamp(attrs.get("date")),
        direction: Direction::from_code(attrs.get("type")),
        body: attrs.get("body").unwrap_or_default().to_string(),
        attachments: Vec::new(),
    }
}

fn normalize_mms(attrs: &Attributes, parts: &[Attributes]) -> NormalizedRecord {
    let mut body_lines: Vec<String> = Vec::new();
    let mut attachments = Vec::new();
    let mut dropped_parts = 0;

    for part in parts {
        let content_type = part.get("ct").unwrap_or_default();
        let text = part.get("text");
        let name = part.first_present(PART_NAME_KEYS);

        if content_type.starts_with("text/") || (content_type.is_empty() && text.is_some()) {
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                body_lines.push(text.to_string());
            }
            continue;
        }

        if let Some(data) = part.non_empty("data") {
            match decode_payload(data) {
                Some(bytes) => attachments.push(Attachment {
                    content_type: content_type.to_string(),
                    original_name: name.unwrap_or_default().to_string(),
                    bytes,
                }),
                None => {
                    dropped_parts += 1;
                    warn!(
                        content_type,
                        name = name.unwrap_or_default(),
                        "Dropping MMS part with undecodable payload"
                    );
                }
            }
        } else if let Some(name) = name {
            body_lines.push(format!("[attachment not included: {name}]"));
        }
    }

    NormalizedRecord {
        message: Message {
            kind: MessageKind::Mms,
            address: text_of(attrs, ADDRESS_KEYS),
            contact_name: text_of(attrs, NAME_KEYS),
            timestamp_ms: parse_timestamp(attrs.get("date")),
            direction: Direction::from_code(attrs.first_present(MMS_BOX_KEYS)),
            body: body_lines.join("\n"),
            attachments,
        },
        dropped_parts,
    }
}

fn text_of(attrs: &Attributes, keys: &[&str]) -> String {
    attrs.first_present(keys).unwrap_or_default().to_string()
}

/// Parse a millisecond timestamp; anything but an integer yields `None`.
#[must_use]
pub fn parse_timestamp(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// Decode an inline base64 payload.
///
/// Whitespace is ignored. A payload that fails to decode is retried once
/// with the one or two `=` its length is missing, which repairs exports that
/// strip padding. Payload characters are never removed.
#[must_use]
pub fn decode_payload(data: &str) -> Option<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if let Ok(bytes) = STANDARD.decode(&compact) {
        return Some(bytes);
    }
    if !compact.is_ascii() {
        return None;
    }

    // A lone trailing character can never be valid, padded or not
    let missing = match compact.len() % 4 {
        2 => 2,
        3 => 1,
        _ => return None,
    };
    let mut padded = compact;
    padded.extend(std::iter::repeat('=').take(missing));
    STANDARD.decode(&padded).ok()
}
