//! Media extraction
//!
//! Decoded attachment payloads are written to the media directory under a
//! generated name, `media_000000001.jpg`, numbered by a counter owned by the
//! import run. Source names only ever contribute an extension.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::models::{Attachment, StoredAttachment};

/// Extension used when nothing better is known
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Known content types and their extensions
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
    ("audio/ogg", ".ogg"),
    ("audio/amr", ".amr"),
    ("video/mp4", ".mp4"),
    ("video/3gpp", ".3gp"),
    ("text/plain", ".txt"),
    ("application/pdf", ".pdf"),
];

/// Sequence numbers for stored attachments.
///
/// Starts at 1 and only ever increases. Each import run owns exactly one.
#[derive(Debug)]
pub struct AttachmentCounter {
    next: u64,
}

impl Default for AttachmentCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentCounter {
    /// Counter whose first value is 1
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next sequence number.
    pub fn next_value(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// Number of values handed out so far
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next - 1
    }
}

/// Name under which attachment number `sequence` is stored.
#[must_use]
pub fn stored_filename(sequence: u64, extension: &str) -> String {
    format!("media_{sequence:09}{extension}")
}

/// Pick a file extension (with leading dot) for an attachment.
///
/// Order: the suggested name's own extension, the MIME table, the
/// content-type subtype, then [`FALLBACK_EXTENSION`].
#[must_use]
pub fn infer_extension(content_type: &str, suggested_name: Option<&str>) -> String {
    if let Some(ext) = suggested_name.and_then(name_extension) {
        return ext;
    }

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return FALLBACK_EXTENSION.to_string();
    }

    if let Some((_, ext)) = MIME_EXTENSIONS.iter().find(|(mime, _)| *mime == essence) {
        return (*ext).to_string();
    }

    if let Some((_, subtype)) = essence.split_once('/') {
        let subtype: String = subtype
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
            .collect();
        let subtype = subtype
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        if !subtype.is_empty() {
            return format!(".{subtype}");
        }
    }

    FALLBACK_EXTENSION.to_string()
}

/// Extension of a declared name, when it looks like one.
fn name_extension(name: &str) -> Option<String> {
    let ext = Path::new(name.trim()).extension()?.to_str()?;
    let recognizable = (1..=8).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
    recognizable.then(|| format!(".{}", ext.to_ascii_lowercase()))
}

/// Reverse lookup used when serving files
#[must_use]
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let dotted = format!(".{ext}");
    MIME_EXTENSIONS
        .iter()
        .find(|(_, e)| *e == dotted)
        .map_or("application/octet-stream", |(mime, _)| mime)
}

/// Media directory plus the counter naming files written into it
#[derive(Debug)]
pub struct MediaStore {
    dir: PathBuf,
    counter: AttachmentCounter,
}

impl MediaStore {
    /// Create (if needed) the media directory.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter: AttachmentCounter::new(),
        })
    }

    /// Directory files are written to
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written so far
    #[must_use]
    pub const fn files_written(&self) -> u64 {
        self.counter.issued()
    }

    /// Write one attachment and return its stored name.
    ///
    /// Files are created with create-new semantics, so an existing file is
    /// never overwritten.
    pub fn store(&mut self, attachment: &Attachment) -> Result<StoredAttachment> {
        let suggested = Some(attachment.original_name.as_str()).filter(|n| !n.is_empty());
        let extension = infer_extension(&attachment.content_type, suggested);
        let filename = stored_filename(self.counter.next_value(), &extension);
        let path = self.dir.join(&filename);

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(&attachment.bytes)?;
        file.flush()?;

        debug!(
            file = %filename,
            bytes = attachment.bytes.len(),
            content_type = %attachment.content_type,
            "Attachment extracted"
        );

        Ok(StoredAttachment {
            stored_filename: filename,
            content_type: attachment.content_type.clone(),
            original_name: attachment.original_name.clone(),
        })
    }
}
