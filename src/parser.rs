//! Streaming reader for SMS Backup & Restore XML exports
//!
//! Walks the document event by event and yields one [`RawRecord`] per `<sms>`
//! or `<mms>` element. Only the record currently being read is held in
//! memory; everything else (the `<smses>` root, `<call>` entries, `<addrs>`
//! blocks) is read past and dropped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::models::{Attributes, MessageKind, RawRecord};

/// Read buffer size for backup files
const READ_BUFFER_BYTES: usize = 1024 * 1024;

/// Forward-only iterator over the records of a backup file
pub struct BackupReader<R: BufRead> {
    reader: Reader<R>,
    /// Event buffer, cleared before every read
    buf: Vec<u8>,
    /// Names of the currently open elements
    open_elements: Vec<Vec<u8>>,
    records_read: u64,
    finished: bool,
}

/// Record being assembled from events
struct PendingRecord {
    kind: MessageKind,
    attributes: Attributes,
    parts: Vec<Attributes>,
    /// Nesting depth of the record element itself
    depth: usize,
    /// Inside the `<parts>` grouping element
    in_parts: bool,
}

impl PendingRecord {
    const fn new(kind: MessageKind, attributes: Attributes, depth: usize) -> Self {
        Self {
            kind,
            attributes,
            parts: Vec::new(),
            depth,
            in_parts: false,
        }
    }

    /// Handle a child element opening at `depth`.
    fn open_child(
        &mut self,
        element: &BytesStart<'_>,
        depth: usize,
        self_closing: bool,
    ) -> quick_xml::Result<()> {
        if self.kind != MessageKind::Mms {
            return Ok(());
        }
        let name = element.name();
        let name = name.as_ref();
        let relative = depth - self.depth;

        if name.eq_ignore_ascii_case(b"parts") && relative == 1 {
            self.in_parts = !self_closing;
        } else if name.eq_ignore_ascii_case(b"part") && (relative == 1 || (relative == 2 && self.in_parts)) {
            self.parts.push(read_attributes(element)?);
        }
        Ok(())
    }

    /// Handle a child element closing at `depth`.
    fn close_child(&mut self, depth: usize) {
        if depth == self.depth + 1 {
            self.in_parts = false;
        }
    }

    fn finish(self) -> RawRecord {
        RawRecord {
            kind: self.kind,
            attributes: self.attributes,
            parts: self.parts,
        }
    }
}

impl BackupReader<BufReader<File>> {
    /// Open a backup file for streaming.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ArchiveError::MissingPath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
    }
}

impl<R: BufRead> BackupReader<R> {
    /// Stream records from any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::with_capacity(8192),
            open_elements: Vec::new(),
            records_read: 0,
            finished: false,
        }
    }

    /// Number of records yielded so far
    #[must_use]
    pub const fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Bytes currently reserved by the event buffer.
    ///
    /// Grows to the size of the largest single element seen, never with the
    /// number of records.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Read events until the next record is complete.
    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut pending: Option<PendingRecord> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(xml_error(&self.reader, e)),
            };

            match event {
                Event::Start(ref e) => {
                    self.open_elements.push(e.name().as_ref().to_vec());
                    let depth = self.open_elements.len();
                    match pending.as_mut() {
                        Some(record) => record
                            .open_child(e, depth, false)
                            .map_err(|err| xml_error(&self.reader, err))?,
                        None => {
                            if let Some(kind) = MessageKind::from_tag(e.name().as_ref()) {
                                let attributes = read_attributes(e).map_err(|err| xml_error(&self.reader, err))?;
                                pending = Some(PendingRecord::new(kind, attributes, depth));
                            }
                        }
                    }
                }
                Event::Empty(ref e) => {
                    let depth = self.open_elements.len() + 1;
                    match pending.as_mut() {
                        Some(record) => record
                            .open_child(e, depth, true)
                            .map_err(|err| xml_error(&self.reader, err))?,
                        None => {
                            if let Some(kind) = MessageKind::from_tag(e.name().as_ref()) {
                                let attributes = read_attributes(e).map_err(|err| xml_error(&self.reader, err))?;
                                let record = PendingRecord::new(kind, attributes, depth);
                                return Ok(Some(self.emit(record)));
                            }
                        }
                    }
                }
                Event::End(_) => {
                    let depth = self.open_elements.len();
                    self.open_elements.pop();
                    match pending.take() {
                        Some(record) if depth == record.depth => {
                            return Ok(Some(self.emit(record)));
                        }
                        Some(mut record) => {
                            record.close_child(depth);
                            pending = Some(record);
                        }
                        None => {}
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    if let Some(name) = self.open_elements.last() {
                        return Err(ArchiveError::Truncated(String::from_utf8_lossy(name).into_owned()));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn emit(&mut self, record: PendingRecord) -> RawRecord {
        self.records_read += 1;
        debug!(
            kind = record.kind.as_str(),
            parts = record.parts.len(),
            index = self.records_read,
            "Record parsed"
        );
        record.finish()
    }
}

impl<R: BufRead> Iterator for BackupReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Attach the reader position to a parser error.
fn xml_error<R>(reader: &Reader<R>, source: quick_xml::Error) -> ArchiveError {
    ArchiveError::xml(reader.buffer_position() as u64, source)
}

/// Copy the unescaped attributes of an element.
fn read_attributes(element: &BytesStart<'_>) -> quick_xml::Result<Attributes> {
    let mut attributes = Attributes::new();
    for attr in element.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        attributes.push(String::from_utf8_lossy(attr.key.as_ref()), value);
    }
    Ok(attributes)
}
