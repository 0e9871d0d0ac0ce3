//! Helpers for building backup files in integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sms_archive::importer::{import_file, ImportOptions, ImportSummary};

/// 2021-06-15 12:00:00 UTC
pub const JUNE_2021: i64 = 1_623_758_400_000;
/// 2022-06-15 12:00:00 UTC
pub const JUNE_2022: i64 = 1_655_294_400_000;

/// 1x1 transparent PNG
pub const PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Escape a value for use inside a double-quoted attribute.
pub fn attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
}

/// One `<sms/>` element.
pub fn sms(address: &str, name: &str, date: i64, kind: &str, body: &str) -> String {
    format!(
        r#"<sms protocol="0" address="{}" date="{date}" type="{kind}" body="{}" read="1" status="-1" contact_name="{}" />"#,
        attr(address),
        attr(body),
        attr(name)
    )
}

/// A `<part/>` carrying text.
pub fn text_part(text: &str) -> String {
    format!(r#"<part seq="0" ct="text/plain" name="null" chset="106" text="{}" />"#, attr(text))
}

/// A `<part/>` carrying an inline payload.
pub fn data_part(content_type: &str, name: &str, data: &str) -> String {
    format!(
        r#"<part seq="0" ct="{}" name="{}" cl="{}" data="{}" />"#,
        attr(content_type),
        attr(name),
        attr(name),
        attr(data)
    )
}

/// One `<mms>` element with its parts grouped the usual way.
pub fn mms(address: &str, name: &str, date: i64, msg_box: &str, parts: &[String]) -> String {
    format!(
        r#"<mms date="{date}" msg_box="{msg_box}" address="{}" contact_name="{}" m_type="132"><parts>{}</parts><addrs><addr address="{}" type="137" charset="106" /></addrs></mms>"#,
        attr(address),
        attr(name),
        parts.concat(),
        attr(address)
    )
}

/// Wrap records in the backup root element.
pub fn backup(records: &[String]) -> String {
    format!(
        "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>\n<smses count=\"{}\" backup_set=\"test\">\n{}\n</smses>\n",
        records.len(),
        records.join("\n")
    )
}

/// Write `xml` to `dir/backup.xml`.
pub fn write_backup(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("backup.xml");
    fs::write(&path, xml).expect("Failed to write backup");
    path
}

/// Import `records` into `dir/out`.
pub fn import_records(dir: &Path, records: &[String], options: &ImportOptions) -> ImportSummary {
    let xml = write_backup(dir, &backup(records));
    import_file(&xml, &dir.join("out"), options).expect("Import failed")
}
