//! Static HTML archive
//!
//! Renders an imported archive into plain files that open from disk:
//!
//! - `index.html`: one card per contact, busiest first
//! - `contacts/<name>.html`: the conversation, oldest first, with a year
//!   separator whenever the year changes
//! - with `split_by_year`: `contacts/<name>__YYYY.html` per year, plus
//!   `contacts/<name>__summary.html` linking them when there is more than one
//! - `contacts_stats.csv`: `contact,messages,html_files`

use std::collections::{BTreeMap, HashSet};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::logging::OperationTimer;
use crate::models::{ContactSummary, DbMessage, Direction};
use crate::render::{self, HtmlRenderer, PAGE_END};
use crate::repository::ArchiveRepository;
use crate::utils::safe_filename;

/// Directory holding the per-contact pages
pub const CONTACTS_DIR: &str = "contacts";
/// Stats file name
pub const STATS_FILE: &str = "contacts_stats.csv";
/// Page suffix for messages without a timestamp
const UNDATED: &str = "undated";

/// Options for [`write_static_archive`]
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// One page per contact per year
    pub split_by_year: bool,
    /// Media directory name, relative to the output directory
    pub media_dir_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            split_by_year: false,
            media_dir_name: "media".to_string(),
        }
    }
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Contacts written
    pub contacts: usize,
    /// Messages rendered
    pub messages: u64,
    /// Every HTML file written, index included
    pub pages: Vec<PathBuf>,
}

/// Pages written for one contact
struct ContactPages {
    key: String,
    message_count: u64,
    /// Paths relative to the output directory
    files: Vec<String>,
    /// Page the index card links to
    entry: String,
}

/// Render the archive behind `repo` into `out_dir`.
pub fn write_static_archive(
    repo: &dyn ArchiveRepository,
    out_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let timer = OperationTimer::new("export");
    let renderer = HtmlRenderer::new()?;
    let contacts_dir = out_dir.join(CONTACTS_DIR);
    create_dir_all(&contacts_dir)?;

    let media_prefix = format!("../{}/", options.media_dir_name.trim_matches('/'));
    let mut used_stems = HashSet::new();
    let mut written = Vec::new();
    let mut summary = ExportSummary {
        contacts: 0,
        messages: 0,
        pages: Vec::new(),
    };

    for contact in repo.contacts()? {
        let messages = repo.contact_messages(&contact)?;
        let stem = unique_stem(&contact.key(), &mut used_stems);
        let pages = if options.split_by_year {
            write_split_pages(&renderer, &contacts_dir, &stem, &contact, &messages, &media_prefix)?
        } else {
            write_single_page(&renderer, &contacts_dir, &stem, &contact, &messages, &media_prefix)?
        };
        debug!(contact = %pages.key, files = pages.files.len(), "Contact exported");

        summary.contacts += 1;
        summary.messages += messages.len() as u64;
        summary
            .pages
            .extend(pages.files.iter().map(|f| out_dir.join(f)));
        if !pages.files.contains(&pages.entry) {
            summary.pages.push(out_dir.join(&pages.entry));
        }
        written.push(pages);
    }

    let index_path = out_dir.join("index.html");
    write_index(&index_path, &written)?;
    summary.pages.push(index_path);
    write_stats(&out_dir.join(STATS_FILE), &written)?;

    timer.finish();
    info!(
        contacts = summary.contacts,
        messages = summary.messages,
        pages = summary.pages.len(),
        "Static archive written"
    );
    Ok(summary)
}

/// File stem for a contact, made unique among the stems already used.
fn unique_stem(key: &str, used: &mut HashSet<String>) -> String {
    let base = safe_filename(key);
    let base = if base.is_empty() { "contact".to_string() } else { base };
    let mut stem = base.clone();
    let mut n = 2;
    while !used.insert(stem.to_ascii_lowercase()) {
        stem = format!("{base}_{n}");
        n += 1;
    }
    stem
}

fn sender_label<'a>(message: &DbMessage, key: &'a str) -> &'a str {
    match message.direction {
        Direction::Outbound => "Me",
        Direction::Inbound => key,
    }
}

fn open_page(path: &Path, title: &str) -> Result<BufWriter<File>> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(render::page_start(title).as_bytes())?;
    Ok(writer)
}

fn close_page(mut writer: BufWriter<File>) -> Result<()> {
    writer.write_all(PAGE_END.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn write_single_page(
    renderer: &HtmlRenderer,
    contacts_dir: &Path,
    stem: &str,
    contact: &ContactSummary,
    messages: &[DbMessage],
    media_prefix: &str,
) -> Result<ContactPages> {
    let key = contact.key();
    let file_name = format!("{stem}.html");
    let mut writer = open_page(&contacts_dir.join(&file_name), &key)?;
    writer.write_all(render::heading(&key).as_bytes())?;
    writeln!(writer, "<p class=\"nav\"><a href=\"../index.html\">All contacts</a></p>")?;
    writeln!(writer, "<div class=\"thread\">")?;

    let mut last_year: Option<&str> = None;
    for message in messages {
        if let Some(year) = message.year() {
            if last_year != Some(year) {
                writeln!(writer, "<div class=\"separator\">{}</div>", encode_text(year))?;
                last_year = Some(year);
            }
        }
        writer.write_all(
            renderer
                .bubble(message, sender_label(message, &key), media_prefix)
                .as_bytes(),
        )?;
    }
    writeln!(writer, "</div>")?;
    close_page(writer)?;

    let relative = format!("{CONTACTS_DIR}/{file_name}");
    Ok(ContactPages {
        key,
        message_count: contact.message_count,
        files: vec![relative.clone()],
        entry: relative,
    })
}

fn write_split_pages(
    renderer: &HtmlRenderer,
    contacts_dir: &Path,
    stem: &str,
    contact: &ContactSummary,
    messages: &[DbMessage],
    media_prefix: &str,
) -> Result<ContactPages> {
    let key = contact.key();
    let mut by_year: BTreeMap<&str, Vec<&DbMessage>> = BTreeMap::new();
    for message in messages {
        by_year
            .entry(message.year().unwrap_or(UNDATED))
            .or_default()
            .push(message);
    }

    let mut files = Vec::with_capacity(by_year.len());
    for (year, year_messages) in &by_year {
        let file_name = format!("{stem}__{year}.html");
        let title = format!("{key} ({year})");
        let mut writer = open_page(&contacts_dir.join(&file_name), &title)?;
        writer.write_all(render::heading(&title).as_bytes())?;
        writeln!(writer, "<p class=\"nav\"><a href=\"../index.html\">All contacts</a></p>")?;
        writeln!(writer, "<div class=\"thread\">")?;
        for message in year_messages {
            writer.write_all(
                renderer
                    .bubble(message, sender_label(message, &key), media_prefix)
                    .as_bytes(),
            )?;
        }
        writeln!(writer, "</div>")?;
        close_page(writer)?;
        files.push((year.to_string(), file_name));
    }

    let entry_file = if files.len() > 1 {
        let summary_name = format!("{stem}__summary.html");
        let title = format!("{key}: years");
        let mut writer = open_page(&contacts_dir.join(&summary_name), &title)?;
        writer.write_all(render::heading(&title).as_bytes())?;
        writeln!(writer, "<div class=\"nav\">")?;
        for (year, file_name) in &files {
            writeln!(
                writer,
                "<a href=\"{}\">{}</a>",
                encode_double_quoted_attribute(file_name),
                encode_text(year)
            )?;
        }
        writeln!(writer, "</div>")?;
        close_page(writer)?;
        Some(summary_name)
    } else {
        None
    };

    let files: Vec<String> = files
        .into_iter()
        .map(|(_, file_name)| format!("{CONTACTS_DIR}/{file_name}"))
        .collect();
    let entry = match entry_file {
        Some(summary_name) => format!("{CONTACTS_DIR}/{summary_name}"),
        None => files.first().cloned().unwrap_or_default(),
    };

    Ok(ContactPages {
        key,
        message_count: contact.message_count,
        files,
        entry,
    })
}

fn write_index(path: &Path, contacts: &[ContactPages]) -> Result<()> {
    let mut writer = open_page(path, "SMS/MMS archive")?;
    writer.write_all(render::heading("SMS/MMS archive").as_bytes())?;
    writeln!(
        writer,
        "<p class=\"meta\">{} contacts. Open a contact to read the conversation; attachments are shown inline.</p>",
        contacts.len()
    )?;
    writeln!(writer, "<div class=\"contact-list\">")?;
    for contact in contacts {
        let link_label = if contact.entry.ends_with("__summary.html") {
            "Browse years"
        } else {
            "Open conversation"
        };
        writeln!(
            writer,
            "<div class=\"contact\"><h3>{}</h3><div class=\"meta\">{} messages</div>\
             <p><a href=\"{}\">{link_label}</a></p></div>",
            encode_text(&contact.key),
            contact.message_count,
            encode_double_quoted_attribute(&contact.entry)
        )?;
    }
    writeln!(writer, "</div>")?;
    close_page(writer)
}

fn write_stats(path: &Path, contacts: &[ContactPages]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
    writer.write_record(["contact", "messages", "html_files"])?;
    for contact in contacts {
        let count = contact.message_count.to_string();
        let files = contact.files.join(" | ");
        writer.write_record([contact.key.as_str(), count.as_str(), files.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_stem_disambiguates() {
        let mut used = HashSet::new();
        assert_eq!(unique_stem("Alice (+1)", &mut used), "Alice __1_");
        assert_eq!(unique_stem("Alice [+1]", &mut used), "Alice __1__2");
        assert_eq!(unique_stem("", &mut used), "contact");
    }
}
