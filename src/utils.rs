//! Small helpers shared by the exporter and the server.

/// Maximum length of a generated file stem, in bytes
pub const MAX_FILENAME_BYTES: usize = 200;

/// Stable display key for a counterparty.
///
/// `"Name (address)"` when both are known, otherwise whichever is non-empty,
/// otherwise `"Unknown"`.
#[must_use]
pub fn contact_key(address: &str, name: &str) -> String {
    let address = address.trim();
    let name = name.trim();
    match (name.is_empty(), address.is_empty()) {
        (false, false) => format!("{name} ({address})"),
        (false, true) => name.to_string(),
        (true, false) => address.to_string(),
        (true, true) => "Unknown".to_string(),
    }
}

/// Turn an arbitrary label into a file stem that is safe on every platform.
///
/// Path separators and anything outside word characters, `-`, `.` and space
/// become `_`; whitespace runs collapse to one space; the result is at most
/// [`MAX_FILENAME_BYTES`] bytes, cut on a character boundary so page suffixes
/// still fit in a file name.
#[must_use]
pub fn safe_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.len() > MAX_FILENAME_BYTES {
        let mut end = MAX_FILENAME_BYTES;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    out
}
