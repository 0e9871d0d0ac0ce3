use std::path::{Component, Path, PathBuf};

use crate::error::{ArchiveError, Result};

/// Longest accepted search query, in characters
pub const MAX_QUERY_CHARS: usize = 512;
/// Largest accepted write batch
pub const MAX_BATCH_SIZE: usize = 1_000_000;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a path requested from the media directory.
    ///
    /// Returns the path relative to the media root. Rejects NUL, backslashes,
    /// absolute paths and any `..` segment; empty and `.` segments are
    /// skipped.
    pub fn validate_media_path(raw: &str) -> Result<PathBuf> {
        if raw.contains('\0') {
            return Err(ArchiveError::InvalidPath("path contains NUL".to_string()));
        }
        if raw.contains('\\') {
            return Err(ArchiveError::InvalidPath("path contains a backslash".to_string()));
        }
        if raw.starts_with('/') || Path::new(raw).is_absolute() {
            return Err(ArchiveError::InvalidPath(format!("absolute path: {raw}")));
        }

        let mut relative = PathBuf::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(ArchiveError::InvalidPath(format!("parent segment in: {raw}")));
                }
                _ => relative.push(segment),
            }
        }

        // Drive prefixes and the like
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ArchiveError::InvalidPath(format!("unsupported path: {raw}")));
        }
        if relative.as_os_str().is_empty() {
            return Err(ArchiveError::InvalidPath("empty path".to_string()));
        }
        Ok(relative)
    }

    /// Validate a search query and return it trimmed.
    pub fn validate_search_query(query: &str) -> Result<String> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ArchiveError::InvalidInput("search query cannot be empty".to_string()));
        }
        if trimmed.contains('\0') {
            return Err(ArchiveError::InvalidInput(
                "search query contains invalid characters".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_QUERY_CHARS {
            return Err(ArchiveError::InvalidInput(format!(
                "search query too long (max {MAX_QUERY_CHARS} characters)"
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Validate an optional record limit; zero is rejected.
    pub fn validate_limit(limit: Option<usize>) -> Result<Option<usize>> {
        match limit {
            Some(0) => Err(ArchiveError::InvalidInput(
                "limit must be greater than 0".to_string(),
            )),
            other => Ok(other),
        }
    }

    /// Validate batch size for processing
    pub fn validate_batch_size(batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if batch_size > MAX_BATCH_SIZE {
            return Err(ArchiveError::InvalidConfig(format!(
                "Batch size too large (max {MAX_BATCH_SIZE})"
            )));
        }

        Ok(())
    }

    /// Validate the backup file given to `import`
    pub fn validate_input_file(path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(ArchiveError::MissingPath(path.to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_path_strips_dot_segments() {
        let path = InputValidator::validate_media_path("./sub//media_000000001.jpg")
            .expect("valid path");
        assert_eq!(path, PathBuf::from("sub/media_000000001.jpg"));
    }

    #[test]
    fn test_media_path_rejects_traversal() {
        for raw in ["../secret", "a/../../b", "/etc/passwd", "a\\b", "a\0b", "", "./"] {
            assert!(
                InputValidator::validate_media_path(raw).is_err(),
                "{raw:?} should be rejected"
            );
        }
    }
}
