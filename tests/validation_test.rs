//! Tests for input validation

use std::path::PathBuf;

use proptest::prelude::*;
use sms_archive::error::ArchiveError;
use sms_archive::validation::{InputValidator, MAX_BATCH_SIZE, MAX_QUERY_CHARS};

#[test]
fn test_validate_media_path_plain_file() {
    let path = InputValidator::validate_media_path("media_000000001.jpg").expect("valid");
    assert_eq!(path, PathBuf::from("media_000000001.jpg"));
}

#[test]
fn test_validate_media_path_nested() {
    let path = InputValidator::validate_media_path("2021/media_000000001.jpg").expect("valid");
    assert_eq!(path, PathBuf::from("2021/media_000000001.jpg"));
}

#[test]
fn test_validate_media_path_parent_segment() {
    assert!(matches!(
        InputValidator::validate_media_path("../messages.db"),
        Err(ArchiveError::InvalidPath(_))
    ));
    assert!(InputValidator::validate_media_path("a/b/../../../x").is_err());
}

#[test]
fn test_validate_media_path_dots_inside_names_are_fine() {
    assert!(InputValidator::validate_media_path("media..jpg").is_ok());
    assert!(InputValidator::validate_media_path("...").is_ok());
}

#[test]
fn test_validate_media_path_absolute() {
    assert!(InputValidator::validate_media_path("/etc/passwd").is_err());
}

#[test]
fn test_validate_media_path_backslash() {
    assert!(InputValidator::validate_media_path("..\\messages.db").is_err());
    assert!(InputValidator::validate_media_path("a\\b.jpg").is_err());
}

#[test]
fn test_validate_media_path_nul() {
    assert!(InputValidator::validate_media_path("a\0.jpg").is_err());
}

#[test]
fn test_validate_search_query_trims() {
    assert_eq!(
        InputValidator::validate_search_query("  pineapple \n").expect("valid"),
        "pineapple"
    );
}

#[test]
fn test_validate_search_query_empty() {
    assert!(InputValidator::validate_search_query("").is_err());
    assert!(InputValidator::validate_search_query("   ").is_err());
}

#[test]
fn test_validate_search_query_length() {
    let exact = "a".repeat(MAX_QUERY_CHARS);
    assert!(InputValidator::validate_search_query(&exact).is_ok());
    let long = "a".repeat(MAX_QUERY_CHARS + 1);
    assert!(matches!(
        InputValidator::validate_search_query(&long),
        Err(ArchiveError::InvalidInput(_))
    ));
}

#[test]
fn test_validate_search_query_counts_characters_not_bytes() {
    let accented = "é".repeat(MAX_QUERY_CHARS);
    assert!(InputValidator::validate_search_query(&accented).is_ok());
}

#[test]
fn test_validate_search_query_nul() {
    assert!(InputValidator::validate_search_query("a\0b").is_err());
}

#[test]
fn test_validate_limit() {
    assert_eq!(InputValidator::validate_limit(None).expect("valid"), None);
    assert_eq!(InputValidator::validate_limit(Some(5)).expect("valid"), Some(5));
    assert!(InputValidator::validate_limit(Some(0)).is_err());
}

#[test]
fn test_validate_batch_size() {
    assert!(InputValidator::validate_batch_size(1).is_ok());
    assert!(InputValidator::validate_batch_size(MAX_BATCH_SIZE).is_ok());
    assert!(InputValidator::validate_batch_size(0).is_err());
    assert!(InputValidator::validate_batch_size(MAX_BATCH_SIZE + 1).is_err());
}

proptest! {
    #[test]
    fn prop_accepted_media_paths_stay_relative(raw in "[a-z./\\\\]{0,16}") {
        if let Ok(path) = InputValidator::validate_media_path(&raw) {
            prop_assert!(path.is_relative());
            prop_assert!(path.components().all(|c| matches!(c, std::path::Component::Normal(_))));
        }
    }

    #[test]
    fn prop_paths_with_parent_segments_are_rejected(prefix in "[a-z]{0,4}", suffix in "[a-z]{0,4}") {
        let raw = format!("{prefix}/../{suffix}");
        prop_assert!(InputValidator::validate_media_path(&raw).is_err());
    }
}
