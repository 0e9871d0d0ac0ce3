mod common;

use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tempfile::tempdir;
use tower::ServiceExt;

use common::{data_part, import_records, mms, sms, text_part, JUNE_2021, PNG_BASE64};
use sms_archive::error::ArchiveError;
use sms_archive::importer::{ImportOptions, ImportSummary};
use sms_archive::repository::SqliteRepository;
use sms_archive::server::{router, serve, AppState, ServerOptions};

fn archive(dir: &Path) -> ImportSummary {
    let records = vec![
        sms("+15551111111", "Alice", JUNE_2021, "1", "Do you like <b>pineapple</b>?"),
        sms("+15552222222", "Bob", JUNE_2021 + 1_000, "1", "Meeting at 10"),
        sms("+15551111111", "Alice", JUNE_2021 + 2_000, "2", "See https://example.com/menu"),
        mms(
            "+15551111111",
            "Alice",
            JUNE_2021 + 3_000,
            "1",
            &[text_part("a cat"), data_part("image/png", "cat.png", PNG_BASE64)],
        ),
    ];
    import_records(dir, &records, &ImportOptions::default())
}

fn app(summary: &ImportSummary) -> Router {
    let repo = SqliteRepository::open(&summary.db_path, 2).expect("Failed to open archive");
    let state = AppState::new(Arc::new(repo), summary.media_dir.clone(), 200).expect("Failed to build state");
    router(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, content_type, body.to_vec())
}

fn text(body: &[u8]) -> String {
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn test_index_shows_search_form() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, content_type, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/html"));
    assert!(text(&body).contains("action=\"/search\""));
}

#[tokio::test]
async fn test_search_renders_escaped_results() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, body) = get(app, "/search?q=pineapple").await;
    let html = text(&body);
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("1 messages"));
    assert!(html.contains("&lt;b&gt;pineapple&lt;/b&gt;"));
    assert!(html.contains("href=\"/conversation/1\""));
}

#[tokio::test]
async fn test_search_shows_media_thumbnails() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, body) = get(app, "/search?q=cat").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text(&body).contains("<img src=\"/media/media_000000001.png\""));
}

#[tokio::test]
async fn test_empty_query_shows_form() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, body) = get(app, "/search?q=").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!text(&body).contains("Results for"));
}

#[tokio::test]
async fn test_conversation_page() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, body) = get(app, "/conversation/1").await;
    let html = text(&body);
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Conversation: Alice (+15551111111)"));
    assert_eq!(html.matches("class=\"msg ").count(), 3);
    assert!(html.contains("<a href=\"https://example.com/menu\""));
    assert!(!html.contains("Meeting at 10"));
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, _) = get(app, "/conversation/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_media_file_is_served() {
    let dir = tempdir().expect("Failed to create temp directory");
    let summary = archive(dir.path());
    let expected = std::fs::read(summary.media_dir.join("media_000000001.png")).expect("read media");

    let (status, content_type, body) = get(app(&summary), "/media/media_000000001.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_media_traversal_is_404() {
    let dir = tempdir().expect("Failed to create temp directory");
    let summary = archive(dir.path());

    for uri in [
        "/media/../messages.db",
        "/media/%2e%2e/messages.db",
        "/media/sub/../../messages.db",
        "/media/..%2fmessages.db",
        "/media/%2Fetc%2Fpasswd",
        "/media/a%5C..%5Cmessages.db",
        "/media/a%00b",
        "/media/missing.png",
    ] {
        let (status, _, _) = get(app(&summary), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri} should be 404");
    }
}

#[tokio::test]
async fn test_serve_requires_existing_paths() {
    let dir = tempdir().expect("Failed to create temp directory");
    let summary = archive(dir.path());
    let options = ServerOptions::default();

    let missing_media = serve(&summary.db_path, &dir.path().join("nope"), &options).await;
    assert!(matches!(missing_media, Err(ArchiveError::MissingPath(_))));

    let missing_db = serve(&dir.path().join("nope.db"), &summary.media_dir, &options).await;
    assert!(matches!(missing_db, Err(ArchiveError::MissingPath(_))));
}

#[tokio::test]
async fn test_search_box_keeps_quoted_query_inside_attribute() {
    let dir = tempdir().expect("Failed to create temp directory");
    let app = app(&archive(dir.path()));

    let (status, _, body) = get(app, "/search?q=%22x%22%20onfocus%3D%22y").await;
    let html = text(&body);
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("value=\"&quot;x&quot; onfocus=&quot;y\""));
    assert!(!html.contains("value=\"\"x\""));
}
