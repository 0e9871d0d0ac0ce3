//! Local search and browse server
//!
//! Routes:
//! - `GET /`: search form
//! - `GET /search?q=`: newest matches first, capped at the configured limit
//! - `GET /conversation/{id}`: every message with the same counterparty as
//!   message `id`, oldest first
//! - `GET /media/{*path}`: files from the media directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{ArchiveError, Result};
use crate::media::content_type_for;
use crate::metrics::record_search;
use crate::models::{DbMessage, Direction};
use crate::render::{self, HtmlRenderer};
use crate::repository::{ArchiveRepository, SqliteRepository};
use crate::utils::contact_key;
use crate::validation::InputValidator;

/// Where and how to listen
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Maximum rows per search page
    pub search_limit: usize,
    /// Read connections in the pool
    pub max_connections: u32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            search_limit: 200,
            max_connections: 4,
        }
    }
}

/// State shared by the handlers
#[derive(Clone)]
pub struct AppState {
    repo: Arc<dyn ArchiveRepository>,
    media_dir: Arc<PathBuf>,
    renderer: Arc<HtmlRenderer>,
    search_limit: usize,
}

impl AppState {
    /// State serving `repo`, with files from `media_dir`
    pub fn new(repo: Arc<dyn ArchiveRepository>, media_dir: PathBuf, search_limit: usize) -> Result<Self> {
        Ok(Self {
            repo,
            media_dir: Arc::new(media_dir),
            renderer: Arc::new(HtmlRenderer::new()?),
            search_limit: search_limit.max(1),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/search", get(search))
        .route("/conversation/{id}", get(conversation))
        .route("/media/{*path}", get(media))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the archive and serve it until the process is stopped.
///
/// Both paths are checked before binding.
pub async fn serve(db_path: &Path, media_dir: &Path, options: &ServerOptions) -> Result<()> {
    if !media_dir.is_dir() {
        return Err(ArchiveError::MissingPath(media_dir.to_path_buf()));
    }
    let repo = SqliteRepository::open(db_path, options.max_connections)?;
    if !repo.fts_available() {
        info!("Archive has no full-text index; search uses substring matching");
    }

    let state = AppState::new(Arc::new(repo), media_dir.to_path_buf(), options.search_limit)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((options.host.as_str(), options.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, db = %db_path.display(), media = %media_dir.display(), "Search server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Handler error mapped onto an HTTP status
enum AppError {
    Archive(ArchiveError),
    Task(tokio::task::JoinError),
}

impl From<ArchiveError> for AppError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Archive(ArchiveError::NotFound(_) | ArchiveError::InvalidPath(_)) => StatusCode::NOT_FOUND,
            Self::Archive(ArchiveError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Archive(e) => {
                error!(error = %e, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Task(e) => {
                error!(error = %e, "Query task failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, Html(render::page(reason, &render::heading(reason)))).into_response()
    }
}

/// Run a repository query on the blocking pool.
async fn query<T, F>(state: &AppState, f: F) -> std::result::Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ArchiveRepository) -> Result<T> + Send + 'static,
{
    let repo = Arc::clone(&state.repo);
    tokio::task::spawn_blocking(move || f(repo.as_ref()))
        .await
        .map_err(AppError::Task)?
        .map_err(AppError::from)
}

fn search_form(q: &str) -> String {
    format!(
        "<div class=\"card\"><form class=\"form\" method=\"get\" action=\"/search\">\
         <input name=\"q\" placeholder=\"Keyword, number or contact\" value=\"{}\">\
         <button>Search</button></form></div>\n",
        encode_double_quoted_attribute(q)
    )
}

async fn index() -> Html<String> {
    let body = format!("{}{}", render::heading("Search the archive"), search_form(""));
    Html(render::page("SMS archive", &body))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Html<String>, AppError> {
    let raw = params.q.unwrap_or_default();
    if raw.trim().is_empty() {
        return Ok(index().await);
    }
    let q = InputValidator::validate_search_query(&raw)?;

    let limit = state.search_limit;
    let needle = q.clone();
    let results = query(&state, move |repo| repo.search(&needle, limit)).await?;
    record_search(results.method);

    let mut body = render::heading("Search the archive");
    body.push_str(&search_form(&q));
    body.push_str(&format!(
        "<h2>Results for \u{201c}{}\u{201d}: {} messages</h2>\n<div class=\"card\">\n",
        encode_text(&q),
        results.messages.len()
    ));
    for message in &results.messages {
        body.push_str(&result_row(&state.renderer, message));
    }
    body.push_str("</div>\n");

    Ok(Html(render::page(&format!("Search: {q}"), &body)))
}

fn result_row(renderer: &HtmlRenderer, message: &DbMessage) -> String {
    let mut row = format!(
        "<div class=\"msg\"><div><a href=\"/conversation/{}\"><strong>{}</strong></a> \
         <span class=\"small\">{}</span></div><div>{}</div>",
        message.id,
        encode_text(message.display_name()),
        encode_text(message.date_iso.as_deref().unwrap_or_default()),
        renderer.body_html(message)
    );
    for media in &message.media {
        row.push_str(&render::media_html(media, "/media/"));
    }
    row.push_str("</div>\n");
    row
}

async fn conversation(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> std::result::Result<Html<String>, AppError> {
    let messages = query(&state, move |repo| repo.conversation(id)).await?;
    let who = messages
        .first()
        .map(|m| contact_key(&m.address, &m.contact_name))
        .unwrap_or_default();

    let mut body = render::heading(&format!("Conversation: {who}"));
    body.push_str("<p class=\"nav\"><a href=\"/\">Search</a></p>\n<div class=\"thread\">\n");
    for message in &messages {
        let sender = match message.direction {
            Direction::Outbound => "Me",
            Direction::Inbound => who.as_str(),
        };
        body.push_str(&state.renderer.bubble(message, sender, "/media/"));
    }
    body.push_str("</div>\n");

    Ok(Html(render::page(&format!("Conversation: {who}"), &body)))
}

async fn media(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> std::result::Result<Response, AppError> {
    let relative = InputValidator::validate_media_path(&path)?;
    let full = state.media_dir.join(&relative);

    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ArchiveError::NotFound(path).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArchiveError::NotFound(path).into());
        }
        Err(e) => return Err(ArchiveError::Io(e).into()),
    }
    let bytes = tokio::fs::read(&full).await.map_err(ArchiveError::Io)?;

    let content_type = content_type_for(&relative.to_string_lossy());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
