use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;

use super::paths::resolve_under_root;
use super::state::AppState;
use crate::error::HttpError;

/// `GET /` — list the root of the configured files directory.
pub async fn list_root(state: State<Arc<AppState>>) -> Result<Html<String>, HttpError> {
    render_listing(state, String::new()).await
}

/// `GET /{*path}` — list a subdirectory of the files root.
///
/// Grounded in `original_source/yippy/handle_index.go`'s recursive listing,
/// reimplemented with `tokio::fs::read_dir` instead of blocking `os.ReadDir`,
/// and with the traversal check applied before any path resolution instead
/// of after string concatenation.
pub async fn list_subpath(
    state: State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Html<String>, HttpError> {
    render_listing(state, path).await
}

async fn render_listing(
    State(state): State<Arc<AppState>>,
    subpath: String,
) -> Result<Html<String>, HttpError> {
    let target = resolve_under_root(&state.config.files_root, &subpath)?;

    if !target.is_dir() {
        return Err(HttpError::BadRequest(
            "requested path is not a directory".to_string(),
        ));
    }

    let mut read_dir = tokio::fs::read_dir(&target)
        .await
        .map_err(|e| HttpError::Internal(format!("failed to list directory: {e}")))?;

    let display_path = if subpath.is_empty() {
        "/".to_string()
    } else {
        format!("/{subpath}")
    };
    let mut html = format!("<h3>{display_path}</h3>");
    let prefix = subpath.trim_end_matches('/');

    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| HttpError::Internal(format!("failed to read directory entry: {e}")))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let href = if prefix.is_empty() {
            format!("/{name}")
        } else {
            format!("/{prefix}/{name}")
        };
        html.push_str(&format!(r#"<p><a href="{href}">{name}</a></p>"#));
    }

    Ok(Html(html))
}
