use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};

use super::paths::resolve_under_root;
use super::state::AppState;
use crate::error::HttpError;

#[derive(Debug, Deserialize)]
pub struct SubsQuery {
    file: String,
}

/// `GET /subs?file=<name>` — one-shot WebVTT subtitle extraction.
///
/// Grounded in `original_source/yippy/handle_subs.go`: spawn `ffmpeg -i
/// <file> -f webvtt pipe:1`, read its stdout to completion, and return it in
/// one response. Deliberately does not go through [`crate::core`] — a
/// subtitle track is small and doesn't need live fan-out or late-joiner
/// catch-up.
pub async fn subs_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<SubsQuery>,
) -> Result<Response, HttpError> {
    let path = resolve_under_root(&state.config.files_root, &query.file)?;

    info!(ip = %addr.ip(), path = %path.display(), "extracting subtitles");

    let mut child = Command::new("ffmpeg")
        .arg("-i")
        .arg(&path)
        .arg("-f")
        .arg("webvtt")
        .arg("pipe:1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            warn!(error = %e, "error starting vtt transcode");
            HttpError::Internal("failed to start subtitle extraction".to_string())
        })?;

    let mut stdout = child.stdout.take().ok_or_else(|| {
        HttpError::Internal("ffmpeg stdout not piped".to_string())
    })?;

    let mut bytes = Vec::new();
    stdout.read_to_end(&mut bytes).await.map_err(|e| {
        warn!(error = %e, "error reading output for vtt transcode");
        HttpError::Internal("failed to read subtitle output".to_string())
    })?;

    let status = child.wait().await.map_err(|e| {
        warn!(error = %e, "error waiting for ffmpeg");
        HttpError::Internal("subtitle extraction process failed".to_string())
    })?;

    if !status.success() {
        warn!(?status, "ffmpeg exited with a non-zero status during vtt extraction");
        return Err(HttpError::Internal("subtitle extraction failed".to_string()));
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/vtt")],
        bytes,
    )
        .into_response())
}
