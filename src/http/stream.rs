use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::paths::resolve_under_root;
use super::state::AppState;
use crate::core::Session;
use crate::error::HttpError;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    file: String,
}

/// `GET /stream?file=<name>` — resolves `file` against the files root,
/// starts (or joins) a transcode session, and streams chunks to the client
/// as they become available.
///
/// This is the HTTP adaptor named in the design: it performs the only
/// network I/O on top of the core, reading exactly the notifications and
/// buffer contents the session hands it, and stops the session on every
/// exit path (`Session::drop` is the backstop).
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, HttpError> {
    let path = resolve_under_root(&state.config.files_root, &query.file)?;

    let session = state.manager.start(addr.to_string(), path)?;

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(8);
    tokio::spawn(drive_adaptor(session, tx));

    let body = Body::from_stream(ReceiverStream::new(rx));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(body)
        .map_err(|e| HttpError::Internal(e.to_string()))?
        .into_response())
}

/// Adaptor loop per §4.5 of the design: wait for a notification or client
/// disconnect, write every newly completed chunk in order, and stop once the
/// buffer is finished and fully drained — or the moment the client goes
/// away, signalled here by the body channel's sender closing.
async fn drive_adaptor(mut session: Session, tx: mpsc::Sender<Result<Bytes, std::io::Error>>) {
    let mut sent: usize = 0;

    loop {
        tokio::select! {
            biased;

            _ = tx.closed() => {
                debug!(session = %session.id, "client disconnected");
                return;
            }

            notification = session.rx.recv() => {
                let Some(count) = notification else {
                    return;
                };
                if count < 0 {
                    return;
                }

                // `sent` only ever advances: the initial notification is
                // delivered asynchronously (see `SessionManager::start`) on
                // the same capacity-1 sink the job's `try_send` broadcasts
                // advance onto, so a stale, smaller count can arrive after a
                // larger one already set `sent` ahead of it. Letting `sent`
                // move backwards here would re-write already-sent chunks.
                let count = (count as usize).max(sent);
                for i in sent..count {
                    let Some(chunk) = session.buffer().chunks.get(i) else {
                        break;
                    };
                    if tx.send(Ok(Bytes::copy_from_slice(&chunk.bytes))).await.is_err() {
                        return;
                    }
                }
                sent = count;

                if session.buffer().chunks.finished() && sent >= session.buffer().chunks.len() {
                    return;
                }
            }
        }
    }
}
