//! The HTTP surface: directory listing, the live transcode stream, one-shot
//! subtitle extraction, and a health probe. Everything here is a thin
//! adaptor over [`crate::core`] — no transcode state lives in this module.

pub mod auth;
pub mod health;
pub mod listing;
pub mod paths;
pub mod state;
pub mod stream;
pub mod subs;

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Assemble the full router: a public `/health` route plus everything else
/// behind [`auth::require_bearer_token`].
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(listing::list_root))
        .route("/stream", get(stream::stream_handler))
        .route("/subs", get(subs::subs_handler))
        .route("/{*path}", get(listing::list_subpath))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    let public = Router::new().route("/health", get(health::health_check));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
