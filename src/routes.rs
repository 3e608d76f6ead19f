//! Router assembly.
//!
//! One POST endpoint carries every remote call; static files (when a
//! directory is configured) and a health probe ride alongside. CORS is wide
//! open — the envelope, not the origin, is the trust boundary.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::remote;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.static_dir.clone();

    let router = Router::new()
        .route("/remote", post(remote::remote_call))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
