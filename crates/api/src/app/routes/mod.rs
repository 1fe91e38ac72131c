use axum::{Router, routing::get};

pub mod export;
pub mod participants;
pub mod stats;
pub mod system;

/// Router for every ledger endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/participants", participants::router())
        .route("/stats", get(stats::stats))
        .route("/export", get(export::export))
}
