use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let by_lang = match services.ledger.count_by_lang().await {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    // Every record lands in exactly one language bucket.
    let count = by_lang.values().sum();

    (StatusCode::OK, Json(dto::StatsResponse::new(count, &by_lang))).into_response()
}
