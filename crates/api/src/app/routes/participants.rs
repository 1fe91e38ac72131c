use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use roster_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::notify::notify_best_effort;

pub fn router() -> Router {
    Router::new()
        .route("/", post(participate).delete(reset))
        .route("/recent", get(list_recent))
        .route("/:id/lang", get(get_lang).put(set_lang))
}

/// Record a participation, then confirm it to the user.
pub async fn participate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ParticipateRequest>,
) -> axum::response::Response {
    let event = match body.into_participation() {
        Ok(e) => e,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let user_id = event.user_id;
    let source = event.source.clone();

    if let Err(e) = services.ledger.upsert(event).await {
        return errors::ledger_error_to_response(e);
    }
    let lang = match services.ledger.get_lang(user_id).await {
        Ok(l) => l,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    tracing::debug!(user_id = %user_id, source = %source, "participation recorded");

    notify_best_effort(services.notifier.as_ref(), user_id, lang).await;

    (StatusCode::OK, Json(dto::LangResponse { user_id, lang })).into_response()
}

pub async fn get_lang(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match UserId::from_str(&id) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.get_lang(user_id).await {
        Ok(lang) => (StatusCode::OK, Json(dto::LangResponse { user_id, lang })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn set_lang(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetLangRequest>,
) -> axum::response::Response {
    let user_id = match UserId::from_str(&id) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.ledger.set_lang(user_id, &body.lang).await {
        return errors::ledger_error_to_response(e);
    }
    // Report the stored value, which may be the default if the code was unsupported.
    match services.ledger.get_lang(user_id).await {
        Ok(lang) => (StatusCode::OK, Json(dto::LangResponse { user_id, lang })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_recent(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::RecentQuery>,
) -> axum::response::Response {
    let limit = services.list_policy.parse(query.limit.as_deref());

    match services.ledger.list_recent(limit).await {
        Ok(items) => (
            StatusCode::OK,
            Json(dto::RecentResponse {
                limit: limit.get(),
                items,
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn reset(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.ledger.reset().await {
        Ok(()) => {
            tracing::warn!("participant ledger reset");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
