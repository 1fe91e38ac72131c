use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use roster_core::DomainError;
use roster_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    tracing::error!(error = %err, "ledger operation failed");
    match err {
        err if err.is_unavailable() => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", err.to_string())
        }
        LedgerError::Corrupt(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "corrupt_ledger", msg),
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", other.to_string()),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
