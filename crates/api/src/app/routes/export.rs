use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{StatusCode, header},
    response::IntoResponse,
};

use roster_infra::ExportFormat;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Download a consistent snapshot of the ledger as an attachment.
pub async fn export(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ExportQuery>,
) -> axum::response::Response {
    let format = ExportFormat::parse(query.format.as_deref());

    match services.ledger.export_snapshot(format).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, format.content_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", format.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
