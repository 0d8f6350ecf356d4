use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use supplydesk_auth::Permission;
use supplydesk_infra::reports::Report;
use supplydesk_infra::SupplyDesk;

use crate::app::errors::{ApiError, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/:file", get(export))
}

/// `GET /reports/{supplies,requests,transactions}.csv`
pub async fn export(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(file): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::REPORTS_EXPORT])?;
    let report = file
        .strip_suffix(".csv")
        .and_then(Report::parse)
        .ok_or_else(|| ApiError::not_found(format!("report {file} not found")))?;
    let body = desk.export_csv(report).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name()),
            ),
        ],
        body,
    ))
}
