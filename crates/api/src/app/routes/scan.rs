use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use supplydesk_auth::Permission;
use supplydesk_borrowing::QrScanLog;
use supplydesk_infra::services::{ScanOutcome, ScanRequest};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(process_scan))
        .route("/recent", get(recent_scans))
}

pub async fn process_scan(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<ScanRequest>,
) -> ApiResult<Json<ScanOutcome>> {
    require(&ctx, &[Permission::SCAN_PROCESS])?;
    Ok(Json(desk.process_scan(ctx.user_id(), body).await?))
}

pub async fn recent_scans(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::LimitQuery>,
) -> ApiResult<Json<Vec<QrScanLog>>> {
    require(&ctx, &[Permission::SCAN_PROCESS])?;
    Ok(Json(desk.recent_scans(query.limit).await?))
}
