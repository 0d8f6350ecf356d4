//! Operator triggers for the periodic jobs.

use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;

use supplydesk_auth::Permission;
use supplydesk_infra::services::{LowStockReport, SweepReport};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/sweeps/overdue", post(sweep_overdue))
        .route("/sweeps/low-stock", post(sweep_low_stock))
        .route("/analytics/rebuild", post(rebuild_analytics))
}

pub async fn sweep_overdue(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<SweepReport>> {
    require(&ctx, &[Permission::ADMIN_JOBS])?;
    Ok(Json(desk.sweep_overdue(Utc::now().date_naive()).await?))
}

/// Both recipient groups are notified unless the body says otherwise.
pub async fn sweep_low_stock(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    body: Option<Json<dto::LowStockSweepRequest>>,
) -> ApiResult<Json<LowStockReport>> {
    require(&ctx, &[Permission::ADMIN_JOBS])?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(desk.check_low_stock(body.notify_admins, body.notify_gso).await?))
}

pub async fn rebuild_analytics(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::ADMIN_JOBS])?;
    let users = desk.rebuild_analytics().await?;
    Ok(Json(serde_json::json!({ "users": users })))
}
