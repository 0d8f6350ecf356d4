//! Borrow requests from department users and their staff approval.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use supplydesk_auth::Permission;
use supplydesk_core::RequestId;
use supplydesk_infra::services::{BorrowApproval, Eligibility, NewBorrowRequest, ReleaseOutcome};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/requests", post(submit_borrow_request))
        .route("/requests/batch", post(submit_batch))
        .route("/requests/:id/approve", post(approve_borrow))
        .route("/eligibility", get(eligibility))
}

pub async fn submit_borrow_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<NewBorrowRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::BORROW_REQUEST])?;
    let request = desk.submit_borrow_request(ctx.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn submit_batch(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<dto::BorrowBatchRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::BORROW_REQUEST])?;
    let created = desk
        .submit_borrow_batch(
            ctx.principal(),
            &body.lines,
            &body.purpose,
            body.duration_days,
            body.requested_location,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn eligibility(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<Eligibility>> {
    require(&ctx, &[Permission::BORROW_REQUEST])?;
    Ok(Json(desk.borrow_eligibility(ctx.user_id()).await?))
}

/// `action = approve` only approves; `create` (the default) also releases
/// the item and opens the loan.
pub async fn approve_borrow(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(decision): Json<BorrowApproval>,
) -> ApiResult<Json<ReleaseOutcome>> {
    require(&ctx, &[Permission::REQUESTS_REVIEW])?;
    let id: RequestId = parse_id(&id)?;
    Ok(Json(desk.approve_borrow(ctx.user_id(), id, decision).await?))
}
