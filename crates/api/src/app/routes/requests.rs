use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use supplydesk_auth::Permission;
use supplydesk_borrowing::SupplyRequest;
use supplydesk_core::RequestId;
use supplydesk_infra::services::{NewRequest, ReleaseOutcome};
use supplydesk_infra::store::RequestFilter;
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_requests).post(submit_request))
        .route("/:id", get(get_request))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
        .route("/:id/release", post(release_request))
        .route("/:id/qr", post(generate_qr))
}

pub async fn list_requests(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::RequestListQuery>,
) -> ApiResult<Json<Vec<SupplyRequest>>> {
    require(&ctx, &[Permission::REQUESTS_READ])?;
    let filter = RequestFilter {
        requester: None,
        status: query.status()?,
        supply: query.supply,
    };
    Ok(Json(desk.list_requests(ctx.principal(), filter).await?))
}

pub async fn submit_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<NewRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::REQUESTS_CREATE])?;
    let request = desk.submit_request(ctx.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SupplyRequest>> {
    require(&ctx, &[Permission::REQUESTS_READ])?;
    let id: RequestId = parse_id(&id)?;
    Ok(Json(desk.get_request(ctx.principal(), id).await?))
}

pub async fn approve_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SupplyRequest>> {
    require(&ctx, &[Permission::REQUESTS_REVIEW])?;
    let id: RequestId = parse_id(&id)?;
    Ok(Json(desk.approve_request(ctx.user_id(), id).await?))
}

pub async fn reject_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RejectRequest>>,
) -> ApiResult<Json<SupplyRequest>> {
    require(&ctx, &[Permission::REQUESTS_REVIEW])?;
    let id: RequestId = parse_id(&id)?;
    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    Ok(Json(desk.reject_request(ctx.user_id(), id, &reason).await?))
}

pub async fn release_request(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReleaseOutcome>> {
    require(&ctx, &[Permission::REQUESTS_REVIEW])?;
    let id: RequestId = parse_id(&id)?;
    Ok(Json(desk.release_request(ctx.user_id(), id).await?))
}

/// Re-render the borrowing slip QR of a request.
pub async fn generate_qr(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::REQUESTS_REVIEW])?;
    let id: RequestId = parse_id(&id)?;
    let qr = desk.generate_borrowing_qr(id).await?;
    Ok(Json(serde_json::json!({
        "payload": qr.payload,
        "path": qr.relative_path,
    })))
}
