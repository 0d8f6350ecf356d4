use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use supplydesk_auth::Permission;
use supplydesk_borrowing::BorrowedItem;
use supplydesk_core::BorrowedItemId;
use supplydesk_infra::services::{LoanQuery, LoanView, ReturnResult};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_loans))
        .route("/bulk-delete", post(bulk_delete))
        .route("/:id", get(get_loan))
        .route("/:id/return", post(return_loan))
        .route("/:id/notes", post(add_note))
}

/// Staff see every loan; department users only their own.
pub async fn list_loans(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<LoanQuery>,
) -> ApiResult<Json<Vec<LoanView>>> {
    require(&ctx, &[Permission::LOANS_READ])?;
    Ok(Json(desk.list_loans(ctx.principal(), &query).await?))
}

pub async fn get_loan(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<LoanView>> {
    require(&ctx, &[Permission::LOANS_READ])?;
    let id: BorrowedItemId = parse_id(&id)?;
    Ok(Json(desk.get_loan(ctx.principal(), id).await?))
}

pub async fn return_loan(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReturnLoanRequest>>,
) -> ApiResult<Json<ReturnResult>> {
    require(&ctx, &[Permission::LOANS_MANAGE])?;
    let id: BorrowedItemId = parse_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(desk.return_loan(ctx.user_id(), id, body.location, body.notes).await?))
}

pub async fn add_note(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LoanNoteRequest>,
) -> ApiResult<Json<BorrowedItem>> {
    require(&ctx, &[Permission::LOANS_MANAGE])?;
    let id: BorrowedItemId = parse_id(&id)?;
    Ok(Json(desk.add_loan_note(ctx.user_id(), id, &body.text).await?))
}

pub async fn bulk_delete(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<dto::BulkDeleteRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::LOANS_MANAGE])?;
    let deleted = desk.bulk_delete_loans(ctx.user_id(), &body.ids).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
