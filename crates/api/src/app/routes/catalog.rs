//! Categories, supplies, stock operations and the stock ledger.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use supplydesk_auth::Permission;
use supplydesk_core::{CategoryId, SupplyId};
use supplydesk_inventory::{Category, InventoryTransaction, Supply, SupplyDetails};
use supplydesk_infra::services::{NewSupply, SupplyQuery};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route("/supplies", get(list_supplies).post(create_supply))
        .route(
            "/supplies/:id",
            get(get_supply).put(update_supply).delete(delete_supply),
        )
        .route("/supplies/:id/restock", post(restock))
        .route("/supplies/:id/adjust", post(adjust_stock))
        .route("/supplies/:id/qr", post(generate_qr))
        .route("/supplies/:id/transactions", get(supply_transactions))
        .route("/transactions", get(all_transactions))
}

// ── categories ──────────────────────────────────────────────────────────

pub async fn list_categories(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<Category>>> {
    require(&ctx, &[Permission::CATALOG_READ])?;
    Ok(Json(desk.list_categories().await?))
}

pub async fn create_category(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<dto::CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let category = desk
        .create_category(&body.name, &body.description, body.is_material)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CategoryRequest>,
) -> ApiResult<Json<Category>> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let id: CategoryId = parse_id(&id)?;
    let category = desk
        .update_category(id, &body.name, &body.description, body.is_material)
        .await?;
    Ok(Json(category))
}

pub async fn delete_category(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let id: CategoryId = parse_id(&id)?;
    desk.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── supplies ────────────────────────────────────────────────────────────

pub async fn list_supplies(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<SupplyQuery>,
) -> ApiResult<Json<Vec<Supply>>> {
    require(&ctx, &[Permission::CATALOG_READ])?;
    Ok(Json(desk.list_supplies(&query).await?))
}

pub async fn create_supply(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<NewSupply>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let supply = desk.create_supply(ctx.user_id(), body).await?;
    Ok((StatusCode::CREATED, Json(supply)))
}

pub async fn get_supply(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::CATALOG_READ])?;
    let id: SupplyId = parse_id(&id)?;
    let supply = desk.get_supply(id).await?;
    Ok(Json(serde_json::json!({
        "stock_status": supply.stock_status(),
        "is_low_stock": supply.is_low_stock(),
        "total_value_cents": supply.total_value_cents(),
        "supply": supply,
    })))
}

pub async fn update_supply(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SupplyDetails>,
) -> ApiResult<Json<Supply>> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let id: SupplyId = parse_id(&id)?;
    Ok(Json(desk.update_supply(id, body).await?))
}

pub async fn delete_supply(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let id: SupplyId = parse_id(&id)?;
    desk.delete_supply(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restock(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> ApiResult<Json<Supply>> {
    require(&ctx, &[Permission::STOCK_MANAGE])?;
    let id: SupplyId = parse_id(&id)?;
    Ok(Json(desk.restock(ctx.user_id(), id, body.quantity, body.reason).await?))
}

pub async fn adjust_stock(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> ApiResult<Json<Supply>> {
    require(&ctx, &[Permission::STOCK_MANAGE])?;
    let id: SupplyId = parse_id(&id)?;
    Ok(Json(desk.adjust_stock(ctx.user_id(), id, body.delta, &body.reason).await?))
}

pub async fn generate_qr(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::CATALOG_MANAGE])?;
    let id: SupplyId = parse_id(&id)?;
    let qr = desk.generate_supply_qr(id).await?;
    Ok(Json(serde_json::json!({
        "payload": qr.payload,
        "path": qr.relative_path,
    })))
}

pub async fn supply_transactions(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<InventoryTransaction>>> {
    require(&ctx, &[Permission::CATALOG_READ])?;
    let id: SupplyId = parse_id(&id)?;
    // 404 for unknown supplies rather than an empty ledger
    desk.get_supply(id).await?;
    Ok(Json(desk.list_transactions(Some(id)).await?))
}

pub async fn all_transactions(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<InventoryTransaction>>> {
    require(&ctx, &[Permission::CATALOG_READ])?;
    Ok(Json(desk.list_transactions(None).await?))
}
