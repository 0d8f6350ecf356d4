use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use supplydesk_auth::{Permission, User};
use supplydesk_core::UserId;
use supplydesk_infra::services::NewUser;
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/approve", post(review_user))
        .route("/:id/toggle-active", post(toggle_active))
}

pub async fn list_users(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<User>>> {
    require(&ctx, &[Permission::USERS_MANAGE])?;
    Ok(Json(desk.list_users().await?))
}

pub async fn create_user(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Json(body): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    require(&ctx, &[Permission::USERS_MANAGE])?;
    let user = desk.register_user(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    require(&ctx, &[Permission::USERS_MANAGE])?;
    let id: UserId = parse_id(&id)?;
    Ok(Json(desk.get_user(id).await?))
}

pub async fn review_user(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReviewUserRequest>>,
) -> ApiResult<Json<User>> {
    require(&ctx, &[Permission::USERS_MANAGE])?;
    let id: UserId = parse_id(&id)?;
    let approve = body.map(|Json(b)| b.approve).unwrap_or(true);
    Ok(Json(desk.review_user(id, approve).await?))
}

pub async fn toggle_active(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    require(&ctx, &[Permission::USERS_MANAGE])?;
    let id: UserId = parse_id(&id)?;
    Ok(Json(desk.toggle_user_active(ctx.user_id(), id).await?))
}
