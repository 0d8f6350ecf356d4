use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use supplydesk_infra::SupplyDesk;
use supplydesk_notifications::Notification;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::context::PrincipalContext;

/// Every authenticated user reads their own notifications.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/mark-all-read", post(mark_all_read))
}

pub async fn list_notifications(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::NotificationsQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(desk.list_notifications(ctx.user_id(), query.unread_only).await?))
}

pub async fn mark_all_read(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    let marked = desk.mark_all_notifications_read(ctx.user_id()).await?;
    Ok(Json(serde_json::json!({ "marked_read": marked })))
}
