use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use supplydesk_auth::Permission;
use supplydesk_core::UserId;
use supplydesk_infra::projections::{ActivityEntry, SupplyUsage, UserActivity};
use supplydesk_infra::SupplyDesk;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_user_activity))
        .route("/users/:id", get(get_user_activity))
        .route("/most-requested", get(most_requested))
}

#[derive(Debug, Serialize)]
pub struct UserActivityDetail {
    pub summary: UserActivity,
    pub recent_activity: Vec<ActivityEntry>,
}

pub async fn list_user_activity(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<UserActivity>>> {
    require(&ctx, &[Permission::ANALYTICS_READ])?;
    Ok(Json(desk.analytics().users()))
}

pub async fn get_user_activity(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> ApiResult<Json<UserActivityDetail>> {
    require(&ctx, &[Permission::ANALYTICS_READ])?;
    let id: UserId = parse_id(&id)?;
    let analytics = desk.analytics();
    let summary = analytics
        .user(id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("no activity recorded for user {id}")))?;
    Ok(Json(UserActivityDetail {
        summary,
        recent_activity: analytics.activity_for(id, query.limit),
    }))
}

pub async fn most_requested(
    Extension(desk): Extension<Arc<SupplyDesk>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::LimitQuery>,
) -> ApiResult<Json<Vec<SupplyUsage>>> {
    require(&ctx, &[Permission::ANALYTICS_READ])?;
    Ok(Json(desk.analytics().most_requested(query.limit)))
}
