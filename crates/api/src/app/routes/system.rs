use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::Backend;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(ctx): Extension<PrincipalContext>,
    Extension(backend): Extension<Backend>,
) -> impl IntoResponse {
    let user = ctx.user();
    Json(serde_json::json!({
        "user_id": ctx.user_id().to_string(),
        "username": user.username,
        "full_name": user.full_name,
        "department": user.department,
        "roles": ctx.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": ctx.principal().permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "store": backend.as_str(),
    }))
}
