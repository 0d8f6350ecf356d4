use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use supplydesk_auth::JwtValidator;
use supplydesk_infra::SupplyDesk;

use crate::app::errors::{self, json_error};
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub desk: Arc<SupplyDesk>,
}

/// Verify the bearer token, resolve the caller's directory record and
/// reject accounts that are not approved or have been deactivated.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(t) => t,
        Err(status) => return json_error(status, "unauthorized", "missing bearer token"),
    };

    let claims = match state.jwt.validate(token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "token rejected");
            return json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string());
        }
    };

    let user = match state.desk.resolve_token_user(claims.sub, &claims.roles).await {
        Ok(u) => u,
        Err(e) => return errors::ApiError::from(e).into_response(),
    };
    if !user.can_sign_in() {
        warn!(user_id = %user.id, status = user.approval_status.as_str(), active = user.is_active, "access denied");
        let message = if user.is_active {
            format!("account is {}", user.approval_status.as_str())
        } else {
            "account is inactive".to_string()
        };
        return json_error(StatusCode::FORBIDDEN, "account_disabled", message);
    }

    req.extensions_mut().insert(PrincipalContext::new(user));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
