//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend selection and the shared service
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices, Backend};

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: AppServices, jwt_secret: &str) -> Router {
    let jwt = Arc::new(supplydesk_auth::Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState {
        jwt,
        desk: services.desk.clone(),
    };

    // Protected routes: require a valid token and an enabled account.
    let protected = routes::router()
        .layer(Extension(services.desk.clone()))
        .layer(Extension(services.backend))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
