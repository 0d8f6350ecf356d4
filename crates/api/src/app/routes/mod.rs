use axum::{routing::get, Router};

pub mod admin;
pub mod analytics;
pub mod borrow;
pub mod catalog;
pub mod loans;
pub mod notifications;
pub mod reports;
pub mod requests;
pub mod scan;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(catalog::router())
        .nest("/users", users::router())
        .nest("/requests", requests::router())
        .nest("/borrow", borrow::router())
        .nest("/loans", loans::router())
        .nest("/scan", scan::router())
        .nest("/notifications", notifications::router())
        .nest("/reports", reports::router())
        .nest("/analytics", analytics::router())
        .nest("/admin", admin::router())
}
