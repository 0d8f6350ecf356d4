//! HTTP API: server wiring, authentication, routing and response mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
