//! Infrastructure layer: configuration, storage backends, QR media,
//! application services, analytics projection, reports and background jobs.

pub mod config;
pub mod jobs;
pub mod media;
pub mod projections;
pub mod reports;
pub mod services;
pub mod store;

pub use services::{ServiceError, ServiceResult, SupplyDesk};
