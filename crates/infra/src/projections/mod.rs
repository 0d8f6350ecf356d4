//! Read models built from domain events.

pub mod analytics;

pub use analytics::{
    loan_envelopes, request_envelopes, ActivityEntry, ActivityEvent, ActivityKind,
    AnalyticsProjection, SupplyUsage, UserActivity,
};
