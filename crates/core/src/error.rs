//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only; storage and media errors live in
/// `supplydesk-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (empty name, zero quantity, bad QR payload).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A rule of the current state was broken (insufficient stock, releasing an
    /// unapproved request).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier did not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record has never been created.
    #[error("not found")]
    NotFound,

    /// Stale version on write, or a duplicate unique key.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    /// The borrower still holds overdue items.
    #[error("borrowing blocked: {overdue} overdue item(s) must be returned first")]
    BorrowingBlocked { overdue: usize },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_message_names_the_overdue_count() {
        let err = DomainError::BorrowingBlocked { overdue: 2 };
        assert_eq!(
            err.to_string(),
            "borrowing blocked: 2 overdue item(s) must be returned first"
        );
    }
}
