use serde::Deserialize;

use supplydesk_borrowing::RequestStatus;
use supplydesk_core::{BorrowedItemId, SupplyId};
use supplydesk_infra::services::BorrowLine;

use crate::app::errors::{ApiError, ApiResult};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReviewUserRequest {
    /// `false` rejects the account.
    #[serde(default = "default_true")]
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_material: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BorrowBatchRequest {
    pub lines: Vec<BorrowLine>,
    pub purpose: String,
    pub duration_days: Option<u32>,
    pub requested_location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnLoanRequest {
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoanNoteRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<BorrowedItemId>,
}

#[derive(Debug, Deserialize)]
pub struct LowStockSweepRequest {
    #[serde(default = "default_true")]
    pub notify_admins: bool,
    #[serde(default = "default_true")]
    pub notify_gso: bool,
}

impl Default for LowStockSweepRequest {
    fn default() -> Self {
        Self {
            notify_admins: true,
            notify_gso: true,
        }
    }
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<String>,
    pub supply: Option<SupplyId>,
}

impl RequestListQuery {
    pub fn status(&self) -> ApiResult<Option<RequestStatus>> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => RequestStatus::parse(s).map(Some).ok_or_else(|| {
                ApiError::bad_request(
                    "invalid_status",
                    "status must be one of: pending, approved, released, rejected",
                )
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    20
}
