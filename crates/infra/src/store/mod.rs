//! Persistence boundary.
//!
//! Reads go through typed getters/listings. Writes are grouped into a
//! [`Changeset`] and applied atomically by [`SupplyDeskStore::commit`]: every
//! versioned record is checked against the version it was loaded at, so two
//! concurrent stock changes cannot silently overwrite each other.

use async_trait::async_trait;
use thiserror::Error;

use supplydesk_auth::User;
use supplydesk_borrowing::{BorrowedItem, QrScanLog, RequestStatus, SupplyRequest};
use supplydesk_core::{
    BorrowedItemId, CategoryId, ExpectedVersion, RequestId, SupplyId, UserId,
};
use supplydesk_inventory::{Category, InventoryTransaction, Supply};
use supplydesk_notifications::Notification;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency or uniqueness failure.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A record to write, with the version it had when it was loaded.
///
/// New records use `ExpectedVersion::Exact(0)` ("must not exist yet").
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub expected: ExpectedVersion,
}

impl<T> Versioned<T> {
    pub fn new(record: T, expected: ExpectedVersion) -> Self {
        Self { record, expected }
    }

    pub fn insert(record: T) -> Self {
        Self::new(record, ExpectedVersion::Exact(0))
    }
}

/// All writes of one logical operation.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub supplies: Vec<Versioned<Supply>>,
    pub requests: Vec<Versioned<SupplyRequest>>,
    pub loans: Vec<Versioned<BorrowedItem>>,
    pub deleted_loans: Vec<(BorrowedItemId, ExpectedVersion)>,
    pub transactions: Vec<InventoryTransaction>,
    pub notifications: Vec<Notification>,
    pub scan_logs: Vec<QrScanLog>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.supplies.is_empty()
            && self.requests.is_empty()
            && self.loans.is_empty()
            && self.deleted_loans.is_empty()
            && self.transactions.is_empty()
            && self.notifications.is_empty()
            && self.scan_logs.is_empty()
    }

    /// Replace any pending write of the same supply, keeping the earliest
    /// expected version.
    pub fn put_supply(&mut self, supply: Supply, expected: ExpectedVersion) {
        match self.supplies.iter_mut().find(|v| v.record.id == supply.id) {
            Some(existing) => existing.record = supply,
            None => self.supplies.push(Versioned::new(supply, expected)),
        }
    }

    /// Latest pending state of a supply in this changeset.
    pub fn pending_supply(&self, id: SupplyId) -> Option<&Supply> {
        self.supplies.iter().find(|v| v.record.id == id).map(|v| &v.record)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub requester: Option<UserId>,
    pub status: Option<RequestStatus>,
    pub supply: Option<SupplyId>,
}

#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub borrower: Option<UserId>,
    pub supply: Option<SupplyId>,
    /// `Some(false)`: still out; `Some(true)`: returned.
    pub returned: Option<bool>,
}

impl LoanFilter {
    pub fn matches(&self, item: &BorrowedItem) -> bool {
        self.borrower.is_none_or(|b| item.borrower == b)
            && self.supply.is_none_or(|s| item.supply_id == s)
            && self.returned.is_none_or(|r| item.is_returned() == r)
    }
}

impl RequestFilter {
    pub fn matches(&self, r: &SupplyRequest) -> bool {
        self.requester.is_none_or(|u| r.requester == u)
            && self.status.is_none_or(|s| r.status == s)
            && self.supply.is_none_or(|s| r.supply_id == s)
    }
}

/// Storage backend for SupplyDesk records.
///
/// Listings are ordered newest first unless stated otherwise.
#[async_trait]
pub trait SupplyDeskStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
    /// Ordered by username.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    /// Ordered by name.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn save_category(&self, category: &Category) -> StoreResult<()>;
    /// Fails with `Conflict` while supplies still reference the category.
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    async fn get_supply(&self, id: SupplyId) -> StoreResult<Option<Supply>>;
    /// Ordered by name.
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>>;
    /// Removes the supply with its requests, loans, ledger lines and scan logs.
    async fn delete_supply(&self, id: SupplyId) -> StoreResult<()>;

    async fn get_request(&self, id: RequestId) -> StoreResult<Option<SupplyRequest>>;
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<SupplyRequest>>;

    async fn get_loan(&self, id: BorrowedItemId) -> StoreResult<Option<BorrowedItem>>;
    async fn list_loans(&self, filter: &LoanFilter) -> StoreResult<Vec<BorrowedItem>>;

    async fn list_transactions(&self, supply: Option<SupplyId>) -> StoreResult<Vec<InventoryTransaction>>;

    async fn list_notifications(&self, recipient: UserId, unread_only: bool) -> StoreResult<Vec<Notification>>;
    /// Returns the number of notifications flipped to read.
    async fn mark_all_read(&self, recipient: UserId) -> StoreResult<u64>;

    async fn recent_scans(&self, limit: usize) -> StoreResult<Vec<QrScanLog>>;

    /// Apply all writes atomically, or none of them.
    async fn commit(&self, changes: Changeset) -> StoreResult<()>;
}
