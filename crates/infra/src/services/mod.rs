//! Application services.
//!
//! [`SupplyDesk`] orchestrates the domain aggregates over a
//! [`SupplyDeskStore`]: it loads records, runs commands through
//! `supplydesk_events::execute`, turns the resulting events into ledger
//! lines, notifications and analytics updates, and commits everything one
//! operation touched as a single [`Changeset`].

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use supplydesk_auth::{Principal, Role, User};
use supplydesk_borrowing::{BorrowedItem, SupplyRequest};
use supplydesk_core::{BorrowedItemId, DomainError, ExpectedVersion, RequestId, SupplyId, UserId};
use supplydesk_events::{execute, EventEnvelope, Projection};
use supplydesk_inventory::{
    low_stock_alert, InventoryTransaction, StockMovement, Supply, SupplyCommand, SupplyEvent,
};
use supplydesk_notifications::{plan_delivery, Notification, NotificationLevel};

use crate::config::BorrowingConfig;
use crate::media::{MediaError, MediaStore};
use crate::projections::{ActivityEvent, AnalyticsProjection};
use crate::reports::ReportError;
use crate::store::{Changeset, StoreError, SupplyDeskStore};

mod alerts;
mod catalog;
mod loans;
mod requests;
mod scan;
mod users;

#[cfg(test)]
mod tests;

pub use alerts::{LowStockLine, LowStockReport, SweepReport};
pub use catalog::{NewSupply, SupplyQuery};
pub use loans::{LoanQuery, LoanStatusFilter, LoanView, ReturnResult};
pub use requests::{BorrowAction, BorrowApproval, BorrowLine, Eligibility, NewBorrowRequest, NewRequest, ReleaseOutcome};
pub use scan::{ScanOutcome, ScanRequest};
pub use users::NewUser;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The SupplyDesk application service.
pub struct SupplyDesk {
    store: Arc<dyn SupplyDeskStore>,
    media: MediaStore,
    borrowing: BorrowingConfig,
    analytics: RwLock<AnalyticsProjection>,
}

impl SupplyDesk {
    pub fn new(store: Arc<dyn SupplyDeskStore>, media: MediaStore, borrowing: BorrowingConfig) -> Self {
        Self {
            store,
            media,
            borrowing,
            analytics: RwLock::new(AnalyticsProjection::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SupplyDeskStore> {
        &self.store
    }

    pub fn borrowing_config(&self) -> &BorrowingConfig {
        &self.borrowing
    }

    // ─────────────────────────────────────────────────────────────────────
    // Analytics
    // ─────────────────────────────────────────────────────────────────────

    /// Read access to the analytics read model.
    pub fn analytics(&self) -> RwLockReadGuard<'_, AnalyticsProjection> {
        self.analytics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn analytics_mut(&self) -> RwLockWriteGuard<'_, AnalyticsProjection> {
        self.analytics.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the analytics read model with one rebuilt from stored records.
    pub async fn rebuild_analytics(&self) -> ServiceResult<usize> {
        let requests = self.store.list_requests(&Default::default()).await?;
        let loans = self.store.list_loans(&Default::default()).await?;
        let rebuilt = AnalyticsProjection::rebuild(&requests, &loans);
        let users = rebuilt.users().len();
        *self.analytics_mut() = rebuilt;
        tracing::info!(requests = requests.len(), loans = loans.len(), users, "analytics rebuilt");
        Ok(users)
    }

    /// Feed committed events to the analytics projection.
    fn publish(&self, envelopes: Vec<EventEnvelope<ActivityEvent>>) {
        if envelopes.is_empty() {
            return;
        }
        let mut analytics = self.analytics_mut();
        for env in &envelopes {
            analytics.apply(env);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared loaders
    // ─────────────────────────────────────────────────────────────────────

    async fn load_user(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))
    }

    async fn load_supply(&self, id: SupplyId) -> ServiceResult<Supply> {
        self.store
            .get_supply(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supply {id}")))
    }

    async fn load_request(&self, id: RequestId) -> ServiceResult<SupplyRequest> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("request {id}")))
    }

    async fn load_loan(&self, id: BorrowedItemId) -> ServiceResult<BorrowedItem> {
        self.store
            .get_loan(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("borrowed item {id}")))
    }

    async fn display_name(&self, id: UserId) -> ServiceResult<String> {
        Ok(self.load_user(id).await?.display_name().to_string())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stock side effects
    // ─────────────────────────────────────────────────────────────────────

    /// Latest state of a supply within `cs`, falling back to the store.
    async fn supply_in(&self, cs: &Changeset, id: SupplyId) -> ServiceResult<Supply> {
        match cs.pending_supply(id) {
            Some(s) => Ok(s.clone()),
            None => self.load_supply(id).await,
        }
    }

    /// Run a stock command and queue the supply write, ledger line and any
    /// low-stock notices.
    async fn move_stock(
        &self,
        cs: &mut Changeset,
        supply: &mut Supply,
        command: SupplyCommand,
        performed_by: UserId,
    ) -> ServiceResult<StockMovement> {
        let expected = ExpectedVersion::Exact(supply.version);
        let events = execute(supply, &command)?;
        let movement = events
            .iter()
            .find_map(SupplyEvent::stock_movement)
            .cloned()
            .ok_or_else(|| DomainError::invariant("stock command produced no movement"))?;
        cs.put_supply(supply.clone(), expected);
        self.record_movement(cs, supply, &movement, performed_by).await?;
        Ok(movement)
    }

    /// Ledger line plus low-stock candidates for one stock movement.
    async fn record_movement(
        &self,
        cs: &mut Changeset,
        supply: &Supply,
        movement: &StockMovement,
        performed_by: UserId,
    ) -> ServiceResult<()> {
        cs.transactions
            .push(InventoryTransaction::record(supply.id, movement, performed_by));

        if let Some(alert) = low_stock_alert(
            supply.name(),
            supply.details.min_stock_level,
            movement.previous_quantity,
            movement.new_quantity,
        ) {
            tracing::warn!(
                supply_id = %supply.id,
                supply = supply.name(),
                remaining = movement.new_quantity,
                min_stock_level = supply.details.min_stock_level,
                "low stock"
            );
            let staff = self.staff(true, true).await?;
            let candidates = staff
                .iter()
                .map(|u| {
                    Notification::new(u.id, &alert.title, &alert.message, NotificationLevel::Warning, movement.occurred_at)
                        .with_url(format!("/supplies/{}/", supply.id))
                })
                .collect();
            self.deliver(cs, candidates).await?;
        }
        Ok(())
    }

    /// Admin and/or GSO staff accounts that receive stock alerts.
    async fn staff(&self, admins: bool, gso: bool) -> ServiceResult<Vec<User>> {
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.is_active)
            .filter(|u| match u.role {
                Role::Admin => admins,
                Role::GsoStaff => gso,
                Role::DepartmentUser => false,
            })
            .collect())
    }

    /// Queue notifications that pass the unread-title dedup rule.
    ///
    /// Returns the number queued.
    async fn deliver(&self, cs: &mut Changeset, candidates: Vec<Notification>) -> ServiceResult<usize> {
        let mut recipients: Vec<UserId> = candidates.iter().map(|n| n.recipient).collect();
        recipients.sort();
        recipients.dedup();

        let mut existing: Vec<Notification> = cs.notifications.clone();
        for r in recipients {
            existing.extend(self.store.list_notifications(r, true).await?);
        }

        let offered = candidates.len();
        let planned = plan_delivery(&existing, candidates);
        if planned.len() < offered {
            debug!(skipped = offered - planned.len(), "duplicate unread notifications skipped");
        }
        let delivered = planned.len();
        cs.notifications.extend(planned);
        Ok(delivered)
    }

    pub async fn list_notifications(&self, user: UserId, unread_only: bool) -> ServiceResult<Vec<Notification>> {
        Ok(self.store.list_notifications(user, unread_only).await?)
    }

    pub async fn mark_all_notifications_read(&self, user: UserId) -> ServiceResult<u64> {
        Ok(self.store.mark_all_read(user).await?)
    }
}

/// Staff see everything; department users only their own records.
fn ensure_owner_or_staff(actor: &Principal, owner: UserId, what: &str) -> ServiceResult<()> {
    if actor.is_staff() || actor.user_id == owner {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!("{what} belongs to another user")))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
