//! Borrowed items: listing, returns, staff notes and bulk delete.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use supplydesk_auth::Principal;
use supplydesk_borrowing::{
    due_status, AddLoanNote, BorrowedItem, DueStatus, LoanCommand, LoanEvent, ReturnLoan, ReturnOutcome,
};
use supplydesk_core::{BorrowedItemId, ExpectedVersion, SupplyId, UserId};
use supplydesk_events::execute;
use supplydesk_inventory::{ReceiveStock, Supply, SupplyCommand};

use super::{ensure_owner_or_staff, now, ServiceResult, SupplyDesk};
use crate::projections::loan_envelopes;
use crate::store::{Changeset, LoanFilter, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatusFilter {
    Returned,
    Borrowed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanQuery {
    pub status: Option<LoanStatusFilter>,
    /// Matches supply name, borrower, locations and notes.
    pub search: Option<String>,
    pub supply: Option<SupplyId>,
    pub borrower: Option<UserId>,
}

/// A loan with its display fields resolved.
#[derive(Debug, Clone, Serialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub item: BorrowedItem,
    pub supply_name: String,
    pub borrower_name: String,
    pub due_status: DueStatus,
    pub days_until_due: Option<i64>,
    pub is_overdue: bool,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnResult {
    pub outcome: ReturnOutcome,
    pub item: BorrowedItem,
    pub supply: Supply,
}

impl SupplyDesk {
    pub async fn list_loans(&self, actor: &Principal, query: &LoanQuery) -> ServiceResult<Vec<LoanView>> {
        let filter = LoanFilter {
            borrower: if actor.is_staff() { query.borrower } else { Some(actor.user_id) },
            supply: query.supply,
            returned: query.status.map(|s| s == LoanStatusFilter::Returned),
        };
        let items = self.store.list_loans(&filter).await?;
        let views = self.views(items).await?;

        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        Ok(match needle {
            None => views,
            Some(q) => views.into_iter().filter(|v| v.matches(&q)).collect(),
        })
    }

    pub async fn get_loan(&self, actor: &Principal, id: BorrowedItemId) -> ServiceResult<LoanView> {
        let item = self.load_loan(id).await?;
        ensure_owner_or_staff(actor, item.borrower, "borrowed item")?;
        let mut views = self.views(vec![item]).await?;
        views
            .pop()
            .ok_or_else(|| super::ServiceError::NotFound(format!("borrowed item {id}")))
    }

    async fn views(&self, items: Vec<BorrowedItem>) -> ServiceResult<Vec<LoanView>> {
        let supplies: HashMap<SupplyId, String> = self
            .store
            .list_supplies()
            .await?
            .into_iter()
            .map(|s| (s.id, s.details.name))
            .collect();
        let users: HashMap<UserId, String> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name().to_string()))
            .collect();

        let at = now();
        let today = at.date_naive();
        let threshold = self.borrowing.due_soon_threshold_days;
        Ok(items
            .into_iter()
            .map(|item| LoanView {
                supply_name: supplies.get(&item.supply_id).cloned().unwrap_or_default(),
                borrower_name: users.get(&item.borrower).cloned().unwrap_or_default(),
                due_status: due_status(&item, today, threshold),
                days_until_due: item.days_until_due(today),
                is_overdue: item.is_overdue(today),
                duration: item.duration_display(at),
                item,
            })
            .collect())
    }

    /// Return a loan. Returning twice is reported, not an error, and never
    /// credits stock a second time.
    pub async fn return_loan(
        &self,
        actor: UserId,
        id: BorrowedItemId,
        location: Option<String>,
        notes: Option<String>,
    ) -> ServiceResult<ReturnResult> {
        let mut item = self.load_loan(id).await?;
        let mut cs = Changeset::new();
        let (outcome, supply, events) = self
            .return_into(&mut cs, &mut item, actor, now(), location, notes, |item| {
                format!("Returned borrowed item (ID: {})", item.id)
            })
            .await?;
        self.store.commit(cs).await?;
        self.publish(loan_envelopes(&item, Some(actor), events));
        if let ReturnOutcome::Returned { quantity } = outcome {
            info!(item_id = %id, quantity, "borrowed item returned");
        } else {
            info!(item_id = %id, "borrowed item was already returned");
        }
        Ok(ReturnResult { outcome, item, supply })
    }

    /// Shared by the staff return action and the QR return scan.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn return_into(
        &self,
        cs: &mut Changeset,
        item: &mut BorrowedItem,
        actor: UserId,
        at: DateTime<Utc>,
        location: Option<String>,
        notes: Option<String>,
        ledger_reason: impl FnOnce(&BorrowedItem) -> String,
    ) -> ServiceResult<(ReturnOutcome, Supply, Vec<LoanEvent>)> {
        let expected = item.version;
        let events = execute(
            item,
            &LoanCommand::Return(ReturnLoan {
                location: location.filter(|l| !l.trim().is_empty()),
                notes: notes.filter(|n| !n.trim().is_empty()),
                occurred_at: at,
            }),
        )?;
        let outcome = ReturnOutcome::from_events(&events);
        let mut supply = self.supply_in(cs, item.supply_id).await?;

        if let ReturnOutcome::Returned { quantity } = outcome {
            self.move_stock(
                cs,
                &mut supply,
                SupplyCommand::Receive(ReceiveStock {
                    quantity,
                    reason: ledger_reason(item),
                    occurred_at: at,
                }),
                actor,
            )
            .await?;
            cs.loans
                .push(Versioned::new(item.clone(), ExpectedVersion::Exact(expected)));
        }
        Ok((outcome, supply, events))
    }

    pub async fn add_loan_note(&self, actor: UserId, id: BorrowedItemId, text: &str) -> ServiceResult<BorrowedItem> {
        let author = self.display_name(actor).await?;
        let mut item = self.load_loan(id).await?;
        let expected = item.version;
        let events = execute(
            &mut item,
            &LoanCommand::AddNote(AddLoanNote {
                author,
                text: text.to_string(),
                occurred_at: now(),
            }),
        )?;
        let mut cs = Changeset::new();
        cs.loans
            .push(Versioned::new(item.clone(), ExpectedVersion::Exact(expected)));
        self.store.commit(cs).await?;
        self.publish(loan_envelopes(&item, Some(actor), events));
        Ok(item)
    }

    /// Delete loan records; items still out are credited back to stock first.
    ///
    /// Unknown ids are ignored. Returns the number deleted.
    pub async fn bulk_delete_loans(&self, actor: UserId, ids: &[BorrowedItemId]) -> ServiceResult<usize> {
        let at = now();
        let mut cs = Changeset::new();
        for id in ids {
            let Some(item) = self.store.get_loan(*id).await? else {
                continue;
            };
            if cs.deleted_loans.iter().any(|(d, _)| d == id) {
                continue;
            }
            if !item.is_returned() {
                let mut supply = self.supply_in(&cs, item.supply_id).await?;
                self.move_stock(
                    &mut cs,
                    &mut supply,
                    SupplyCommand::Receive(ReceiveStock {
                        quantity: item.quantity,
                        reason: format!("Borrowed item (ID: {}) deleted/removed", item.id),
                        occurred_at: at,
                    }),
                    actor,
                )
                .await?;
            }
            cs.deleted_loans.push((item.id, ExpectedVersion::Exact(item.version)));
        }
        let deleted = cs.deleted_loans.len();
        self.store.commit(cs).await?;
        info!(deleted, "borrowed items deleted");
        Ok(deleted)
    }
}

impl LoanView {
    fn matches(&self, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(&self.supply_name)
            || hit(&self.borrower_name)
            || hit(&self.item.location_when_borrowed)
            || self.item.location_when_returned.as_deref().is_some_and(hit)
            || self.item.notes.as_deref().is_some_and(hit)
    }
}
