use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use supplydesk_auth::User;
use supplydesk_borrowing::{BorrowedItem, QrScanLog, SupplyRequest};
use supplydesk_core::{BorrowedItemId, CategoryId, ExpectedVersion, RequestId, SupplyId, UserId};
use supplydesk_inventory::{Category, InventoryTransaction, Supply};
use supplydesk_notifications::Notification;

use super::{Changeset, LoanFilter, RequestFilter, StoreError, StoreResult, SupplyDeskStore};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: HashMap<UserId, User>,
    categories: HashMap<CategoryId, Category>,
    supplies: HashMap<SupplyId, Supply>,
    requests: HashMap<RequestId, SupplyRequest>,
    loans: HashMap<BorrowedItemId, BorrowedItem>,
    transactions: Vec<InventoryTransaction>,
    notifications: Vec<Notification>,
    scan_logs: Vec<QrScanLog>,
}

/// In-memory store for tests/dev.
///
/// A changeset is validated against a snapshot and swapped in under a single
/// write lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn check(kind: &str, id: impl core::fmt::Display, expected: ExpectedVersion, actual: u64) -> StoreResult<()> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "{kind} {id} was modified concurrently (expected {expected:?}, found {actual})"
        )))
    }
}

fn newest_first<T, K: Ord>(mut v: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    v.sort_by(|a, b| key(b).cmp(&key(a)));
    v
}

#[async_trait]
impl SupplyDeskStore for InMemoryStore {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if t
            .users
            .values()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(StoreError::Conflict(format!("username '{}' is taken", user.username)));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut cats: Vec<Category> = self.read()?.categories.values().cloned().collect();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    async fn save_category(&self, category: &Category) -> StoreResult<()> {
        self.write()?.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.supplies.values().any(|s| s.details.category_id == Some(id)) {
            return Err(StoreError::Conflict(
                "category still has supplies assigned".to_string(),
            ));
        }
        t.categories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))
    }

    async fn get_supply(&self, id: SupplyId) -> StoreResult<Option<Supply>> {
        Ok(self.read()?.supplies.get(&id).cloned())
    }

    async fn list_supplies(&self) -> StoreResult<Vec<Supply>> {
        let mut supplies: Vec<Supply> = self.read()?.supplies.values().cloned().collect();
        supplies.sort_by(|a, b| a.details.name.cmp(&b.details.name));
        Ok(supplies)
    }

    async fn delete_supply(&self, id: SupplyId) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.supplies.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("supply {id}")));
        }
        t.requests.retain(|_, r| r.supply_id != id);
        t.loans.retain(|_, l| l.supply_id != id);
        t.transactions.retain(|tx| tx.supply_id != id);
        t.scan_logs.retain(|s| s.supply_id != id);
        Ok(())
    }

    async fn get_request(&self, id: RequestId) -> StoreResult<Option<SupplyRequest>> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<SupplyRequest>> {
        let rows = self
            .read()?
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(newest_first(rows, |r: &SupplyRequest| r.created_at))
    }

    async fn get_loan(&self, id: BorrowedItemId) -> StoreResult<Option<BorrowedItem>> {
        Ok(self.read()?.loans.get(&id).cloned())
    }

    async fn list_loans(&self, filter: &LoanFilter) -> StoreResult<Vec<BorrowedItem>> {
        let rows = self
            .read()?
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        Ok(newest_first(rows, |l: &BorrowedItem| l.borrowed_at))
    }

    async fn list_transactions(&self, supply: Option<SupplyId>) -> StoreResult<Vec<InventoryTransaction>> {
        let rows = self
            .read()?
            .transactions
            .iter()
            .filter(|tx| supply.is_none_or(|s| tx.supply_id == s))
            .cloned()
            .collect();
        Ok(newest_first(rows, |tx: &InventoryTransaction| (tx.created_at, tx.id)))
    }

    async fn list_notifications(&self, recipient: UserId, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let rows = self
            .read()?
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        Ok(newest_first(rows, |n: &Notification| (n.created_at, n.id)))
    }

    async fn mark_all_read(&self, recipient: UserId) -> StoreResult<u64> {
        let mut t = self.write()?;
        let mut count = 0;
        for n in t.notifications.iter_mut().filter(|n| n.recipient == recipient && !n.is_read) {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn recent_scans(&self, limit: usize) -> StoreResult<Vec<QrScanLog>> {
        let rows = self.read()?.scan_logs.clone();
        let mut rows = newest_first(rows, |s: &QrScanLog| (s.scanned_at, s.id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<()> {
        let mut guard = self.write()?;
        let mut next = guard.clone();

        for v in changes.supplies {
            let current = next.supplies.get(&v.record.id).map(|s| s.version).unwrap_or(0);
            check("supply", v.record.id, v.expected, current)?;
            next.supplies.insert(v.record.id, v.record);
        }
        for v in changes.requests {
            let current = next.requests.get(&v.record.id).map(|r| r.version).unwrap_or(0);
            check("request", v.record.id, v.expected, current)?;
            if current == 0 && next.requests.values().any(|r| r.code == v.record.code) {
                return Err(StoreError::Conflict(format!("request code {} already exists", v.record.code)));
            }
            next.requests.insert(v.record.id, v.record);
        }
        for v in changes.loans {
            let current = next.loans.get(&v.record.id).map(|l| l.version).unwrap_or(0);
            check("borrowed item", v.record.id, v.expected, current)?;
            next.loans.insert(v.record.id, v.record);
        }
        for (id, expected) in changes.deleted_loans {
            let current = next
                .loans
                .get(&id)
                .map(|l| l.version)
                .ok_or_else(|| StoreError::NotFound(format!("borrowed item {id}")))?;
            check("borrowed item", id, expected, current)?;
            next.loans.remove(&id);
        }
        next.transactions.extend(changes.transactions);
        next.notifications.extend(changes.notifications);
        next.scan_logs.extend(changes.scan_logs);

        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Versioned;
    use chrono::Utc;
    use supplydesk_events::execute;
    use supplydesk_inventory::{CreateSupply, IssueStock, SupplyCommand, SupplyDetails};

    fn new_supply() -> Supply {
        let id = SupplyId::new();
        let mut s = Supply::empty(id);
        execute(
            &mut s,
            &SupplyCommand::Create(CreateSupply {
                supply_id: id,
                details: SupplyDetails::named("Extension cord"),
                initial_quantity: 10,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        s
    }

    #[tokio::test]
    async fn stale_write_is_rejected_and_nothing_is_applied() {
        let store = InMemoryStore::new();
        let supply = new_supply();
        let mut cs = Changeset::new();
        cs.supplies.push(Versioned::insert(supply.clone()));
        store.commit(cs).await.unwrap();

        // Two writers load version 1; the second commit must fail.
        let mut a = store.get_supply(supply.id).await.unwrap().unwrap();
        let mut b = a.clone();
        let issue = |n| SupplyCommand::Issue(IssueStock { quantity: n, reason: "x".into(), occurred_at: Utc::now() });
        execute(&mut a, &issue(3)).unwrap();
        execute(&mut b, &issue(4)).unwrap();

        let mut first = Changeset::new();
        first.supplies.push(Versioned::new(a, ExpectedVersion::Exact(1)));
        store.commit(first).await.unwrap();

        let mut second = Changeset::new();
        second.supplies.push(Versioned::new(b, ExpectedVersion::Exact(1)));
        second.notifications.push(Notification::new(
            UserId::new(),
            "t",
            "m",
            Default::default(),
            Utc::now(),
        ));
        let err = store.commit(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.get_supply(supply.id).await.unwrap().unwrap().quantity, 7);
        assert!(store.read().unwrap().notifications.is_empty());
    }

    #[tokio::test]
    async fn category_in_use_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let cat = Category::new(CategoryId::new(), "Furniture", "", true).unwrap();
        store.save_category(&cat).await.unwrap();
        let mut supply = new_supply();
        supply.details.category_id = Some(cat.id);
        let mut cs = Changeset::new();
        cs.supplies.push(Versioned::insert(supply));
        store.commit(cs).await.unwrap();

        assert!(matches!(store.delete_category(cat.id).await, Err(StoreError::Conflict(_))));
    }
}
