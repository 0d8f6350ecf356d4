//! CSV exports of supplies, requests and the stock ledger.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use supplydesk_auth::User;
use supplydesk_borrowing::SupplyRequest;
use supplydesk_core::{CategoryId, SupplyId, UserId};
use supplydesk_inventory::{Category, InventoryTransaction, Supply};

use crate::services::{ServiceResult, SupplyDesk};
use crate::store::RequestFilter;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv buffer error: {0}")]
    Buffer(String),
}

#[derive(Serialize)]
struct SupplyRow<'a> {
    name: &'a str,
    category: &'a str,
    quantity: u32,
    unit: &'a str,
    min_stock_level: u32,
    status: &'static str,
    location: &'a str,
    cost_per_unit: String,
    total_value: String,
    consumable: bool,
}

#[derive(Serialize)]
struct RequestRow<'a> {
    code: &'a str,
    requester: &'a str,
    supply: &'a str,
    quantity: u32,
    status: &'static str,
    purpose: String,
    requested_at: String,
}

#[derive(Serialize)]
struct TransactionRow<'a> {
    date: String,
    supply: &'a str,
    kind: &'static str,
    quantity: i64,
    previous_quantity: u32,
    new_quantity: u32,
    reason: &'a str,
    performed_by: &'a str,
}

/// Name lookups shared by the exports.
pub struct Directory<'a> {
    supplies: HashMap<SupplyId, &'a str>,
    users: HashMap<UserId, &'a str>,
    categories: HashMap<CategoryId, &'a str>,
}

impl<'a> Directory<'a> {
    pub fn new(supplies: &'a [Supply], users: &'a [User], categories: &'a [Category]) -> Self {
        Self {
            supplies: supplies.iter().map(|s| (s.id, s.name())).collect(),
            users: users.iter().map(|u| (u.id, u.display_name())).collect(),
            categories: categories.iter().map(|c| (c.id, c.name.as_str())).collect(),
        }
    }

    fn supply(&self, id: SupplyId) -> &'a str {
        self.supplies.get(&id).copied().unwrap_or("")
    }

    fn user(&self, id: UserId) -> &'a str {
        self.users.get(&id).copied().unwrap_or("")
    }
}

fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportError> {
    writer
        .into_inner()
        .map_err(|e| ReportError::Buffer(e.error().to_string()))
}

pub fn supplies_csv(supplies: &[Supply], dir: &Directory<'_>) -> Result<Vec<u8>, ReportError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    for s in supplies {
        w.serialize(SupplyRow {
            name: s.name(),
            category: s
                .details
                .category_id
                .and_then(|c| dir.categories.get(&c).copied())
                .unwrap_or(""),
            quantity: s.quantity,
            unit: &s.details.unit,
            min_stock_level: s.details.min_stock_level,
            status: s.stock_status().as_str(),
            location: &s.details.location,
            cost_per_unit: money(s.details.cost_per_unit_cents),
            total_value: money(s.total_value_cents()),
            consumable: s.details.is_consumable,
        })?;
    }
    finish(w)
}

/// Borrowing requests carry the flagged legacy purpose text.
pub fn requests_csv(requests: &[SupplyRequest], dir: &Directory<'_>) -> Result<Vec<u8>, ReportError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    for r in requests {
        w.serialize(RequestRow {
            code: &r.code,
            requester: dir.user(r.requester),
            supply: dir.supply(r.supply_id),
            quantity: r.quantity_requested,
            status: r.status.as_str(),
            purpose: r.legacy_purpose(),
            requested_at: r.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })?;
    }
    finish(w)
}

pub fn transactions_csv(transactions: &[InventoryTransaction], dir: &Directory<'_>) -> Result<Vec<u8>, ReportError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    for t in transactions {
        w.serialize(TransactionRow {
            date: t.created_at.format("%Y-%m-%d %H:%M").to_string(),
            supply: dir.supply(t.supply_id),
            kind: t.kind.as_str(),
            quantity: t.quantity,
            previous_quantity: t.previous_quantity,
            new_quantity: t.new_quantity,
            reason: &t.reason,
            performed_by: dir.user(t.performed_by),
        })?;
    }
    finish(w)
}

/// Which export to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Supplies,
    Requests,
    Transactions,
}

impl Report {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "supplies" => Some(Report::Supplies),
            "requests" => Some(Report::Requests),
            "transactions" => Some(Report::Transactions),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Report::Supplies => "supplies.csv",
            Report::Requests => "requests.csv",
            Report::Transactions => "transactions.csv",
        }
    }
}

impl SupplyDesk {
    pub async fn export_csv(&self, report: Report) -> ServiceResult<Vec<u8>> {
        let store = self.store();
        let supplies = store.list_supplies().await?;
        let users = store.list_users().await?;
        let categories = store.list_categories().await?;
        let dir = Directory::new(&supplies, &users, &categories);
        let bytes = match report {
            Report::Supplies => supplies_csv(&supplies, &dir)?,
            Report::Requests => requests_csv(&store.list_requests(&RequestFilter::default()).await?, &dir)?,
            Report::Transactions => transactions_csv(&store.list_transactions(None).await?, &dir)?,
        };
        tracing::info!(report = report.file_name(), bytes = bytes.len(), "report exported");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use supplydesk_auth::Role;
    use supplydesk_borrowing::{RequestKind, RequestStatus};
    use supplydesk_core::RequestId;
    use supplydesk_inventory::SupplyDetails;

    fn supply(name: &str, quantity: u32, cents: i64) -> Supply {
        let mut s = Supply::empty(SupplyId::new());
        s.details = SupplyDetails::named(name);
        s.details.cost_per_unit_cents = cents;
        s.quantity = quantity;
        s
    }

    #[test]
    fn supplies_export_has_header_and_money_columns() {
        let supplies = vec![supply("Bond Paper, A4", 3, 1250)];
        let dir = Directory::new(&supplies, &[], &[]);
        let out = String::from_utf8(supplies_csv(&supplies, &dir).unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,category,quantity,unit,min_stock_level,status,location,cost_per_unit,total_value,consumable"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Bond Paper, A4\",,3,pieces,5,low_stock,Main Storage,12.50,37.50,false"
        );
    }

    #[test]
    fn borrowing_requests_export_legacy_purpose() {
        let supplies = vec![supply("Projector", 1, 0)];
        let user = User::register(Default::default(), "jdoe", "Jane Doe", Role::DepartmentUser, "IT", Utc::now()).unwrap();
        let users = vec![user];
        let mut request = SupplyRequest::empty(RequestId::new());
        request.code = "REQ-20240301-ABCDEF12".to_string();
        request.requester = users[0].id;
        request.supply_id = supplies[0].id;
        request.quantity_requested = 1;
        request.purpose = "Seminar".to_string();
        request.kind = RequestKind::Borrowing { duration_days: 5 };
        request.status = RequestStatus::Pending;

        let dir = Directory::new(&supplies, &users, &[]);
        let out = String::from_utf8(requests_csv(&[request], &dir).unwrap()).unwrap();
        assert!(out.contains("REQ-20240301-ABCDEF12,Jane Doe,Projector,1,pending,"));
        assert!(out.contains("[BORROWING] Seminar\n\nBorrow Duration: 5 days"));
    }

    #[test]
    fn negative_amounts_keep_their_sign() {
        assert_eq!(money(-5), "-0.05");
        assert_eq!(money(100_000), "1000.00");
    }
}
