//! Periodic alerting: the overdue/due-soon loan sweep and the low-stock check.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use supplydesk_borrowing::sweep;
use supplydesk_core::SupplyId;
use supplydesk_inventory::LowStockAlert;
use supplydesk_notifications::{Notification, NotificationLevel};

use super::{now, ServiceResult, SupplyDesk};
use crate::store::{Changeset, LoanFilter};

/// Outcome of one overdue sweep.
///
/// `alerts` counts loans that qualified; `delivered` excludes those whose
/// borrower still has the same notice unread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub alerts: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockLine {
    pub supply_id: SupplyId,
    pub name: String,
    pub quantity: u32,
    pub min_stock_level: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LowStockReport {
    pub low_stock: Vec<LowStockLine>,
    pub delivered: usize,
}

impl SupplyDesk {
    /// Notify borrowers about overdue and nearly due items.
    pub async fn sweep_overdue(&self, today: NaiveDate) -> ServiceResult<SweepReport> {
        let outstanding = self
            .store
            .list_loans(&LoanFilter {
                returned: Some(false),
                ..LoanFilter::default()
            })
            .await?;
        let names: HashMap<SupplyId, String> = self
            .store
            .list_supplies()
            .await?
            .into_iter()
            .map(|s| (s.id, s.details.name))
            .collect();

        let alerts = sweep(
            outstanding.iter().map(|item| {
                let name = names.get(&item.supply_id).map(String::as_str).unwrap_or("Unknown supply");
                (item, name)
            }),
            today,
        );

        let at = now();
        let candidates = alerts
            .iter()
            .map(|a| Notification::new(a.borrower, &a.title, &a.message, a.level(), at))
            .collect();
        let mut cs = Changeset::new();
        let delivered = self.deliver(&mut cs, candidates).await?;
        self.store.commit(cs).await?;

        let report = SweepReport {
            alerts: alerts.len(),
            delivered,
        };
        info!(%today, outstanding = outstanding.len(), alerts = report.alerts, delivered, "overdue sweep finished");
        Ok(report)
    }

    /// Make sure staff hold a notice for every supply at or below its minimum.
    pub async fn check_low_stock(&self, notify_admins: bool, notify_gso: bool) -> ServiceResult<LowStockReport> {
        let low: Vec<_> = self
            .store
            .list_supplies()
            .await?
            .into_iter()
            .filter(|s| s.is_low_stock())
            .collect();

        let recipients = if notify_admins || notify_gso {
            self.staff(notify_admins, notify_gso).await?
        } else {
            Vec::new()
        };

        let at = now();
        let candidates = low
            .iter()
            .flat_map(|supply| {
                let alert = LowStockAlert::for_supply(supply.name(), supply.quantity);
                let url = format!("/supplies/{}/", supply.id);
                recipients.iter().map(move |u| {
                    Notification::new(u.id, &alert.title, &alert.message, NotificationLevel::Warning, at)
                        .with_url(url.clone())
                })
            })
            .collect();
        let mut cs = Changeset::new();
        let delivered = self.deliver(&mut cs, candidates).await?;
        self.store.commit(cs).await?;

        let report = LowStockReport {
            low_stock: low
                .into_iter()
                .map(|s| LowStockLine {
                    supply_id: s.id,
                    quantity: s.quantity,
                    min_stock_level: s.details.min_stock_level,
                    name: s.details.name,
                })
                .collect(),
            delivered,
        };
        info!(low_stock = report.low_stock.len(), delivered, "low stock check finished");
        Ok(report)
    }
}
