//! Overdue / due-soon classification for the periodic loan sweep.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplydesk_core::{BorrowedItemId, UserId};
use supplydesk_notifications::NotificationLevel;

use crate::item::BorrowedItem;

/// The sweep reminds borrowers whose items are due within this many days.
pub const DUE_SOON_ALERT_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Overdue,
    DueSoon,
}

impl AlertKind {
    pub fn level(&self) -> NotificationLevel {
        match self {
            AlertKind::Overdue => NotificationLevel::Warning,
            AlertKind::DueSoon => NotificationLevel::Info,
        }
    }
}

/// One borrower-facing alert raised by the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAlert {
    pub item_id: BorrowedItemId,
    pub borrower: UserId,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl LoanAlert {
    pub fn level(&self) -> NotificationLevel {
        self.kind.level()
    }
}

pub fn classify_for_sweep(item: &BorrowedItem, today: NaiveDate) -> Option<AlertKind> {
    if item.is_overdue(today) {
        return Some(AlertKind::Overdue);
    }
    match item.days_until_due(today) {
        Some(days) if days <= DUE_SOON_ALERT_DAYS => Some(AlertKind::DueSoon),
        _ => None,
    }
}

/// Build alerts for every outstanding item that is overdue or due soon.
///
/// `items` pairs each loan with the display name of its supply.
pub fn sweep<'a>(
    items: impl IntoIterator<Item = (&'a BorrowedItem, &'a str)>,
    today: NaiveDate,
) -> Vec<LoanAlert> {
    items
        .into_iter()
        .filter_map(|(item, supply_name)| {
            let kind = classify_for_sweep(item, today)?;
            let deadline = item.return_deadline?;
            let due_on = deadline.format("%b %d, %Y");
            let (title, message) = match kind {
                AlertKind::Overdue => (
                    format!("Overdue item: {supply_name}"),
                    format!(
                        "Your borrowed item '{supply_name}' (qty: {}) was due on {due_on} and is now overdue.",
                        item.quantity
                    ),
                ),
                AlertKind::DueSoon => (
                    format!("Due soon: {supply_name}"),
                    format!(
                        "Your borrowed item '{supply_name}' (qty: {}) is due on {due_on} ({} day(s)).",
                        item.quantity,
                        item.days_until_due(today).unwrap_or(0).abs()
                    ),
                ),
            };
            Some(LoanAlert {
                item_id: item.id,
                borrower: item.borrower,
                kind,
                title,
                message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::{date, open_item};
    use chrono::Utc;

    #[test]
    fn overdue_and_due_soon_items_raise_alerts() {
        // deadlines: 03-04, 03-06, 03-11
        let late = open_item(date(2024, 3, 1), 3);
        let tomorrow = open_item(date(2024, 3, 1), 5);
        let later = open_item(date(2024, 3, 1), 10);
        let today = date(2024, 3, 5);

        let alerts = sweep(
            [(&late, "Projector"), (&tomorrow, "Speaker"), (&later, "Tent")],
            today,
        );
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::Overdue);
        assert_eq!(alerts[0].title, "Overdue item: Projector");
        assert_eq!(
            alerts[0].message,
            "Your borrowed item 'Projector' (qty: 2) was due on Mar 04, 2024 and is now overdue."
        );
        assert_eq!(alerts[0].level(), NotificationLevel::Warning);
        assert_eq!(alerts[1].kind, AlertKind::DueSoon);
        assert_eq!(alerts[1].title, "Due soon: Speaker");
        assert_eq!(alerts[1].level(), NotificationLevel::Info);
    }

    #[test]
    fn due_today_is_due_soon_for_the_sweep() {
        let item = open_item(date(2024, 3, 1), 3);
        assert_eq!(classify_for_sweep(&item, date(2024, 3, 4)), Some(AlertKind::DueSoon));
        assert_eq!(classify_for_sweep(&item, date(2024, 3, 2)), None);
    }

    #[test]
    fn returned_and_undated_items_are_skipped() {
        let mut returned = open_item(date(2024, 3, 1), 1);
        returned.returned_at = Some(Utc::now());
        let mut undated = open_item(date(2024, 3, 1), 1);
        undated.return_deadline = None;
        assert!(sweep([(&returned, "A"), (&undated, "B")], date(2024, 4, 1)).is_empty());
    }
}
