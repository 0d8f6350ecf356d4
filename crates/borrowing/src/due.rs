use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::item::BorrowedItem;

/// Items due within this many days count as "due soon".
pub const DEFAULT_DUE_SOON_THRESHOLD_DAYS: i64 = 3;

/// Due state of a loan, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Returned,
    NoDeadline,
    Overdue,
    DueToday,
    DueSoon,
    OnTime,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::Returned => "returned",
            DueStatus::NoDeadline => "no_deadline",
            DueStatus::Overdue => "overdue",
            DueStatus::DueToday => "due_today",
            DueStatus::DueSoon => "due_soon",
            DueStatus::OnTime => "on_time",
        }
    }
}

impl core::fmt::Display for DueStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a loan. Checks run in a fixed order and the first match wins:
/// returned, no deadline, overdue, due today, due within `threshold_days`,
/// on time.
pub fn due_status(item: &BorrowedItem, today: NaiveDate, threshold_days: i64) -> DueStatus {
    if item.is_returned() {
        return DueStatus::Returned;
    }
    let Some(deadline) = item.return_deadline else {
        return DueStatus::NoDeadline;
    };
    if today > deadline {
        return DueStatus::Overdue;
    }
    if today == deadline {
        return DueStatus::DueToday;
    }
    if (deadline - today).num_days() <= threshold_days {
        return DueStatus::DueSoon;
    }
    DueStatus::OnTime
}

/// Human-readable span such as `"2 days, 3 hours"` or `"45 minutes"`.
///
/// Minutes are only shown for spans under a day. Negative spans read as zero.
pub fn duration_display(span: Duration) -> String {
    let total = span.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    let plural = |n: i64, unit: &str| format!("{n} {unit}{}", if n == 1 { "" } else { "s" });

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 && days == 0 {
        parts.push(plural(minutes, "minute"));
    }

    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::{date, open_item};
    use chrono::Utc;
    use proptest::prelude::*;

    const T: i64 = DEFAULT_DUE_SOON_THRESHOLD_DAYS;

    #[test]
    fn classifies_by_distance_to_deadline() {
        // deadline 2024-03-11
        let item = open_item(date(2024, 3, 1), 10);
        assert_eq!(due_status(&item, date(2024, 3, 12), T), DueStatus::Overdue);
        assert_eq!(due_status(&item, date(2024, 3, 11), T), DueStatus::DueToday);
        assert_eq!(due_status(&item, date(2024, 3, 8), T), DueStatus::DueSoon);
        assert_eq!(due_status(&item, date(2024, 3, 7), T), DueStatus::OnTime);
    }

    #[test]
    fn returned_wins_over_everything() {
        let mut item = open_item(date(2024, 3, 1), 1);
        item.returned_at = Some(Utc::now());
        assert_eq!(due_status(&item, date(2025, 1, 1), T), DueStatus::Returned);
        item.return_deadline = None;
        assert_eq!(due_status(&item, date(2025, 1, 1), T), DueStatus::Returned);
    }

    #[test]
    fn missing_deadline_is_no_deadline() {
        let mut item = open_item(date(2024, 3, 1), 1);
        item.return_deadline = None;
        assert_eq!(due_status(&item, date(2030, 1, 1), T), DueStatus::NoDeadline);
    }

    #[test]
    fn duration_display_formats() {
        assert_eq!(duration_display(Duration::seconds(30)), "less than a minute");
        assert_eq!(duration_display(Duration::minutes(1)), "1 minute");
        assert_eq!(duration_display(Duration::minutes(125)), "2 hours, 5 minutes");
        assert_eq!(duration_display(Duration::days(1) + Duration::minutes(59)), "1 day");
        assert_eq!(duration_display(Duration::days(3) + Duration::hours(1)), "3 days, 1 hour");
        assert_eq!(duration_display(Duration::seconds(-10)), "less than a minute");
    }

    proptest! {
        #[test]
        fn due_status_matches_precedence(offset in -30i64..30, returned in any::<bool>(), has_deadline in any::<bool>()) {
            let mut item = open_item(date(2024, 6, 1), 5);
            if returned {
                item.returned_at = Some(Utc::now());
            }
            if !has_deadline {
                item.return_deadline = None;
            }
            let today = date(2024, 6, 6) + Duration::days(offset);
            let status = due_status(&item, today, T);
            let expected = if returned {
                DueStatus::Returned
            } else if !has_deadline {
                DueStatus::NoDeadline
            } else if offset > 0 {
                DueStatus::Overdue
            } else if offset == 0 {
                DueStatus::DueToday
            } else if -offset <= T {
                DueStatus::DueSoon
            } else {
                DueStatus::OnTime
            };
            prop_assert_eq!(status, expected);
            prop_assert_eq!(status == DueStatus::Overdue, item.is_overdue(today));
        }
    }
}
