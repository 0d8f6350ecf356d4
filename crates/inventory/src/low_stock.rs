use serde::{Deserialize, Serialize};

/// A low-stock alert for staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub title: String,
    pub message: String,
}

impl LowStockAlert {
    pub fn for_supply(name: &str, remaining: u32) -> Self {
        Self {
            title: format!("Low Stock Alert: {name}"),
            message: format!("Alert: {name} is low on stock ({remaining} remaining)."),
        }
    }
}

/// Alert only when a decrease lands at or below the minimum level.
///
/// Restocks and unchanged quantities never alert, even while below minimum.
pub fn low_stock_alert(name: &str, min_stock_level: u32, previous: u32, new: u32) -> Option<LowStockAlert> {
    (new <= min_stock_level && new < previous).then(|| LowStockAlert::for_supply(name, new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_on_decrease_into_low_band() {
        let alert = low_stock_alert("A4 Paper", 5, 6, 5).unwrap();
        assert_eq!(alert.title, "Low Stock Alert: A4 Paper");
        assert_eq!(alert.message, "Alert: A4 Paper is low on stock (5 remaining).");
    }

    #[test]
    fn no_alert_above_minimum_or_on_increase() {
        assert!(low_stock_alert("Pens", 5, 10, 6).is_none());
        assert!(low_stock_alert("Pens", 5, 2, 3).is_none());
        assert!(low_stock_alert("Pens", 5, 3, 3).is_none());
    }

    #[test]
    fn decrease_while_already_low_still_alerts() {
        assert!(low_stock_alert("Pens", 5, 3, 1).is_some());
    }
}
