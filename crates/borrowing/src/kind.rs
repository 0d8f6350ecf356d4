use serde::{Deserialize, Serialize};

use crate::item::DEFAULT_BORROW_DURATION_DAYS;

/// Marker that flags a borrowing request in legacy purpose text.
pub const BORROWING_PREFIX: &str = "[BORROWING]";

const DURATION_LABEL: &str = "Borrow Duration: ";

/// What a supply request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    /// Issued and kept (paper, pens).
    Consumable,
    /// Loaned equipment, expected back after `duration_days`.
    Borrowing { duration_days: u32 },
}

impl RequestKind {
    pub fn is_borrowing(&self) -> bool {
        matches!(self, RequestKind::Borrowing { .. })
    }

    pub fn duration_days(&self) -> Option<u32> {
        match self {
            RequestKind::Borrowing { duration_days } => Some(*duration_days),
            RequestKind::Consumable => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Consumable => "consumable",
            RequestKind::Borrowing { .. } => "borrowing",
        }
    }

    /// Render purpose text in the legacy flagged format.
    pub fn legacy_purpose(&self, purpose: &str) -> String {
        match self {
            RequestKind::Consumable => purpose.to_string(),
            RequestKind::Borrowing { duration_days } => {
                format!("{BORROWING_PREFIX} {purpose}\n\n{DURATION_LABEL}{duration_days} days")
            }
        }
    }
}

/// Split legacy purpose text into a typed kind and the bare purpose.
///
/// A missing or unparsable duration line falls back to the default duration.
pub fn parse_legacy_purpose(raw: &str) -> (RequestKind, String) {
    let Some(rest) = raw.strip_prefix(BORROWING_PREFIX) else {
        return (RequestKind::Consumable, raw.trim().to_string());
    };

    let (purpose, duration_days) = match rest.rfind(DURATION_LABEL) {
        Some(pos) => {
            let days = rest[pos + DURATION_LABEL.len()..]
                .split_whitespace()
                .next()
                .and_then(|d| d.parse::<u32>().ok())
                .unwrap_or(DEFAULT_BORROW_DURATION_DAYS);
            (&rest[..pos], days)
        }
        None => (rest, DEFAULT_BORROW_DURATION_DAYS),
    };

    (
        RequestKind::Borrowing { duration_days },
        purpose.trim().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_purpose_is_consumable() {
        let (kind, purpose) = parse_legacy_purpose("  Office use ");
        assert_eq!(kind, RequestKind::Consumable);
        assert_eq!(purpose, "Office use");
    }

    #[test]
    fn flagged_purpose_yields_borrowing_with_duration() {
        let (kind, purpose) =
            parse_legacy_purpose("[BORROWING] Seminar in AVR\n\nBorrow Duration: 7 days");
        assert_eq!(kind, RequestKind::Borrowing { duration_days: 7 });
        assert_eq!(purpose, "Seminar in AVR");
    }

    #[test]
    fn bad_duration_falls_back_to_default() {
        let (kind, _) = parse_legacy_purpose("[BORROWING] x\n\nBorrow Duration: soon days");
        assert_eq!(kind, RequestKind::Borrowing { duration_days: 3 });
        let (kind, purpose) = parse_legacy_purpose("[BORROWING] Chairs for event");
        assert_eq!(kind, RequestKind::Borrowing { duration_days: 3 });
        assert_eq!(purpose, "Chairs for event");
    }

    #[test]
    fn legacy_rendering_parses_back() {
        let kind = RequestKind::Borrowing { duration_days: 5 };
        let text = kind.legacy_purpose("Field trip");
        assert_eq!(text, "[BORROWING] Field trip\n\nBorrow Duration: 5 days");
        assert_eq!(parse_legacy_purpose(&text), (kind, "Field trip".to_string()));
    }
}
