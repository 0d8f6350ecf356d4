//! QR payloads printed on supply labels and borrowing slips.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{DomainError, RequestId, ScanLogId, SupplyId, UserId};

/// Decoded QR payload.
///
/// Wire forms (colon separated, ids are UUIDs):
/// - `SUPPLY:{supply_id}:{name}`
/// - `BORROW:{request_id}:{user_id}:{supply_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    Supply {
        supply_id: SupplyId,
        name: String,
    },
    Borrow {
        request_id: RequestId,
        user_id: UserId,
        supply_id: SupplyId,
    },
}

impl core::fmt::Display for QrPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QrPayload::Supply { supply_id, name } => write!(f, "SUPPLY:{supply_id}:{name}"),
            QrPayload::Borrow {
                request_id,
                user_id,
                supply_id,
            } => write!(f, "BORROW:{request_id}:{user_id}:{supply_id}"),
        }
    }
}

impl FromStr for QrPayload {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("SUPPLY:") {
            // The name may itself contain colons.
            let (id, name) = rest.split_once(':').unwrap_or((rest, ""));
            return Ok(QrPayload::Supply {
                supply_id: id.parse()?,
                name: name.to_string(),
            });
        }
        if let Some(rest) = s.strip_prefix("BORROW:") {
            let parts: Vec<&str> = rest.split(':').collect();
            let [request_id, user_id, supply_id] = parts.as_slice() else {
                return Err(DomainError::validation("invalid borrowing QR code format"));
            };
            return Ok(QrPayload::Borrow {
                request_id: request_id.parse()?,
                user_id: user_id.parse()?,
                supply_id: supply_id.parse()?,
            });
        }
        Err(DomainError::validation("invalid QR code format"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    #[default]
    Scan,
    Issue,
    Return,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::Scan => "scan",
            ScanAction::Issue => "issue",
            ScanAction::Return => "return",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scan" => Some(ScanAction::Scan),
            "issue" => Some(ScanAction::Issue),
            "return" => Some(ScanAction::Return),
            _ => None,
        }
    }
}

/// Audit entry written for every stock-moving scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrScanLog {
    pub id: ScanLogId,
    pub supply_id: SupplyId,
    pub scanned_by: UserId,
    pub action: ScanAction,
    pub location: String,
    pub notes: String,
    pub scanned_at: DateTime<Utc>,
}

impl QrScanLog {
    pub fn new(
        supply_id: SupplyId,
        scanned_by: UserId,
        action: ScanAction,
        location: Option<&str>,
        notes: impl Into<String>,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("Unknown");
        Self {
            id: ScanLogId::new(),
            supply_id,
            scanned_by,
            action,
            location: location.to_string(),
            notes: notes.into(),
            scanned_at,
        }
    }
}
