use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use supplydesk_core::{Aggregate, AggregateRoot, DomainError, RequestId, SupplyId, UserId};
use supplydesk_events::Event;

use crate::item::MAX_BORROW_DURATION_DAYS;
use crate::kind::RequestKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Released,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Released => "released",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "released" => Some(RequestStatus::Released),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing request code: `REQ-YYYYMMDD-XXXXXXXX`.
pub fn generate_request_code(date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("REQ-{}-{suffix}", date.format("%Y%m%d"))
}

/// Aggregate root: SupplyRequest.
///
/// `pending -> approved -> released`, `pending -> rejected`, and for
/// borrowing requests `pending -> released` in a single approve-and-release
/// step. `approved_by`/`approved_at` record the reviewer for rejections too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyRequest {
    pub id: RequestId,
    pub code: String,
    pub requester: UserId,
    pub supply_id: SupplyId,
    pub quantity_requested: u32,
    pub purpose: String,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub released_by: Option<UserId>,
    pub released_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub requested_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl SupplyRequest {
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            code: String::new(),
            requester: UserId::from_uuid(Uuid::nil()),
            supply_id: SupplyId::from_uuid(Uuid::nil()),
            quantity_requested: 0,
            purpose: String::new(),
            kind: RequestKind::Consumable,
            status: RequestStatus::Pending,
            approved_by: None,
            approved_at: None,
            released_by: None,
            released_at: None,
            rejection_reason: None,
            requested_location: None,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
        }
    }

    fn submitted(&self) -> bool {
        self.version > 0
    }

    pub fn is_borrowing(&self) -> bool {
        self.kind.is_borrowing()
    }

    /// Purpose text in the legacy flagged format (CSV export, QR slips).
    pub fn legacy_purpose(&self) -> String {
        self.kind.legacy_purpose(&self.purpose)
    }
}

impl AggregateRoot for SupplyRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub code: String,
    pub requester: UserId,
    pub supply_id: SupplyId,
    pub quantity: u32,
    pub purpose: String,
    pub kind: RequestKind,
    pub requested_location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    Submit(SubmitRequest),
    Approve {
        by: UserId,
        at: DateTime<Utc>,
    },
    Reject {
        by: UserId,
        reason: String,
        at: DateTime<Utc>,
    },
    Release {
        by: UserId,
        at: DateTime<Utc>,
    },
    /// Borrowing requests only: approve and release in one step.
    ApproveAndRelease {
        by: UserId,
        at: DateTime<Utc>,
    },
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub request_id: RequestId,
    pub code: String,
    pub requester: UserId,
    pub supply_id: SupplyId,
    pub quantity: u32,
    pub purpose: String,
    pub kind: RequestKind,
    pub requested_location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    Submitted(RequestSubmitted),
    Approved {
        request_id: RequestId,
        requester: UserId,
        by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        request_id: RequestId,
        requester: UserId,
        by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Released {
        request_id: RequestId,
        requester: UserId,
        supply_id: SupplyId,
        quantity: u32,
        by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::Submitted(_) => "borrowing.request.submitted",
            RequestEvent::Approved { .. } => "borrowing.request.approved",
            RequestEvent::Rejected { .. } => "borrowing.request.rejected",
            RequestEvent::Released { .. } => "borrowing.request.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::Submitted(e) => e.occurred_at,
            RequestEvent::Approved { occurred_at, .. }
            | RequestEvent::Rejected { occurred_at, .. }
            | RequestEvent::Released { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for SupplyRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::Submitted(e) => {
                self.id = e.request_id;
                self.code = e.code.clone();
                self.requester = e.requester;
                self.supply_id = e.supply_id;
                self.quantity_requested = e.quantity;
                self.purpose = e.purpose.clone();
                self.kind = e.kind;
                self.requested_location = e.requested_location.clone();
                self.status = RequestStatus::Pending;
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
            }
            RequestEvent::Approved { by, occurred_at, .. } => {
                self.status = RequestStatus::Approved;
                self.approved_by = Some(*by);
                self.approved_at = Some(*occurred_at);
                self.updated_at = *occurred_at;
            }
            RequestEvent::Rejected {
                by,
                reason,
                occurred_at,
                ..
            } => {
                self.status = RequestStatus::Rejected;
                self.approved_by = Some(*by);
                self.approved_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
                self.updated_at = *occurred_at;
            }
            RequestEvent::Released { by, occurred_at, .. } => {
                self.status = RequestStatus::Released;
                self.released_by = Some(*by);
                self.released_at = Some(*occurred_at);
                self.updated_at = *occurred_at;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::Submit(cmd) => self.handle_submit(cmd),
            _ if !self.submitted() => Err(DomainError::not_found()),
            RequestCommand::Approve { by, at } => {
                self.ensure_status(RequestStatus::Pending, "request is not pending")?;
                Ok(vec![self.approved(*by, *at)])
            }
            RequestCommand::Reject { by, reason, at } => {
                self.ensure_status(RequestStatus::Pending, "request is not pending")?;
                Ok(vec![RequestEvent::Rejected {
                    request_id: self.id,
                    requester: self.requester,
                    by: *by,
                    reason: reason.trim().to_string(),
                    occurred_at: *at,
                }])
            }
            RequestCommand::Release { by, at } => {
                self.ensure_status(RequestStatus::Approved, "request must be approved first")?;
                Ok(vec![self.released(*by, *at)])
            }
            RequestCommand::ApproveAndRelease { by, at } => {
                if !self.is_borrowing() {
                    return Err(DomainError::invariant("this is not a borrowing request"));
                }
                self.ensure_status(RequestStatus::Pending, "request has already been processed")?;
                Ok(vec![self.approved(*by, *at), self.released(*by, *at)])
            }
        }
    }
}

impl SupplyRequest {
    fn ensure_status(&self, expected: RequestStatus, msg: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!("{msg} (status: {})", self.status)));
        }
        Ok(())
    }

    fn approved(&self, by: UserId, at: DateTime<Utc>) -> RequestEvent {
        RequestEvent::Approved {
            request_id: self.id,
            requester: self.requester,
            by,
            occurred_at: at,
        }
    }

    fn released(&self, by: UserId, at: DateTime<Utc>) -> RequestEvent {
        RequestEvent::Released {
            request_id: self.id,
            requester: self.requester,
            supply_id: self.supply_id,
            quantity: self.quantity_requested,
            by,
            occurred_at: at,
        }
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.submitted() {
            return Err(DomainError::conflict("request already exists"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity requested must be at least 1"));
        }
        if cmd.purpose.trim().is_empty() {
            return Err(DomainError::validation("purpose is required"));
        }
        match cmd.kind.duration_days() {
            Some(0) => return Err(DomainError::validation("borrow duration must be at least 1 day")),
            Some(d) if d > MAX_BORROW_DURATION_DAYS => {
                return Err(DomainError::validation(format!(
                    "borrow duration cannot exceed {MAX_BORROW_DURATION_DAYS} days"
                )));
            }
            _ => {}
        }
        Ok(vec![RequestEvent::Submitted(RequestSubmitted {
            request_id: cmd.request_id,
            code: cmd.code.clone(),
            requester: cmd.requester,
            supply_id: cmd.supply_id,
            quantity: cmd.quantity,
            purpose: cmd.purpose.trim().to_string(),
            kind: cmd.kind,
            requested_location: cmd.requested_location.clone().filter(|l| !l.trim().is_empty()),
            occurred_at: cmd.occurred_at,
        })])
    }
}
