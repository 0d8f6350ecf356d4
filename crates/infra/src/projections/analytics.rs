//! Requestor/borrower analytics projection.
//!
//! Counts per user and per supply, plus a bounded activity log, maintained
//! from request and loan events. The whole read model can be rebuilt from
//! stored requests and borrowed items at any time.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use supplydesk_borrowing::{
    BorrowedItem, LoanEvent, LoanOpened, LoanReturned, RequestEvent, RequestStatus,
    RequestSubmitted, SupplyRequest,
};
use supplydesk_core::{SupplyId, UserId};
use supplydesk_events::{Event, EventEnvelope, Projection};

/// Activity log entries kept in memory.
pub const ACTIVITY_LOG_CAPACITY: usize = 1_000;

/// Events the analytics projection consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    Request(RequestEvent),
    Loan(LoanEvent),
}

impl Event for ActivityEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ActivityEvent::Request(e) => e.event_type(),
            ActivityEvent::Loan(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            ActivityEvent::Request(e) => e.version(),
            ActivityEvent::Loan(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ActivityEvent::Request(e) => e.occurred_at(),
            ActivityEvent::Loan(e) => e.occurred_at(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: Option<UserId>,
    pub total_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
    pub total_borrowings: u64,
    pub returned_items: u64,
    /// Loans that came back after their deadline.
    pub late_returns: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub last_borrow_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyUsage {
    pub supply_id: Option<SupplyId>,
    pub request_count: u64,
    pub borrow_count: u64,
    pub last_requested: Option<DateTime<Utc>>,
    pub last_borrowed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Request,
    Approval,
    Rejection,
    Borrow,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub supply_id: Option<SupplyId>,
    pub quantity: u32,
    pub description: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AnalyticsProjection {
    users: HashMap<UserId, UserActivity>,
    supplies: HashMap<SupplyId, SupplyUsage>,
    log: VecDeque<ActivityEntry>,
    applied: HashSet<Uuid>,
}

impl AnalyticsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored records, discarding current state.
    pub fn rebuild<'a>(
        requests: impl IntoIterator<Item = &'a SupplyRequest>,
        loans: impl IntoIterator<Item = &'a BorrowedItem>,
    ) -> Self {
        let mut envelopes: Vec<EventEnvelope<ActivityEvent>> = Vec::new();
        for r in requests {
            envelopes.extend(replay_request(r));
        }
        for l in loans {
            envelopes.extend(replay_loan(l));
        }
        envelopes.sort_by_key(|e| e.payload().occurred_at());

        let mut projection = Self::new();
        for env in &envelopes {
            projection.apply(env);
        }
        projection
    }

    pub fn user(&self, id: UserId) -> Option<&UserActivity> {
        self.users.get(&id)
    }

    /// Most active requesters first.
    pub fn users(&self) -> Vec<UserActivity> {
        let mut out: Vec<UserActivity> = self.users.values().cloned().collect();
        out.sort_by(|a, b| {
            (b.total_requests + b.total_borrowings)
                .cmp(&(a.total_requests + a.total_borrowings))
                .then(a.user_id.cmp(&b.user_id))
        });
        out
    }

    /// Ordered by request count, then borrow count.
    pub fn most_requested(&self, limit: usize) -> Vec<SupplyUsage> {
        let mut out: Vec<SupplyUsage> = self.supplies.values().cloned().collect();
        out.sort_by(|a, b| {
            b.request_count
                .cmp(&a.request_count)
                .then(b.borrow_count.cmp(&a.borrow_count))
                .then(a.supply_id.cmp(&b.supply_id))
        });
        out.truncate(limit);
        out
    }

    /// Newest first.
    pub fn activity_for(&self, user: UserId, limit: usize) -> Vec<ActivityEntry> {
        self.log
            .iter()
            .rev()
            .filter(|e| e.user_id == user)
            .take(limit)
            .cloned()
            .collect()
    }

    fn user_mut(&mut self, id: UserId) -> &mut UserActivity {
        self.users.entry(id).or_insert_with(|| UserActivity {
            user_id: Some(id),
            ..Default::default()
        })
    }

    fn supply_mut(&mut self, id: SupplyId) -> &mut SupplyUsage {
        self.supplies.entry(id).or_insert_with(|| SupplyUsage {
            supply_id: Some(id),
            ..Default::default()
        })
    }

    fn log(&mut self, entry: ActivityEntry) {
        if self.log.len() == ACTIVITY_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }

    fn on_submitted(&mut self, e: &RequestSubmitted) {
        let user = self.user_mut(e.requester);
        user.total_requests += 1;
        user.last_request_at = Some(e.occurred_at);

        let supply = self.supply_mut(e.supply_id);
        supply.request_count += 1;
        supply.last_requested = Some(e.occurred_at);

        self.log(ActivityEntry {
            user_id: e.requester,
            kind: ActivityKind::Request,
            supply_id: Some(e.supply_id),
            quantity: e.quantity,
            description: e.purpose.chars().take(100).collect(),
            at: e.occurred_at,
        });
    }

    fn on_opened(&mut self, e: &LoanOpened) {
        let user = self.user_mut(e.borrower);
        user.total_borrowings += 1;
        user.last_borrow_at = Some(e.occurred_at);

        let supply = self.supply_mut(e.supply_id);
        supply.borrow_count += 1;
        supply.last_borrowed = Some(e.occurred_at);

        self.log(ActivityEntry {
            user_id: e.borrower,
            kind: ActivityKind::Borrow,
            supply_id: Some(e.supply_id),
            quantity: e.quantity,
            description: format!("Borrowed until {}", e.return_deadline),
            at: e.occurred_at,
        });
    }

    fn on_returned(&mut self, e: &LoanReturned) {
        let user = self.user_mut(e.borrower);
        user.returned_items += 1;
        if e.was_overdue {
            user.late_returns += 1;
        }
        self.log(ActivityEntry {
            user_id: e.borrower,
            kind: ActivityKind::Return,
            supply_id: Some(e.supply_id),
            quantity: e.quantity,
            description: "Returned item".to_string(),
            at: e.occurred_at,
        });
    }
}

impl Projection for AnalyticsProjection {
    type Ev = ActivityEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        if !self.applied.insert(envelope.event_id()) {
            return;
        }
        match envelope.payload() {
            ActivityEvent::Request(RequestEvent::Submitted(e)) => self.on_submitted(e),
            ActivityEvent::Request(RequestEvent::Approved {
                requester,
                occurred_at,
                ..
            }) => {
                self.user_mut(*requester).approved_requests += 1;
                self.log(ActivityEntry {
                    user_id: *requester,
                    kind: ActivityKind::Approval,
                    supply_id: None,
                    quantity: 0,
                    description: String::new(),
                    at: *occurred_at,
                });
            }
            ActivityEvent::Request(RequestEvent::Rejected {
                requester,
                reason,
                occurred_at,
                ..
            }) => {
                self.user_mut(*requester).rejected_requests += 1;
                self.log(ActivityEntry {
                    user_id: *requester,
                    kind: ActivityKind::Rejection,
                    supply_id: None,
                    quantity: 0,
                    description: reason.clone(),
                    at: *occurred_at,
                });
            }
            ActivityEvent::Request(RequestEvent::Released { .. }) => {}
            ActivityEvent::Loan(LoanEvent::Opened(e)) => self.on_opened(e),
            ActivityEvent::Loan(LoanEvent::Returned(e)) => self.on_returned(e),
            ActivityEvent::Loan(LoanEvent::NoteAdded { .. }) => {}
        }
    }
}

/// Wrap freshly emitted request events for the projection.
pub fn request_envelopes(
    request: &SupplyRequest,
    actor: Option<UserId>,
    events: Vec<RequestEvent>,
) -> Vec<EventEnvelope<ActivityEvent>> {
    let first = request.version.saturating_sub(events.len() as u64);
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            EventEnvelope::new(request.id, "borrowing.request", first + i as u64 + 1, actor, ActivityEvent::Request(e))
        })
        .collect()
}

/// Wrap freshly emitted loan events for the projection.
pub fn loan_envelopes(
    item: &BorrowedItem,
    actor: Option<UserId>,
    events: Vec<LoanEvent>,
) -> Vec<EventEnvelope<ActivityEvent>> {
    let first = item.version.saturating_sub(events.len() as u64);
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| EventEnvelope::new(item.id, "borrowing.loan", first + i as u64 + 1, actor, ActivityEvent::Loan(e)))
        .collect()
}

fn replay_request(r: &SupplyRequest) -> Vec<EventEnvelope<ActivityEvent>> {
    let mut events = vec![RequestEvent::Submitted(RequestSubmitted {
        request_id: r.id,
        code: r.code.clone(),
        requester: r.requester,
        supply_id: r.supply_id,
        quantity: r.quantity_requested,
        purpose: r.purpose.clone(),
        kind: r.kind,
        requested_location: r.requested_location.clone(),
        occurred_at: r.created_at,
    })];
    let reviewed = r.approved_by.zip(r.approved_at);
    match (r.status, reviewed) {
        (RequestStatus::Approved | RequestStatus::Released, Some((by, at))) => {
            events.push(RequestEvent::Approved {
                request_id: r.id,
                requester: r.requester,
                by,
                occurred_at: at,
            });
        }
        (RequestStatus::Rejected, Some((by, at))) => {
            events.push(RequestEvent::Rejected {
                request_id: r.id,
                requester: r.requester,
                by,
                reason: r.rejection_reason.clone().unwrap_or_default(),
                occurred_at: at,
            });
        }
        _ => {}
    }
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| EventEnvelope::new(r.id, "borrowing.request", i as u64 + 1, None, ActivityEvent::Request(e)))
        .collect()
}

fn replay_loan(l: &BorrowedItem) -> Vec<EventEnvelope<ActivityEvent>> {
    let deadline = l.return_deadline.unwrap_or(l.borrowed_date);
    let mut events = vec![LoanEvent::Opened(LoanOpened {
        item_id: l.id,
        supply_id: l.supply_id,
        borrower: l.borrower,
        request_id: l.request_id,
        quantity: l.quantity,
        borrowed_date: l.borrowed_date,
        borrow_duration_days: l.borrow_duration_days,
        return_deadline: deadline,
        location: l.location_when_borrowed.clone(),
        notes: None,
        occurred_at: l.borrowed_at,
    })];
    if let Some(returned_at) = l.returned_at {
        events.push(LoanEvent::Returned(LoanReturned {
            item_id: l.id,
            supply_id: l.supply_id,
            borrower: l.borrower,
            quantity: l.quantity,
            location: l.location_when_returned.clone().unwrap_or_default(),
            notes: None,
            was_overdue: l
                .return_deadline
                .is_some_and(|d| returned_at.date_naive() > d),
            occurred_at: returned_at,
        }));
    }
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| EventEnvelope::new(l.id, "borrowing.loan", i as u64 + 1, None, ActivityEvent::Loan(e)))
        .collect()
}
