//! Supply requests: submission, review and release.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use supplydesk_auth::{Principal, Role};
use supplydesk_borrowing::{
    ensure_can_borrow, generate_request_code, overdue_items, BorrowedItem, LoanCommand, LoanEvent,
    OpenLoan, QrPayload, RequestCommand, RequestEvent, RequestKind, SubmitRequest, SupplyRequest,
};
use supplydesk_core::{BorrowedItemId, DomainError, ExpectedVersion, RequestId, SupplyId, UserId};
use supplydesk_events::execute;
use supplydesk_inventory::{IssueStock, Supply, SupplyCommand};

use super::{ensure_owner_or_staff, now, ServiceError, ServiceResult, SupplyDesk};
use crate::media::StoredQr;
use crate::projections::{loan_envelopes, request_envelopes};
use crate::store::{Changeset, LoanFilter, RequestFilter, Versioned};

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub supply_id: SupplyId,
    pub quantity: u32,
    pub purpose: String,
    pub requested_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBorrowRequest {
    pub supply_id: SupplyId,
    pub quantity: u32,
    pub purpose: String,
    /// Defaults to the configured borrow duration.
    pub duration_days: Option<u32>,
    pub requested_location: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BorrowLine {
    pub supply_id: SupplyId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub can_borrow: bool,
    pub overdue: Vec<BorrowedItem>,
}

/// Staff decision on a pending borrowing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowAction {
    /// Approve only; the item is released later.
    Approve,
    /// Approve, release and open the loan in one step.
    #[default]
    Create,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BorrowApproval {
    #[serde(default)]
    pub action: BorrowAction,
    /// Defaults to today.
    pub borrowed_date: Option<NaiveDate>,
    /// Defaults to the duration on the request.
    pub borrow_duration_days: Option<u32>,
    pub return_deadline: Option<NaiveDate>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub request: SupplyRequest,
    pub loan: Option<BorrowedItem>,
    pub supply: Supply,
}

/// Terms of the loan opened when a request is released.
pub(super) struct LoanTerms {
    pub borrowed_date: NaiveDate,
    pub duration_days: u32,
    pub return_deadline: Option<NaiveDate>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

pub(super) struct Released {
    pub request_events: Vec<RequestEvent>,
    pub loan: BorrowedItem,
    pub loan_events: Vec<LoanEvent>,
    pub supply: Supply,
}

impl SupplyDesk {
    pub async fn list_requests(&self, actor: &Principal, mut filter: RequestFilter) -> ServiceResult<Vec<SupplyRequest>> {
        if !actor.is_staff() {
            filter.requester = Some(actor.user_id);
        }
        Ok(self.store.list_requests(&filter).await?)
    }

    pub async fn get_request(&self, actor: &Principal, id: RequestId) -> ServiceResult<SupplyRequest> {
        let request = self.load_request(id).await?;
        ensure_owner_or_staff(actor, request.requester, "request")?;
        Ok(request)
    }

    /// File a consumable supply request.
    pub async fn submit_request(&self, actor: &Principal, input: NewRequest) -> ServiceResult<SupplyRequest> {
        let mut cs = Changeset::new();
        let (request, events) = self
            .prepare_submission(
                &mut cs,
                actor.user_id,
                input.supply_id,
                input.quantity,
                &input.purpose,
                RequestKind::Consumable,
                input.requested_location,
            )
            .await?;
        self.store.commit(cs).await?;
        self.publish(request_envelopes(&request, Some(actor.user_id), events));
        info!(request_id = %request.id, code = %request.code, "supply request submitted");
        Ok(request)
    }

    /// Whether `user` may file borrow requests right now.
    pub async fn borrow_eligibility(&self, user: UserId) -> ServiceResult<Eligibility> {
        let outstanding = self.outstanding_loans(user).await?;
        let today = now().date_naive();
        let overdue: Vec<BorrowedItem> = overdue_items(&outstanding, user, today).into_iter().cloned().collect();
        Ok(Eligibility {
            can_borrow: overdue.is_empty(),
            overdue,
        })
    }

    pub async fn submit_borrow_request(
        &self,
        actor: &Principal,
        input: NewBorrowRequest,
    ) -> ServiceResult<SupplyRequest> {
        let mut created = self
            .submit_borrow_lines(
                actor,
                &[BorrowLine {
                    supply_id: input.supply_id,
                    quantity: input.quantity,
                }],
                &input.purpose,
                input.duration_days,
                input.requested_location,
            )
            .await?;
        created
            .pop()
            .ok_or_else(|| DomainError::invariant("no borrow request was created").into())
    }

    /// One request per line; lines with zero quantity are skipped. All or nothing.
    pub async fn submit_borrow_batch(
        &self,
        actor: &Principal,
        lines: &[BorrowLine],
        purpose: &str,
        duration_days: Option<u32>,
        requested_location: Option<String>,
    ) -> ServiceResult<Vec<SupplyRequest>> {
        let lines: Vec<BorrowLine> = lines.iter().copied().filter(|l| l.quantity > 0).collect();
        if lines.is_empty() {
            return Err(DomainError::validation("select at least one item to borrow").into());
        }
        self.submit_borrow_lines(actor, &lines, purpose, duration_days, requested_location)
            .await
    }

    async fn submit_borrow_lines(
        &self,
        actor: &Principal,
        lines: &[BorrowLine],
        purpose: &str,
        duration_days: Option<u32>,
        requested_location: Option<String>,
    ) -> ServiceResult<Vec<SupplyRequest>> {
        if !actor.has_role(Role::DepartmentUser) {
            return Err(ServiceError::Forbidden(
                "only department users can request to borrow items".to_string(),
            ));
        }

        let outstanding = self.outstanding_loans(actor.user_id).await?;
        if let Err(e) = ensure_can_borrow(&outstanding, actor.user_id, now().date_naive()) {
            warn!(user_id = %actor.user_id, "borrow request blocked by overdue items");
            return Err(e.into());
        }

        let kind = RequestKind::Borrowing {
            duration_days: duration_days.unwrap_or(self.borrowing.default_duration_days),
        };
        let mut cs = Changeset::new();
        let mut created = Vec::with_capacity(lines.len());
        for line in lines {
            let submitted = self
                .prepare_submission(
                    &mut cs,
                    actor.user_id,
                    line.supply_id,
                    line.quantity,
                    purpose,
                    kind,
                    requested_location.clone(),
                )
                .await?;
            created.push(submitted);
        }
        self.store.commit(cs).await?;

        let mut requests = Vec::with_capacity(created.len());
        for (request, events) in created {
            self.publish(request_envelopes(&request, Some(actor.user_id), events));
            info!(request_id = %request.id, code = %request.code, "borrow request submitted");
            if let Err(e) = self.write_borrowing_qr(&request).await {
                warn!(request_id = %request.id, error = %e, "failed to render borrowing QR");
            }
            requests.push(request);
        }
        Ok(requests)
    }

    #[allow(clippy::too_many_arguments)]
    async fn prepare_submission(
        &self,
        cs: &mut Changeset,
        requester: UserId,
        supply_id: SupplyId,
        quantity: u32,
        purpose: &str,
        kind: RequestKind,
        requested_location: Option<String>,
    ) -> ServiceResult<(SupplyRequest, Vec<RequestEvent>)> {
        // The supply must exist; stock is only checked at release time.
        self.load_supply(supply_id).await?;

        let at = now();
        let id = RequestId::new();
        let mut request = SupplyRequest::empty(id);
        let events = execute(
            &mut request,
            &RequestCommand::Submit(SubmitRequest {
                request_id: id,
                code: generate_request_code(at.date_naive()),
                requester,
                supply_id,
                quantity,
                purpose: purpose.to_string(),
                kind,
                requested_location,
                occurred_at: at,
            }),
        )?;
        cs.requests.push(Versioned::insert(request.clone()));
        Ok((request, events))
    }

    async fn outstanding_loans(&self, user: UserId) -> ServiceResult<Vec<BorrowedItem>> {
        Ok(self
            .store
            .list_loans(&LoanFilter {
                borrower: Some(user),
                supply: None,
                returned: Some(false),
            })
            .await?)
    }

    // ── review ──────────────────────────────────────────────────────────

    pub async fn approve_request(&self, actor: UserId, id: RequestId) -> ServiceResult<SupplyRequest> {
        self.review(actor, id, RequestCommand::Approve { by: actor, at: now() })
            .await
    }

    pub async fn reject_request(&self, actor: UserId, id: RequestId, reason: &str) -> ServiceResult<SupplyRequest> {
        self.review(
            actor,
            id,
            RequestCommand::Reject {
                by: actor,
                reason: reason.to_string(),
                at: now(),
            },
        )
        .await
    }

    async fn review(&self, actor: UserId, id: RequestId, command: RequestCommand) -> ServiceResult<SupplyRequest> {
        let mut request = self.load_request(id).await?;
        let expected = request.version;
        let events = execute(&mut request, &command)?;

        let mut cs = Changeset::new();
        cs.requests
            .push(Versioned::new(request.clone(), ExpectedVersion::Exact(expected)));
        self.store.commit(cs).await?;
        self.publish(request_envelopes(&request, Some(actor), events));
        info!(request_id = %id, status = %request.status, "request reviewed");
        Ok(request)
    }

    /// Hand out an approved request: stock out, ledger line, loan record.
    pub async fn release_request(&self, actor: UserId, id: RequestId) -> ServiceResult<ReleaseOutcome> {
        let mut request = self.load_request(id).await?;
        let at = now();
        let code = request.code.clone();
        let terms = LoanTerms {
            borrowed_date: at.date_naive(),
            duration_days: request
                .kind
                .duration_days()
                .unwrap_or(self.borrowing.default_duration_days),
            return_deadline: None,
            location: None,
            notes: Some(format!("Released for request {code}")),
        };

        let mut cs = Changeset::new();
        let released = self
            .release_into(
                &mut cs,
                &mut request,
                RequestCommand::Release { by: actor, at },
                actor,
                at,
                terms,
                |_| format!("Released for request {code}"),
            )
            .await?;
        self.store.commit(cs).await?;
        Ok(self.finish_release(actor, request, released))
    }

    /// Staff decision on a pending borrowing request.
    pub async fn approve_borrow(
        &self,
        actor: UserId,
        id: RequestId,
        decision: BorrowApproval,
    ) -> ServiceResult<ReleaseOutcome> {
        let mut request = self.load_request(id).await?;
        if !request.is_borrowing() {
            return Err(DomainError::invariant("this is not a borrowing request").into());
        }

        if decision.action == BorrowAction::Approve {
            let request = self
                .review(actor, id, RequestCommand::Approve { by: actor, at: now() })
                .await?;
            let supply = self.load_supply(request.supply_id).await?;
            return Ok(ReleaseOutcome {
                request,
                loan: None,
                supply,
            });
        }

        let at = now();
        let terms = LoanTerms {
            borrowed_date: decision.borrowed_date.unwrap_or_else(|| at.date_naive()),
            duration_days: decision
                .borrow_duration_days
                .or(request.kind.duration_days())
                .unwrap_or(self.borrowing.default_duration_days),
            return_deadline: decision.return_deadline,
            location: decision
                .location
                .or_else(|| request.requested_location.clone()),
            notes: decision.notes,
        };
        let mut cs = Changeset::new();
        let released = self
            .release_into(
                &mut cs,
                &mut request,
                RequestCommand::ApproveAndRelease { by: actor, at },
                actor,
                at,
                terms,
                |loan| {
                    let deadline = loan
                        .return_deadline
                        .map(|d| d.to_string())
                        .unwrap_or_default();
                    format!("Borrowed item (ID: {}) - Return by {deadline}", loan.id)
                },
            )
            .await?;
        self.store.commit(cs).await?;
        Ok(self.finish_release(actor, request, released))
    }

    /// Release path shared by staff release, approve-and-release and the QR
    /// issue scan. Queues every write into `cs`; the caller commits.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn release_into(
        &self,
        cs: &mut Changeset,
        request: &mut SupplyRequest,
        command: RequestCommand,
        actor: UserId,
        at: DateTime<Utc>,
        terms: LoanTerms,
        ledger_reason: impl FnOnce(&BorrowedItem) -> String,
    ) -> ServiceResult<Released> {
        let expected = request.version;
        let request_events = execute(request, &command)?;
        let mut supply = self.supply_in(cs, request.supply_id).await?;

        let item_id = BorrowedItemId::new();
        let mut loan = BorrowedItem::empty(item_id);
        let loan_events = execute(
            &mut loan,
            &LoanCommand::Open(OpenLoan {
                item_id,
                supply_id: request.supply_id,
                borrower: request.requester,
                request_id: Some(request.id),
                quantity: request.quantity_requested,
                borrowed_date: terms.borrowed_date,
                borrow_duration_days: terms.duration_days,
                return_deadline: terms.return_deadline,
                location: terms
                    .location
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| supply.details.location.clone()),
                notes: terms.notes,
                occurred_at: at,
            }),
        )?;

        self.move_stock(
            cs,
            &mut supply,
            SupplyCommand::Issue(IssueStock {
                quantity: request.quantity_requested,
                reason: ledger_reason(&loan),
                occurred_at: at,
            }),
            actor,
        )
        .await?;

        cs.requests
            .push(Versioned::new(request.clone(), ExpectedVersion::Exact(expected)));
        cs.loans.push(Versioned::insert(loan.clone()));
        Ok(Released {
            request_events,
            loan,
            loan_events,
            supply,
        })
    }

    pub(super) fn finish_release(&self, actor: UserId, request: SupplyRequest, released: Released) -> ReleaseOutcome {
        self.publish(request_envelopes(&request, Some(actor), released.request_events));
        self.publish(loan_envelopes(&released.loan, Some(actor), released.loan_events));
        info!(
            request_id = %request.id,
            code = %request.code,
            item_id = %released.loan.id,
            deadline = ?released.loan.return_deadline,
            "request released"
        );
        ReleaseOutcome {
            request,
            loan: Some(released.loan),
            supply: released.supply,
        }
    }

    // ── QR slips ────────────────────────────────────────────────────────

    pub async fn generate_borrowing_qr(&self, id: RequestId) -> ServiceResult<StoredQr> {
        let request = self.load_request(id).await?;
        if !request.is_borrowing() {
            return Err(DomainError::invariant("this is not a borrowing request").into());
        }
        self.write_borrowing_qr(&request).await
    }

    async fn write_borrowing_qr(&self, request: &SupplyRequest) -> ServiceResult<StoredQr> {
        let payload = QrPayload::Borrow {
            request_id: request.id,
            user_id: request.requester,
            supply_id: request.supply_id,
        };
        Ok(self.media.write_borrowing_qr(request.id, &payload).await?)
    }
}
