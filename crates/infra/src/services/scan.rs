//! QR scan processing.

use serde::{Deserialize, Serialize};
use tracing::info;

use supplydesk_borrowing::{
    BorrowedItem, QrPayload, QrScanLog, RequestCommand, RequestStatus, ReturnOutcome, ScanAction,
    SupplyRequest,
};
use supplydesk_core::{DomainError, RequestId, SupplyId, UserId};
use supplydesk_inventory::{InventoryTransaction, IssueStock, ReceiveStock, Supply, SupplyCommand};

use super::requests::LoanTerms;
use super::{now, ServiceError, ServiceResult, SupplyDesk};
use crate::projections::loan_envelopes;
use crate::store::{Changeset, LoanFilter};

const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    #[serde(default)]
    pub action: ScanAction,
    pub location: Option<String>,
    #[serde(default)]
    pub notes: String,
    /// Units moved by a supply-label issue/return. Defaults to 1.
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub action: ScanAction,
    pub message: String,
    pub supply: Supply,
    pub request: Option<SupplyRequest>,
    pub loan: Option<BorrowedItem>,
    pub is_item_borrowed: bool,
    pub recent_transactions: Vec<InventoryTransaction>,
}

impl SupplyDesk {
    pub async fn process_scan(&self, actor: UserId, scan: ScanRequest) -> ServiceResult<ScanOutcome> {
        let payload: QrPayload = scan.payload.parse()?;
        let quantity = scan.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1").into());
        }
        let mut outcome = match payload {
            QrPayload::Supply { supply_id, .. } => self.scan_supply(actor, supply_id, quantity, &scan).await?,
            QrPayload::Borrow {
                request_id,
                user_id,
                supply_id,
            } => self.scan_borrow_slip(actor, request_id, user_id, supply_id, &scan).await?,
        };
        outcome.recent_transactions = self.recent_transactions(outcome.supply.id).await?;
        info!(supply_id = %outcome.supply.id, action = scan.action.as_str(), "qr scan processed");
        Ok(outcome)
    }

    pub async fn recent_scans(&self, limit: usize) -> ServiceResult<Vec<QrScanLog>> {
        Ok(self.store.recent_scans(limit).await?)
    }

    async fn recent_transactions(&self, supply: SupplyId) -> ServiceResult<Vec<InventoryTransaction>> {
        let mut txs = self.store.list_transactions(Some(supply)).await?;
        txs.truncate(RECENT_TRANSACTIONS);
        Ok(txs)
    }

    async fn has_active_loan(&self, supply: SupplyId) -> ServiceResult<bool> {
        let active = self
            .store
            .list_loans(&LoanFilter {
                borrower: None,
                supply: Some(supply),
                returned: Some(false),
            })
            .await?;
        Ok(!active.is_empty())
    }

    async fn scan_supply(
        &self,
        actor: UserId,
        supply_id: SupplyId,
        quantity: u32,
        scan: &ScanRequest,
    ) -> ServiceResult<ScanOutcome> {
        let mut supply = self.load_supply(supply_id).await?;
        let at = now();

        let message = match scan.action {
            ScanAction::Scan => format!(
                "Supply {} current location: {}. Total stock: {} units.",
                supply.name(),
                supply.details.location,
                supply.quantity
            ),
            ScanAction::Issue | ScanAction::Return => {
                let (command, message) = if scan.action == ScanAction::Issue {
                    (
                        SupplyCommand::Issue(IssueStock {
                            quantity,
                            reason: format!("Issued {quantity} items via QR scan"),
                            occurred_at: at,
                        }),
                        format!("Supply {} issued successfully. Quantity reduced by {quantity}.", supply.name()),
                    )
                } else {
                    (
                        SupplyCommand::Receive(ReceiveStock {
                            quantity,
                            reason: format!("Returned {quantity} items via QR scan"),
                            occurred_at: at,
                        }),
                        format!("Supply {} returned successfully. Quantity increased by {quantity}.", supply.name()),
                    )
                };
                let mut cs = Changeset::new();
                self.move_stock(&mut cs, &mut supply, command, actor).await?;
                cs.scan_logs.push(QrScanLog::new(
                    supply.id,
                    actor,
                    scan.action,
                    scan.location.as_deref(),
                    scan.notes.clone(),
                    at,
                ));
                self.store.commit(cs).await?;
                message
            }
        };

        let is_item_borrowed = self.has_active_loan(supply.id).await?;
        Ok(ScanOutcome {
            action: scan.action,
            message,
            supply,
            request: None,
            loan: None,
            is_item_borrowed,
            recent_transactions: Vec::new(),
        })
    }

    async fn scan_borrow_slip(
        &self,
        actor: UserId,
        request_id: RequestId,
        user_id: UserId,
        supply_id: SupplyId,
        scan: &ScanRequest,
    ) -> ServiceResult<ScanOutcome> {
        let mut request = self.load_request(request_id).await?;
        if request.requester != user_id || request.supply_id != supply_id {
            return Err(ServiceError::NotFound(format!("borrowing request {request_id}")));
        }
        let at = now();
        let code = request.code.clone();

        match scan.action {
            ScanAction::Scan => {
                let supply = self.load_supply(supply_id).await?;
                let requester = self.display_name(user_id).await?;
                let message = format!(
                    "Borrowing Request: {}\nRequested by: {requester}\nQuantity: {}\nStatus: {}",
                    supply.name(),
                    request.quantity_requested,
                    request.status
                );
                let is_item_borrowed = self.has_active_loan(supply_id).await?;
                Ok(ScanOutcome {
                    action: scan.action,
                    message,
                    supply,
                    request: Some(request),
                    loan: None,
                    is_item_borrowed,
                    recent_transactions: Vec::new(),
                })
            }
            ScanAction::Issue => {
                // A pending slip is approved and released in one step.
                let command = if request.status == RequestStatus::Pending && request.is_borrowing() {
                    RequestCommand::ApproveAndRelease { by: actor, at }
                } else {
                    RequestCommand::Release { by: actor, at }
                };
                let terms = LoanTerms {
                    borrowed_date: at.date_naive(),
                    duration_days: request
                        .kind
                        .duration_days()
                        .unwrap_or(self.borrowing.default_duration_days),
                    return_deadline: None,
                    location: scan.location.clone(),
                    notes: Some(scan.notes.clone()).filter(|n| !n.trim().is_empty()),
                };
                let quantity = request.quantity_requested;
                let mut cs = Changeset::new();
                let released = self
                    .release_into(&mut cs, &mut request, command, actor, at, terms, |_| {
                        format!("Issued {quantity} items via QR scan for borrowing request {code}")
                    })
                    .await?;
                cs.scan_logs.push(QrScanLog::new(
                    supply_id,
                    actor,
                    scan.action,
                    scan.location.as_deref(),
                    scan.notes.clone(),
                    at,
                ));
                self.store.commit(cs).await?;

                let message = format!(
                    "Supply {} issued successfully. Fulfilled borrowing request {code}.",
                    released.supply.name()
                );
                let released = self.finish_release(actor, request, released);
                Ok(ScanOutcome {
                    action: scan.action,
                    message,
                    supply: released.supply,
                    request: Some(released.request),
                    loan: released.loan,
                    is_item_borrowed: true,
                    recent_transactions: Vec::new(),
                })
            }
            ScanAction::Return => {
                let mut item = self
                    .store
                    .list_loans(&LoanFilter {
                        borrower: Some(request.requester),
                        supply: Some(supply_id),
                        returned: Some(false),
                    })
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("active loan for borrowing request {code}"))
                    })?;

                let mut cs = Changeset::new();
                let (outcome, supply, events) = self
                    .return_into(
                        &mut cs,
                        &mut item,
                        actor,
                        at,
                        scan.location.clone(),
                        Some(scan.notes.clone()),
                        |item| {
                            format!(
                                "Returned {} items via QR scan for borrowing request {code}",
                                item.quantity
                            )
                        },
                    )
                    .await?;
                cs.scan_logs.push(QrScanLog::new(
                    supply_id,
                    actor,
                    scan.action,
                    scan.location.as_deref(),
                    scan.notes.clone(),
                    at,
                ));
                self.store.commit(cs).await?;
                self.publish(loan_envelopes(&item, Some(actor), events));

                let quantity = match outcome {
                    ReturnOutcome::Returned { quantity } => quantity,
                    ReturnOutcome::AlreadyReturned => 0,
                };
                let message = format!(
                    "Supply {} returned successfully. Quantity increased by {quantity}. Borrowed for {}.",
                    supply.name(),
                    item.duration_display(at)
                );
                let is_item_borrowed = self.has_active_loan(supply_id).await?;
                Ok(ScanOutcome {
                    action: scan.action,
                    message,
                    supply,
                    request: Some(request),
                    loan: Some(item),
                    is_item_borrowed,
                    recent_transactions: Vec::new(),
                })
            }
        }
    }
}
