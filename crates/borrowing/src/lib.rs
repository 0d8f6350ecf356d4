//! Borrowing domain module.
//!
//! Supply requests and their review state machine, borrowed items (loans),
//! due-status classification, the overdue sweep, the borrowing eligibility
//! gate and QR payloads. Pure domain logic: callers pass `today`/`now`.

pub mod due;
pub mod eligibility;
pub mod item;
pub mod kind;
pub mod qr;
pub mod request;
pub mod sweep;

pub use due::{due_status, duration_display, DueStatus, DEFAULT_DUE_SOON_THRESHOLD_DAYS};
pub use eligibility::{ensure_can_borrow, overdue_items};
pub use item::{
    format_note, AddLoanNote, BorrowedItem, LoanCommand, LoanEvent, LoanOpened, LoanReturned,
    OpenLoan, ReturnLoan, ReturnOutcome, DEFAULT_BORROW_DURATION_DAYS, MAX_BORROW_DURATION_DAYS,
};
pub use kind::{parse_legacy_purpose, RequestKind, BORROWING_PREFIX};
pub use qr::{QrPayload, QrScanLog, ScanAction};
pub use request::{
    generate_request_code, RequestCommand, RequestEvent, RequestStatus, RequestSubmitted,
    SubmitRequest, SupplyRequest,
};
pub use sweep::{classify_for_sweep, sweep, AlertKind, LoanAlert, DUE_SOON_ALERT_DAYS};
