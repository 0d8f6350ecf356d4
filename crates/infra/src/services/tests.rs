use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use supplydesk_auth::{Principal, Role};
use supplydesk_borrowing::{DueStatus, QrPayload, RequestStatus, ReturnOutcome, ScanAction};
use supplydesk_core::{BorrowedItemId, DomainError, SupplyId};
use supplydesk_inventory::{Supply, SupplyDetails, TransactionKind};

use super::*;
use crate::store::InMemoryStore;

struct Fixture {
    desk: SupplyDesk,
    admin: Principal,
    gso: Principal,
    dept: Principal,
    _media: TempDir,
}

async fn fixture() -> Fixture {
    fixture_with(BorrowingConfig::default()).await
}

async fn fixture_with(borrowing: BorrowingConfig) -> Fixture {
    let media = TempDir::new().unwrap();
    let desk = SupplyDesk::new(
        Arc::new(InMemoryStore::new()),
        MediaStore::new(media.path()),
        borrowing,
    );
    let mut principals = Vec::new();
    for (name, role) in [
        ("admin", Role::Admin),
        ("gso", Role::GsoStaff),
        ("dept", Role::DepartmentUser),
    ] {
        let user = desk
            .register_user(NewUser {
                id: None,
                username: name.to_string(),
                full_name: String::new(),
                role,
                department: "Registrar".to_string(),
                approved: true,
            })
            .await
            .unwrap();
        principals.push(Principal::new(user.id, vec![role]));
    }
    let dept = principals.pop().unwrap();
    let gso = principals.pop().unwrap();
    let admin = principals.pop().unwrap();
    Fixture {
        desk,
        admin,
        gso,
        dept,
        _media: media,
    }
}

impl Fixture {
    async fn supply(&self, name: &str, quantity: u32, min_stock_level: u32) -> Supply {
        let mut details = SupplyDetails::named(name);
        details.min_stock_level = min_stock_level;
        self.desk
            .create_supply(
                self.gso.user_id,
                NewSupply {
                    details,
                    initial_quantity: quantity,
                },
            )
            .await
            .unwrap()
    }

    async fn borrow(&self, supply: SupplyId, quantity: u32) -> SupplyRequest {
        self.desk
            .submit_borrow_request(
                &self.dept,
                NewBorrowRequest {
                    supply_id: supply,
                    quantity,
                    purpose: "Department event".to_string(),
                    duration_days: Some(7),
                    requested_location: None,
                },
            )
            .await
            .unwrap()
    }

    /// Approve-and-release a new borrow request, backdated by `days_ago`.
    async fn loan(&self, supply: SupplyId, quantity: u32, days_ago: i64) -> BorrowedItem {
        let request = self.borrow(supply, quantity).await;
        self.desk
            .approve_borrow(
                self.gso.user_id,
                request.id,
                BorrowApproval {
                    borrowed_date: Some(Utc::now().date_naive() - Duration::days(days_ago)),
                    ..BorrowApproval::default()
                },
            )
            .await
            .unwrap()
            .loan
            .unwrap()
    }

    async fn quantity(&self, supply: SupplyId) -> u32 {
        self.desk.get_supply(supply).await.unwrap().quantity
    }
}

#[tokio::test]
async fn release_issues_stock_and_opens_loan() {
    let f = fixture().await;
    let paper = f.supply("A4 Paper", 10, 2).await;

    let request = f
        .desk
        .submit_request(
            &f.dept,
            NewRequest {
                supply_id: paper.id,
                quantity: 3,
                purpose: "Exams".to_string(),
                requested_location: None,
            },
        )
        .await
        .unwrap();
    f.desk.approve_request(f.gso.user_id, request.id).await.unwrap();
    let released = f.desk.release_request(f.gso.user_id, request.id).await.unwrap();

    assert_eq!(released.request.status, RequestStatus::Released);
    assert_eq!(released.supply.quantity, 7);
    let loan = released.loan.unwrap();
    assert_eq!(loan.quantity, 3);
    assert_eq!(loan.borrower, f.dept.user_id);

    let ledger = f.desk.list_transactions(Some(paper.id)).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().any(|t| t.kind == TransactionKind::In && t.reason == "Initial stock"));
    let out = ledger.iter().find(|t| t.kind == TransactionKind::Out).unwrap();
    assert_eq!(out.reason, format!("Released for request {}", request.code));
}

#[tokio::test]
async fn release_without_enough_stock_changes_nothing() {
    let f = fixture().await;
    let toner = f.supply("Toner", 2, 0).await;
    let request = f
        .desk
        .submit_request(
            &f.dept,
            NewRequest {
                supply_id: toner.id,
                quantity: 5,
                purpose: "Printing".to_string(),
                requested_location: None,
            },
        )
        .await
        .unwrap();
    f.desk.approve_request(f.admin.user_id, request.id).await.unwrap();

    assert!(f.desk.release_request(f.admin.user_id, request.id).await.is_err());
    assert_eq!(f.quantity(toner.id).await, 2);
    let request = f.desk.get_request(&f.dept, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(f.desk.list_transactions(Some(toner.id)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn department_users_only_see_their_own_requests() {
    let f = fixture().await;
    let pens = f.supply("Pens", 50, 5).await;
    let other = f
        .desk
        .submit_request(
            &f.gso,
            NewRequest {
                supply_id: pens.id,
                quantity: 1,
                purpose: "Desk".to_string(),
                requested_location: None,
            },
        )
        .await
        .unwrap();

    let err = f.desk.get_request(&f.dept, other.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    let visible = f.desk.list_requests(&f.dept, Default::default()).await.unwrap();
    assert!(visible.is_empty());
    assert_eq!(f.desk.list_requests(&f.admin, Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn low_stock_notice_is_not_repeated_while_unread() {
    let f = fixture().await;
    let markers = f.supply("Markers", 6, 5).await;

    f.desk.adjust_stock(f.gso.user_id, markers.id, -1, "Damaged").await.unwrap();
    f.desk.adjust_stock(f.gso.user_id, markers.id, -1, "Lost").await.unwrap();

    for staff in [&f.admin, &f.gso] {
        let unread = f.desk.list_notifications(staff.user_id, true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "Low Stock Alert: Markers");
        assert_eq!(unread[0].url.as_deref(), Some(format!("/supplies/{}/", markers.id).as_str()));
    }
    assert!(f.desk.list_notifications(f.dept.user_id, true).await.unwrap().is_empty());

    // once read, the next decrease alerts again
    f.desk.mark_all_notifications_read(f.admin.user_id).await.unwrap();
    f.desk.adjust_stock(f.gso.user_id, markers.id, -1, "Lost").await.unwrap();
    assert_eq!(f.desk.list_notifications(f.admin.user_id, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn restock_never_alerts() {
    let f = fixture().await;
    let tape = f.supply("Tape", 1, 5).await;
    let tape = f.desk.restock(f.gso.user_id, tape.id, 2, None).await.unwrap();
    assert_eq!(tape.quantity, 3);
    assert!(f.desk.list_notifications(f.admin.user_id, true).await.unwrap().is_empty());
    let ledger = f.desk.list_transactions(Some(tape.id)).await.unwrap();
    assert_eq!(ledger[0].reason, "Restock");
}

#[tokio::test]
async fn second_return_does_not_credit_stock() {
    let f = fixture().await;
    let projector = f.supply("Projector", 3, 0).await;
    let loan = f.loan(projector.id, 2, 0).await;
    assert_eq!(f.quantity(projector.id).await, 1);

    let first = f
        .desk
        .return_loan(f.gso.user_id, loan.id, Some("Room 101".to_string()), Some("ok".to_string()))
        .await
        .unwrap();
    assert_eq!(first.outcome, ReturnOutcome::Returned { quantity: 2 });
    assert_eq!(first.supply.quantity, 3);

    let second = f.desk.return_loan(f.gso.user_id, loan.id, None, None).await.unwrap();
    assert_eq!(second.outcome, ReturnOutcome::AlreadyReturned);
    assert_eq!(f.quantity(projector.id).await, 3);
}

#[tokio::test]
async fn overdue_borrower_is_blocked() {
    let f = fixture().await;
    let speaker = f.supply("Speaker", 5, 0).await;
    f.loan(speaker.id, 1, 30).await;

    let eligibility = f.desk.borrow_eligibility(f.dept.user_id).await.unwrap();
    assert!(!eligibility.can_borrow);
    assert_eq!(eligibility.overdue.len(), 1);

    let err = f
        .desk
        .submit_borrow_request(
            &f.dept,
            NewBorrowRequest {
                supply_id: speaker.id,
                quantity: 1,
                purpose: "Again".to_string(),
                duration_days: None,
                requested_location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::BorrowingBlocked { overdue: 1 })
    ));
}

#[tokio::test]
async fn oversized_borrow_durations_are_rejected() {
    let f = fixture().await;
    let camera = f.supply("Camera", 2, 0).await;
    let err = f
        .desk
        .submit_borrow_request(
            &f.dept,
            NewBorrowRequest {
                supply_id: camera.id,
                quantity: 1,
                purpose: "Documentation".to_string(),
                duration_days: Some(u32::MAX),
                requested_location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    assert!(f.desk.list_requests(&f.admin, Default::default()).await.unwrap().is_empty());

    let request = f.borrow(camera.id, 1).await;
    let err = f
        .desk
        .approve_borrow(
            f.gso.user_id,
            request.id,
            BorrowApproval {
                borrow_duration_days: Some(u32::MAX),
                ..BorrowApproval::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    assert_eq!(f.quantity(camera.id).await, 2);
    let request = f.desk.get_request(&f.admin, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
}

#[tokio::test]
async fn configured_due_soon_threshold_drives_loan_status() {
    let wide = fixture_with(BorrowingConfig {
        due_soon_threshold_days: 10,
        ..BorrowingConfig::default()
    })
    .await;
    let drill = wide.supply("Drill", 1, 0).await;
    wide.loan(drill.id, 1, 0).await;
    let views = wide.desk.list_loans(&wide.admin, &LoanQuery::default()).await.unwrap();
    assert_eq!(views[0].days_until_due, Some(7));
    assert_eq!(views[0].due_status, DueStatus::DueSoon);

    let f = fixture().await;
    let drill = f.supply("Drill", 1, 0).await;
    f.loan(drill.id, 1, 0).await;
    let views = f.desk.list_loans(&f.admin, &LoanQuery::default()).await.unwrap();
    assert_eq!(views[0].due_status, DueStatus::OnTime);
}

#[tokio::test]
async fn staff_cannot_file_borrow_requests() {
    let f = fixture().await;
    let tent = f.supply("Tent", 2, 0).await;
    let err = f
        .desk
        .submit_borrow_request(
            &f.gso,
            NewBorrowRequest {
                supply_id: tent.id,
                quantity: 1,
                purpose: "Fair".to_string(),
                duration_days: None,
                requested_location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn batch_borrow_skips_empty_lines_and_writes_slips() {
    let f = fixture().await;
    let chairs = f.supply("Chairs", 40, 5).await;
    let tables = f.supply("Tables", 10, 2).await;

    let created = f
        .desk
        .submit_borrow_batch(
            &f.dept,
            &[
                BorrowLine {
                    supply_id: chairs.id,
                    quantity: 20,
                },
                BorrowLine {
                    supply_id: tables.id,
                    quantity: 0,
                },
            ],
            "Orientation",
            Some(3),
            Some("Gym".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind.duration_days(), Some(3));

    let slip = f
        .desk
        .media
        .root()
        .join("borrowing_qr_codes")
        .join(format!("borrowing_{}.svg", created[0].id));
    assert!(slip.exists());

    let err = f
        .desk
        .submit_borrow_batch(
            &f.dept,
            &[BorrowLine {
                supply_id: tables.id,
                quantity: 0,
            }],
            "Nothing",
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
}

#[tokio::test]
async fn bulk_delete_credits_items_still_out() {
    let f = fixture().await;
    let cables = f.supply("HDMI Cable", 10, 0).await;
    let out = f.loan(cables.id, 3, 0).await;
    let back = f.loan(cables.id, 2, 0).await;
    f.desk.return_loan(f.gso.user_id, back.id, None, None).await.unwrap();
    assert_eq!(f.quantity(cables.id).await, 7);

    let deleted = f
        .desk
        .bulk_delete_loans(f.admin.user_id, &[out.id, back.id, BorrowedItemId::new()])
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(f.quantity(cables.id).await, 10);
    assert!(f.desk.list_loans(&f.admin, &LoanQuery::default()).await.unwrap().is_empty());

    let ledger = f.desk.list_transactions(Some(cables.id)).await.unwrap();
    assert!(ledger
        .iter()
        .any(|t| t.reason == format!("Borrowed item (ID: {}) deleted/removed", out.id)));
}

#[tokio::test]
async fn sweep_reports_alerts_but_delivers_once() {
    let f = fixture().await;
    let camera = f.supply("Camera", 2, 0).await;
    f.loan(camera.id, 1, 30).await;
    let today = Utc::now().date_naive();

    let first = f.desk.sweep_overdue(today).await.unwrap();
    assert_eq!(first, SweepReport { alerts: 1, delivered: 1 });
    let second = f.desk.sweep_overdue(today).await.unwrap();
    assert_eq!(second, SweepReport { alerts: 1, delivered: 0 });

    let notices = f.desk.list_notifications(f.dept.user_id, true).await.unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Overdue item: Camera");
    assert!(notices[0].url.is_none());
}

#[tokio::test]
async fn low_stock_check_notifies_selected_roles() {
    let f = fixture().await;
    f.supply("Staples", 1, 5).await;
    f.supply("Folders", 100, 5).await;

    let report = f.desk.check_low_stock(false, true).await.unwrap();
    assert_eq!(report.low_stock.len(), 1);
    assert_eq!(report.low_stock[0].name, "Staples");
    assert_eq!(report.delivered, 1);
    assert!(f.desk.list_notifications(f.admin.user_id, true).await.unwrap().is_empty());

    let quiet = f.desk.check_low_stock(false, false).await.unwrap();
    assert_eq!(quiet.low_stock.len(), 1);
    assert_eq!(quiet.delivered, 0);
}

#[tokio::test]
async fn scanning_a_pending_slip_releases_and_return_scan_closes_the_loan() {
    let f = fixture().await;
    let mic = f.supply("Microphone", 4, 0).await;
    let request = f.borrow(mic.id, 2).await;
    let payload = QrPayload::Borrow {
        request_id: request.id,
        user_id: f.dept.user_id,
        supply_id: mic.id,
    }
    .to_string();

    let issued = f
        .desk
        .process_scan(
            f.gso.user_id,
            ScanRequest {
                payload: payload.clone(),
                action: ScanAction::Issue,
                location: Some("AVR".to_string()),
                notes: String::new(),
                quantity: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(issued.supply.quantity, 2);
    assert_eq!(issued.request.unwrap().status, RequestStatus::Released);
    assert_eq!(issued.loan.unwrap().location_when_borrowed, "AVR");
    assert!(issued.is_item_borrowed);

    let returned = f
        .desk
        .process_scan(
            f.gso.user_id,
            ScanRequest {
                payload,
                action: ScanAction::Return,
                location: None,
                notes: "all good".to_string(),
                quantity: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(returned.supply.quantity, 4);
    assert!(!returned.is_item_borrowed);
    assert_eq!(
        returned.recent_transactions[0].reason,
        format!("Returned 2 items via QR scan for borrowing request {}", request.code)
    );

    let scans = f.desk.recent_scans(10).await.unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].location, "Unknown");
}

#[tokio::test]
async fn supply_label_scan_moves_stock_by_quantity() {
    let f = fixture().await;
    let paper = f.supply("Bond Paper", 10, 0).await;
    let payload = QrPayload::Supply {
        supply_id: paper.id,
        name: "Bond Paper".to_string(),
    }
    .to_string();

    let looked = f
        .desk
        .process_scan(
            f.gso.user_id,
            ScanRequest {
                payload: payload.clone(),
                action: ScanAction::Scan,
                location: None,
                notes: String::new(),
                quantity: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(looked.supply.quantity, 10);
    assert!(f.desk.recent_scans(10).await.unwrap().is_empty());

    let issued = f
        .desk
        .process_scan(
            f.gso.user_id,
            ScanRequest {
                payload,
                action: ScanAction::Issue,
                location: Some("Supply room".to_string()),
                notes: String::new(),
                quantity: Some(4),
            },
        )
        .await
        .unwrap();
    assert_eq!(issued.supply.quantity, 6);
    assert_eq!(issued.recent_transactions[0].reason, "Issued 4 items via QR scan");
}

#[tokio::test]
async fn malformed_payload_is_a_validation_error() {
    let f = fixture().await;
    let err = f
        .desk
        .process_scan(
            f.gso.user_id,
            ScanRequest {
                payload: "hello".to_string(),
                action: ScanAction::Scan,
                location: None,
                notes: String::new(),
                quantity: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
}

#[tokio::test]
async fn analytics_follow_requests_and_returns() {
    let f = fixture().await;
    let laptop = f.supply("Laptop", 3, 0).await;
    let loan = f.loan(laptop.id, 1, 0).await;
    f.desk.return_loan(f.gso.user_id, loan.id, None, None).await.unwrap();

    let live = f.desk.analytics().user(f.dept.user_id).cloned().unwrap();
    assert_eq!(live.total_requests, 1);
    assert_eq!(live.total_borrowings, 1);
    assert_eq!(live.returned_items, 1);

    f.desk.rebuild_analytics().await.unwrap();
    let rebuilt = f.desk.analytics().user(f.dept.user_id).cloned().unwrap();
    assert_eq!(rebuilt.total_requests, live.total_requests);
    assert_eq!(rebuilt.returned_items, live.returned_items);
}
