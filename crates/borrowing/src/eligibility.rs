use chrono::NaiveDate;

use supplydesk_core::{DomainError, DomainResult, UserId};

use crate::item::BorrowedItem;

/// Overdue, unreturned loans held by `borrower`.
pub fn overdue_items<'a>(
    items: impl IntoIterator<Item = &'a BorrowedItem>,
    borrower: UserId,
    today: NaiveDate,
) -> Vec<&'a BorrowedItem> {
    items
        .into_iter()
        .filter(|i| i.borrower == borrower && i.is_overdue(today))
        .collect()
}

/// Borrowing gate: a user holding any overdue item may not file new borrow
/// requests until those items come back.
pub fn ensure_can_borrow<'a>(
    items: impl IntoIterator<Item = &'a BorrowedItem>,
    borrower: UserId,
    today: NaiveDate,
) -> DomainResult<()> {
    let overdue = overdue_items(items, borrower, today).len();
    if overdue > 0 {
        return Err(DomainError::BorrowingBlocked { overdue });
    }
    Ok(())
}
