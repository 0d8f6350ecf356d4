use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{Aggregate, AggregateRoot, BorrowedItemId, DomainError, RequestId, SupplyId, UserId};
use supplydesk_events::Event;

use crate::due::duration_display;

pub const DEFAULT_BORROW_DURATION_DAYS: u32 = 3;

/// Longest loan a request or approval may ask for.
pub const MAX_BORROW_DURATION_DAYS: u32 = 365;

/// One physical loan of a supply to a borrower.
///
/// Invariants:
/// - `return_deadline` defaults to `borrowed_date + borrow_duration_days`
/// - the item is returned iff `returned_at` is set
/// - `quantity >= 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowedItem {
    pub id: BorrowedItemId,
    pub supply_id: SupplyId,
    pub borrower: UserId,
    pub request_id: Option<RequestId>,
    pub borrowed_date: NaiveDate,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub quantity: u32,
    pub location_when_borrowed: String,
    pub location_when_returned: Option<String>,
    pub notes: Option<String>,
    pub return_deadline: Option<NaiveDate>,
    pub borrow_duration_days: u32,
    pub version: u64,
}

impl BorrowedItem {
    /// Not-yet-opened instance; only an `Open` command is valid on it.
    pub fn empty(id: BorrowedItemId) -> Self {
        Self {
            id,
            supply_id: SupplyId::from_uuid(uuid::Uuid::nil()),
            borrower: UserId::from_uuid(uuid::Uuid::nil()),
            request_id: None,
            borrowed_date: NaiveDate::MIN,
            borrowed_at: DateTime::<Utc>::MIN_UTC,
            returned_at: None,
            quantity: 0,
            location_when_borrowed: String::new(),
            location_when_returned: None,
            notes: None,
            return_deadline: None,
            borrow_duration_days: DEFAULT_BORROW_DURATION_DAYS,
            version: 0,
        }
    }

    fn opened(&self) -> bool {
        self.version > 0
    }

    pub fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }

    /// Not returned, has a deadline, and `today` is past it.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.open_deadline() {
            Some(deadline) => today > deadline,
            None => false,
        }
    }

    /// Whole days from `today` to the deadline; negative once overdue.
    pub fn days_until_due(&self, today: NaiveDate) -> Option<i64> {
        self.open_deadline().map(|d| (d - today).num_days())
    }

    /// Deadline of an item that is still out.
    fn open_deadline(&self) -> Option<NaiveDate> {
        if self.is_returned() {
            None
        } else {
            self.return_deadline
        }
    }

    /// Time the item has been out: until return, or until `now` while borrowed.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.returned_at.unwrap_or(now) - self.borrowed_at
    }

    pub fn duration_display(&self, now: DateTime<Utc>) -> String {
        duration_display(self.duration(now))
    }
}

impl AggregateRoot for BorrowedItem {
    type Id = BorrowedItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLoan {
    pub item_id: BorrowedItemId,
    pub supply_id: SupplyId,
    pub borrower: UserId,
    pub request_id: Option<RequestId>,
    pub quantity: u32,
    pub borrowed_date: NaiveDate,
    pub borrow_duration_days: u32,
    /// Explicit deadline; computed from the duration when absent.
    pub return_deadline: Option<NaiveDate>,
    pub location: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnLoan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLoan {
    /// Defaults to the borrow location.
    pub location: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLoanNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLoanNote {
    pub author: String,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanCommand {
    Open(OpenLoan),
    Return(ReturnLoan),
    AddNote(AddLoanNote),
}

/// Event: LoanOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOpened {
    pub item_id: BorrowedItemId,
    pub supply_id: SupplyId,
    pub borrower: UserId,
    pub request_id: Option<RequestId>,
    pub quantity: u32,
    pub borrowed_date: NaiveDate,
    pub borrow_duration_days: u32,
    pub return_deadline: NaiveDate,
    pub location: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturned {
    pub item_id: BorrowedItemId,
    pub supply_id: SupplyId,
    pub borrower: UserId,
    pub quantity: u32,
    pub location: String,
    pub notes: Option<String>,
    /// Whether the return came after the deadline.
    pub was_overdue: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    Opened(LoanOpened),
    Returned(LoanReturned),
    NoteAdded {
        line: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LoanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::Opened(_) => "borrowing.loan.opened",
            LoanEvent::Returned(_) => "borrowing.loan.returned",
            LoanEvent::NoteAdded { .. } => "borrowing.loan.note_added",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::Opened(e) => e.occurred_at,
            LoanEvent::Returned(e) => e.occurred_at,
            LoanEvent::NoteAdded { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Result of a return attempt. Returning twice is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOutcome {
    Returned { quantity: u32 },
    AlreadyReturned,
}

impl ReturnOutcome {
    pub fn from_events(events: &[LoanEvent]) -> Self {
        events
            .iter()
            .find_map(|e| match e {
                LoanEvent::Returned(r) => Some(ReturnOutcome::Returned { quantity: r.quantity }),
                _ => None,
            })
            .unwrap_or(ReturnOutcome::AlreadyReturned)
    }
}

/// `[author - YYYY-MM-DD HH:MM]: text`
pub fn format_note(author: &str, at: DateTime<Utc>, text: &str) -> String {
    format!("[{author} - {}]: {text}", at.format("%Y-%m-%d %H:%M"))
}

fn append_note(notes: &mut Option<String>, line: &str) {
    match notes {
        Some(existing) if !existing.is_empty() => {
            existing.push_str("\n\n");
            existing.push_str(line);
        }
        _ => *notes = Some(line.to_string()),
    }
}

impl Aggregate for BorrowedItem {
    type Command = LoanCommand;
    type Event = LoanEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoanEvent::Opened(e) => {
                self.id = e.item_id;
                self.supply_id = e.supply_id;
                self.borrower = e.borrower;
                self.request_id = e.request_id;
                self.quantity = e.quantity;
                self.borrowed_date = e.borrowed_date;
                self.borrowed_at = e.occurred_at;
                self.borrow_duration_days = e.borrow_duration_days;
                self.return_deadline = Some(e.return_deadline);
                self.location_when_borrowed = e.location.clone();
                self.notes = e.notes.clone();
            }
            LoanEvent::Returned(e) => {
                self.returned_at = Some(e.occurred_at);
                self.location_when_returned = Some(e.location.clone());
                if let Some(n) = e.notes.as_deref() {
                    append_note(&mut self.notes, n);
                }
            }
            LoanEvent::NoteAdded { line, .. } => append_note(&mut self.notes, line),
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoanCommand::Open(cmd) => self.handle_open(cmd),
            _ if !self.opened() => Err(DomainError::not_found()),
            LoanCommand::Return(cmd) => Ok(self.handle_return(cmd)),
            LoanCommand::AddNote(cmd) => {
                let text = cmd.text.trim();
                if text.is_empty() {
                    return Err(DomainError::validation("note cannot be empty"));
                }
                Ok(vec![LoanEvent::NoteAdded {
                    line: format_note(&cmd.author, cmd.occurred_at, text),
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }
}

impl BorrowedItem {
    fn handle_open(&self, cmd: &OpenLoan) -> Result<Vec<LoanEvent>, DomainError> {
        if self.opened() {
            return Err(DomainError::conflict("loan already exists"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("borrowed quantity must be at least 1"));
        }
        if cmd.borrow_duration_days == 0 && cmd.return_deadline.is_none() {
            return Err(DomainError::validation("borrow duration must be at least 1 day"));
        }
        if cmd.borrow_duration_days > MAX_BORROW_DURATION_DAYS {
            return Err(DomainError::validation(format!(
                "borrow duration cannot exceed {MAX_BORROW_DURATION_DAYS} days"
            )));
        }
        let return_deadline = match cmd.return_deadline {
            Some(d) if d < cmd.borrowed_date => {
                return Err(DomainError::validation(
                    "return deadline cannot be before the borrowed date",
                ));
            }
            Some(d) => d,
            None => cmd
                .borrowed_date
                .checked_add_days(Days::new(u64::from(cmd.borrow_duration_days)))
                .ok_or_else(|| DomainError::validation("return deadline is out of range"))?,
        };

        Ok(vec![LoanEvent::Opened(LoanOpened {
            item_id: cmd.item_id,
            supply_id: cmd.supply_id,
            borrower: cmd.borrower,
            request_id: cmd.request_id,
            quantity: cmd.quantity,
            borrowed_date: cmd.borrowed_date,
            borrow_duration_days: cmd.borrow_duration_days,
            return_deadline,
            location: cmd.location.clone(),
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return(&self, cmd: &ReturnLoan) -> Vec<LoanEvent> {
        if self.is_returned() {
            return Vec::new();
        }
        let location = cmd
            .location
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.location_when_borrowed.clone());

        vec![LoanEvent::Returned(LoanReturned {
            item_id: self.id,
            supply_id: self.supply_id,
            borrower: self.borrower,
            quantity: self.quantity,
            location,
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            was_overdue: self.is_overdue(cmd.occurred_at.date_naive()),
            occurred_at: cmd.occurred_at,
        })]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use supplydesk_events::execute;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn open_item(borrowed: NaiveDate, days: u32) -> BorrowedItem {
        let id = BorrowedItemId::new();
        let mut item = BorrowedItem::empty(id);
        execute(
            &mut item,
            &LoanCommand::Open(OpenLoan {
                item_id: id,
                supply_id: SupplyId::new(),
                borrower: UserId::new(),
                request_id: None,
                quantity: 2,
                borrowed_date: borrowed,
                borrow_duration_days: days,
                return_deadline: None,
                location: "AVR".into(),
                notes: None,
                occurred_at: Utc.from_utc_datetime(&borrowed.and_hms_opt(9, 0, 0).unwrap()),
            }),
        )
        .unwrap();
        item
    }

    fn ret(at: DateTime<Utc>) -> LoanCommand {
        LoanCommand::Return(ReturnLoan {
            location: None,
            notes: None,
            occurred_at: at,
        })
    }

    #[test]
    fn deadline_defaults_to_borrowed_date_plus_duration() {
        let item = open_item(date(2024, 3, 1), 3);
        assert_eq!(item.return_deadline, Some(date(2024, 3, 4)));
        assert_eq!(item.days_until_due(date(2024, 3, 2)), Some(2));
    }

    #[test]
    fn overdue_only_after_the_deadline_day() {
        let item = open_item(date(2024, 3, 1), 3);
        assert!(!item.is_overdue(date(2024, 3, 4)));
        assert!(item.is_overdue(date(2024, 3, 5)));
        assert_eq!(item.days_until_due(date(2024, 3, 6)), Some(-2));
    }

    #[test]
    fn returned_item_is_never_overdue() {
        let mut item = open_item(date(2024, 3, 1), 1);
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let events = execute(&mut item, &ret(at)).unwrap();
        assert!(matches!(&events[0], LoanEvent::Returned(r) if r.was_overdue));
        assert!(!item.is_overdue(date(2024, 3, 20)));
        assert_eq!(item.days_until_due(date(2024, 3, 20)), None);
        assert_eq!(item.location_when_returned.as_deref(), Some("AVR"));
    }

    #[test]
    fn returning_twice_is_idempotent() {
        let mut item = open_item(date(2024, 3, 1), 3);
        let first = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let events = execute(&mut item, &ret(first)).unwrap();
        assert_eq!(ReturnOutcome::from_events(&events), ReturnOutcome::Returned { quantity: 2 });

        let version = item.version;
        let again = execute(&mut item, &ret(first + Duration::days(1))).unwrap();
        assert_eq!(ReturnOutcome::from_events(&again), ReturnOutcome::AlreadyReturned);
        assert_eq!(item.returned_at, Some(first));
        assert_eq!(item.version, version);
    }

    #[test]
    fn notes_are_stamped_and_separated_by_blank_lines() {
        let mut item = open_item(date(2024, 3, 1), 3);
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 14, 5, 0).unwrap();
        let note = |text: &str| {
            LoanCommand::AddNote(AddLoanNote {
                author: "gso1".into(),
                text: text.into(),
                occurred_at: at,
            })
        };
        execute(&mut item, &note("Scratched lens")).unwrap();
        execute(&mut item, &note("Cleaned")).unwrap();
        assert_eq!(
            item.notes.as_deref(),
            Some("[gso1 - 2024-03-02 14:05]: Scratched lens\n\n[gso1 - 2024-03-02 14:05]: Cleaned")
        );
        assert!(execute(&mut item, &note("   ")).is_err());
    }

    #[test]
    fn explicit_deadline_before_borrow_date_is_rejected() {
        let id = BorrowedItemId::new();
        let item = BorrowedItem::empty(id);
        let cmd = LoanCommand::Open(OpenLoan {
            item_id: id,
            supply_id: SupplyId::new(),
            borrower: UserId::new(),
            request_id: None,
            quantity: 1,
            borrowed_date: date(2024, 3, 5),
            borrow_duration_days: 3,
            return_deadline: Some(date(2024, 3, 1)),
            location: String::new(),
            notes: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(item.handle(&cmd), Err(DomainError::Validation(_))));
    }

    fn open_cmd(borrowed: NaiveDate, days: u32) -> LoanCommand {
        let id = BorrowedItemId::new();
        LoanCommand::Open(OpenLoan {
            item_id: id,
            supply_id: SupplyId::new(),
            borrower: UserId::new(),
            request_id: None,
            quantity: 1,
            borrowed_date: borrowed,
            borrow_duration_days: days,
            return_deadline: None,
            location: String::new(),
            notes: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn oversized_duration_is_rejected_not_overflowed() {
        let item = BorrowedItem::empty(BorrowedItemId::new());
        let cmd = open_cmd(date(2024, 3, 1), u32::MAX);
        assert!(matches!(item.handle(&cmd), Err(DomainError::Validation(_))));

        let longest = open_cmd(date(2024, 3, 1), MAX_BORROW_DURATION_DAYS);
        assert!(item.handle(&longest).is_ok());
    }

    #[test]
    fn deadline_past_the_calendar_end_is_rejected() {
        let item = BorrowedItem::empty(BorrowedItemId::new());
        let cmd = open_cmd(NaiveDate::MAX, 1);
        assert!(matches!(item.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn duration_runs_until_return() {
        let mut item = open_item(date(2024, 3, 1), 3);
        let at = item.borrowed_at + Duration::days(2) + Duration::hours(5);
        execute(&mut item, &ret(at)).unwrap();
        assert_eq!(item.duration_display(at + Duration::days(30)), "2 days, 5 hours");
    }

    proptest! {
        #[test]
        fn overdue_iff_today_after_deadline(days in 1u32..60, offset in -90i64..90) {
            let borrowed = date(2024, 1, 15);
            let item = open_item(borrowed, days);
            let deadline = item.return_deadline.unwrap();
            let today = deadline + Duration::days(offset);
            prop_assert_eq!(item.is_overdue(today), today > deadline);
            prop_assert_eq!(item.days_until_due(today), Some(-offset));
        }

        #[test]
        fn repeated_returns_credit_once(extra in 1usize..5) {
            let mut item = open_item(date(2024, 1, 15), 3);
            let mut credited = 0u32;
            for i in 0..=extra {
                let at = item.borrowed_at + Duration::hours(1 + i as i64);
                let events = execute(&mut item, &ret(at)).unwrap();
                if let ReturnOutcome::Returned { quantity } = ReturnOutcome::from_events(&events) {
                    credited += quantity;
                }
            }
            prop_assert_eq!(credited, item.quantity);
        }
    }
}
