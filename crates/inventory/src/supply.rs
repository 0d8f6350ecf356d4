use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{Aggregate, AggregateRoot, CategoryId, DomainError, SupplyId};
use supplydesk_events::Event;

use crate::transaction::TransactionKind;

pub const DEFAULT_MIN_STOCK_LEVEL: u32 = 5;
pub const DEFAULT_UNIT: &str = "pieces";
pub const DEFAULT_LOCATION: &str = "Main Storage";
/// Upper bound on a unit cost (10 million in currency units).
pub const MAX_COST_PER_UNIT_CENTS: i64 = 1_000_000_000;

/// Editable descriptive fields of a supply (everything except stock).
///
/// Omitted fields take the catalogue defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyDetails {
    pub name: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub min_stock_level: u32,
    pub unit: String,
    /// Integer cents.
    pub cost_per_unit_cents: i64,
    pub location: String,
    pub is_consumable: bool,
}

impl Default for SupplyDetails {
    fn default() -> Self {
        Self::named("")
    }
}

impl SupplyDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category_id: None,
            min_stock_level: DEFAULT_MIN_STOCK_LEVEL,
            unit: DEFAULT_UNIT.to_string(),
            cost_per_unit_cents: 0,
            location: DEFAULT_LOCATION.to_string(),
            is_consumable: false,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if self.cost_per_unit_cents < 0 {
            return Err(DomainError::validation("cost per unit cannot be negative"));
        }
        if self.cost_per_unit_cents > MAX_COST_PER_UNIT_CENTS {
            return Err(DomainError::validation("cost per unit is too large"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::InStock => "in_stock",
        }
    }
}

/// Aggregate root: Supply.
///
/// State-stored: the service layer loads the current record, runs a command
/// through [`supplydesk_events::execute`] and persists the new state at the
/// expected version together with one ledger line per stock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    pub id: SupplyId,
    #[serde(flatten)]
    pub details: SupplyDetails,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Supply {
    /// Not-yet-created instance; only a `Create` command is valid on it.
    pub fn empty(id: SupplyId) -> Self {
        Self {
            id,
            details: SupplyDetails::named(""),
            quantity: 0,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
        }
    }

    fn created(&self) -> bool {
        self.version > 0
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.details.min_stock_level
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.quantity == 0 {
            StockStatus::OutOfStock
        } else if self.is_low_stock() {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Stock value in cents, saturating for records written before the cost cap.
    pub fn total_value_cents(&self) -> i64 {
        self.details
            .cost_per_unit_cents
            .saturating_mul(i64::from(self.quantity))
    }
}

impl AggregateRoot for Supply {
    type Id = SupplyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSupply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSupply {
    pub supply_id: SupplyId,
    pub details: SupplyDetails,
    pub initial_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSupply (descriptive fields only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSupply {
    pub details: SupplyDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock (release, QR issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub quantity: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (restock, loan return).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub quantity: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (lost/damaged, count corrections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub delta: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyCommand {
    Create(CreateSupply),
    Update(UpdateSupply),
    Issue(IssueStock),
    Receive(ReceiveStock),
    Adjust(AdjustStock),
}

/// Event: SupplyCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyCreated {
    pub supply_id: SupplyId,
    pub details: SupplyDetails,
    pub initial_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// A single change of on-hand quantity. Every stock event carries one and
/// every one becomes exactly one ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub kind: TransactionKind,
    pub delta: i64,
    pub previous_quantity: u32,
    pub new_quantity: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyEvent {
    Created(SupplyCreated),
    DetailsUpdated {
        details: SupplyDetails,
        occurred_at: DateTime<Utc>,
    },
    StockMoved(StockMovement),
}

impl SupplyEvent {
    pub fn stock_movement(&self) -> Option<&StockMovement> {
        match self {
            SupplyEvent::StockMoved(m) => Some(m),
            _ => None,
        }
    }
}

impl Event for SupplyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplyEvent::Created(_) => "inventory.supply.created",
            SupplyEvent::DetailsUpdated { .. } => "inventory.supply.details_updated",
            SupplyEvent::StockMoved(m) => match m.kind {
                TransactionKind::In => "inventory.supply.stock_in",
                TransactionKind::Out => "inventory.supply.stock_out",
                TransactionKind::Adjustment => "inventory.supply.stock_adjusted",
            },
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplyEvent::Created(e) => e.occurred_at,
            SupplyEvent::DetailsUpdated { occurred_at, .. } => *occurred_at,
            SupplyEvent::StockMoved(m) => m.occurred_at,
        }
    }
}

impl Aggregate for Supply {
    type Command = SupplyCommand;
    type Event = SupplyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplyEvent::Created(e) => {
                self.id = e.supply_id;
                self.details = e.details.clone();
                self.quantity = e.initial_quantity;
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
            }
            SupplyEvent::DetailsUpdated {
                details,
                occurred_at,
            } => {
                self.details = details.clone();
                self.updated_at = *occurred_at;
            }
            SupplyEvent::StockMoved(m) => {
                self.quantity = m.new_quantity;
                self.updated_at = m.occurred_at;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplyCommand::Create(cmd) => self.handle_create(cmd),
            _ if !self.created() => Err(DomainError::not_found()),
            SupplyCommand::Update(cmd) => {
                cmd.details.validate()?;
                Ok(vec![SupplyEvent::DetailsUpdated {
                    details: cmd.details.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
            SupplyCommand::Issue(cmd) => self.handle_issue(cmd),
            SupplyCommand::Receive(cmd) => self.handle_receive(cmd),
            SupplyCommand::Adjust(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl Supply {
    fn handle_create(&self, cmd: &CreateSupply) -> Result<Vec<SupplyEvent>, DomainError> {
        if self.created() {
            return Err(DomainError::conflict("supply already exists"));
        }
        cmd.details.validate()?;
        Ok(vec![SupplyEvent::Created(SupplyCreated {
            supply_id: cmd.supply_id,
            details: cmd.details.clone(),
            initial_quantity: cmd.initial_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<SupplyEvent>, DomainError> {
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if cmd.quantity > self.quantity {
            return Err(DomainError::invariant(format!(
                "insufficient stock for {}: requested {}, available {}",
                self.details.name, cmd.quantity, self.quantity
            )));
        }
        Ok(vec![self.movement(
            TransactionKind::Out,
            -i64::from(cmd.quantity),
            &cmd.reason,
            cmd.occurred_at,
        )?])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<SupplyEvent>, DomainError> {
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(vec![self.movement(
            TransactionKind::In,
            i64::from(cmd.quantity),
            &cmd.reason,
            cmd.occurred_at,
        )?])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<SupplyEvent>, DomainError> {
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("an adjustment needs a reason"));
        }
        Ok(vec![self.movement(
            TransactionKind::Adjustment,
            cmd.delta,
            &cmd.reason,
            cmd.occurred_at,
        )?])
    }

    fn movement(
        &self,
        kind: TransactionKind,
        delta: i64,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<SupplyEvent, DomainError> {
        let new = i64::from(self.quantity)
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("stock quantity out of range"))?;
        if new < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        let new_quantity =
            u32::try_from(new).map_err(|_| DomainError::validation("stock quantity out of range"))?;
        Ok(SupplyEvent::StockMoved(StockMovement {
            kind,
            delta,
            previous_quantity: self.quantity,
            new_quantity,
            reason: reason.to_string(),
            occurred_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use supplydesk_events::execute;

    fn supply_with(quantity: u32) -> Supply {
        let id = SupplyId::new();
        let mut s = Supply::empty(id);
        execute(
            &mut s,
            &SupplyCommand::Create(CreateSupply {
                supply_id: id,
                details: SupplyDetails::named("Projector"),
                initial_quantity: quantity,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        s
    }

    fn issue(n: u32) -> SupplyCommand {
        SupplyCommand::Issue(IssueStock {
            quantity: n,
            reason: "Released".into(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_applies_defaults_and_bumps_version() {
        let s = supply_with(10);
        assert_eq!(s.version, 1);
        assert_eq!(s.details.unit, "pieces");
        assert_eq!(s.details.location, "Main Storage");
        assert_eq!(s.details.min_stock_level, 5);
        assert_eq!(s.stock_status(), StockStatus::InStock);
    }

    #[test]
    fn issue_records_previous_and_new_quantity() {
        let mut s = supply_with(10);
        let events = execute(&mut s, &issue(4)).unwrap();
        let m = events[0].stock_movement().unwrap();
        assert_eq!(m.kind, TransactionKind::Out);
        assert_eq!((m.delta, m.previous_quantity, m.new_quantity), (-4, 10, 6));
        assert_eq!(s.quantity, 6);
        assert_eq!(s.version, 2);
    }

    #[test]
    fn cannot_issue_more_than_on_hand() {
        let mut s = supply_with(2);
        let err = execute(&mut s, &issue(3)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(s.quantity, 2);
        assert_eq!(s.version, 1);
    }

    #[test]
    fn adjustment_cannot_go_negative() {
        let mut s = supply_with(1);
        let cmd = SupplyCommand::Adjust(AdjustStock {
            delta: -2,
            reason: "Damaged".into(),
            occurred_at: Utc::now(),
        });
        assert!(execute(&mut s, &cmd).is_err());
    }

    #[test]
    fn extreme_adjustments_are_rejected_without_overflow() {
        let mut s = supply_with(5);
        for delta in [i64::MAX, i64::from(u32::MAX)] {
            let cmd = SupplyCommand::Adjust(AdjustStock {
                delta,
                reason: "Recount".into(),
                occurred_at: Utc::now(),
            });
            assert!(matches!(execute(&mut s, &cmd), Err(DomainError::Validation(_))));
        }
        assert_eq!((s.quantity, s.version), (5, 1));
    }

    #[test]
    fn unit_cost_is_capped_and_value_never_overflows() {
        let id = SupplyId::new();
        let mut details = SupplyDetails::named("Server rack");
        details.cost_per_unit_cents = i64::MAX;
        let create = SupplyCommand::Create(CreateSupply {
            supply_id: id,
            details,
            initial_quantity: 3,
            occurred_at: Utc::now(),
        });
        let err = execute(&mut Supply::empty(id), &create).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut legacy = supply_with(3);
        legacy.details.cost_per_unit_cents = i64::MAX;
        assert_eq!(legacy.total_value_cents(), i64::MAX);

        let mut priced = supply_with(u32::MAX);
        priced.details.cost_per_unit_cents = MAX_COST_PER_UNIT_CENTS;
        assert_eq!(
            priced.total_value_cents(),
            MAX_COST_PER_UNIT_CENTS * i64::from(u32::MAX)
        );
    }

    #[test]
    fn stock_commands_on_unknown_supply_are_not_found() {
        let mut s = Supply::empty(SupplyId::new());
        assert_eq!(execute(&mut s, &issue(1)).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn stock_status_bands() {
        let mut s = supply_with(0);
        assert_eq!(s.stock_status(), StockStatus::OutOfStock);
        s.quantity = 5;
        assert_eq!(s.stock_status(), StockStatus::LowStock);
        s.quantity = 6;
        assert_eq!(s.stock_status(), StockStatus::InStock);
    }

    proptest! {
        #[test]
        fn quantity_tracks_sum_of_movements(start in 0u32..1000, ops in prop::collection::vec(-50i64..50, 0..30)) {
            let mut s = supply_with(start);
            let mut expected = i64::from(start);
            for delta in ops {
                let cmd = SupplyCommand::Adjust(AdjustStock {
                    delta,
                    reason: "count".into(),
                    occurred_at: Utc::now(),
                });
                if execute(&mut s, &cmd).is_ok() {
                    expected += delta;
                }
                prop_assert!(expected >= 0);
                prop_assert_eq!(i64::from(s.quantity), expected);
            }
        }
    }
}
