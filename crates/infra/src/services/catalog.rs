//! Categories, supplies and manual stock operations.

use serde::{Deserialize, Serialize};
use tracing::info;

use supplydesk_borrowing::QrPayload;
use supplydesk_core::{CategoryId, DomainError, ExpectedVersion, SupplyId, UserId};
use supplydesk_events::execute;
use supplydesk_inventory::{
    AdjustStock, Category, CreateSupply, InventoryTransaction, ReceiveStock, StockMovement, Supply,
    SupplyCommand, SupplyDetails, TransactionKind, UpdateSupply,
};

use super::{now, ServiceError, ServiceResult, SupplyDesk};
use crate::media::StoredQr;
use crate::store::{Changeset, Versioned};

pub const DEFAULT_RESTOCK_REASON: &str = "Restock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupply {
    #[serde(flatten)]
    pub details: SupplyDetails,
    #[serde(default)]
    pub initial_quantity: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyQuery {
    /// Case-insensitive match on name, description or location.
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub low_stock_only: bool,
    pub consumable: Option<bool>,
}

impl SupplyQuery {
    fn matches(&self, s: &Supply) -> bool {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        search.is_none_or(|q| {
            s.details.name.to_lowercase().contains(&q)
                || s.details.description.to_lowercase().contains(&q)
                || s.details.location.to_lowercase().contains(&q)
        }) && self.category.is_none_or(|c| s.details.category_id == Some(c))
            && (!self.low_stock_only || s.is_low_stock())
            && self.consumable.is_none_or(|c| s.details.is_consumable == c)
    }
}

impl SupplyDesk {
    // ── categories ──────────────────────────────────────────────────────

    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn create_category(
        &self,
        name: &str,
        description: &str,
        is_material: bool,
    ) -> ServiceResult<Category> {
        let category = Category::new(CategoryId::new(), name, description, is_material)?;
        self.store.save_category(&category).await?;
        info!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: CategoryId,
        name: &str,
        description: &str,
        is_material: bool,
    ) -> ServiceResult<Category> {
        let mut category = self
            .store
            .get_category(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {id}")))?;
        category.rename(name)?;
        category.description = description.trim().to_string();
        category.is_material = is_material;
        self.store.save_category(&category).await?;
        Ok(category)
    }

    pub async fn delete_category(&self, id: CategoryId) -> ServiceResult<()> {
        self.store.delete_category(id).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn ensure_category(&self, id: Option<CategoryId>) -> ServiceResult<()> {
        if let Some(id) = id {
            if self.store.get_category(id).await?.is_none() {
                return Err(DomainError::validation(format!("unknown category {id}")).into());
            }
        }
        Ok(())
    }

    // ── supplies ────────────────────────────────────────────────────────

    pub async fn list_supplies(&self, query: &SupplyQuery) -> ServiceResult<Vec<Supply>> {
        let all = self.store.list_supplies().await?;
        Ok(all.into_iter().filter(|s| query.matches(s)).collect())
    }

    pub async fn get_supply(&self, id: SupplyId) -> ServiceResult<Supply> {
        self.load_supply(id).await
    }

    /// Opening stock is booked as an `in` ledger line.
    pub async fn create_supply(&self, actor: UserId, input: NewSupply) -> ServiceResult<Supply> {
        self.ensure_category(input.details.category_id).await?;
        let id = SupplyId::new();
        let at = now();
        let mut supply = Supply::empty(id);
        execute(
            &mut supply,
            &SupplyCommand::Create(CreateSupply {
                supply_id: id,
                details: input.details,
                initial_quantity: input.initial_quantity,
                occurred_at: at,
            }),
        )?;

        let mut cs = Changeset::new();
        cs.supplies.push(Versioned::insert(supply.clone()));
        if input.initial_quantity > 0 {
            let opening = StockMovement {
                kind: TransactionKind::In,
                delta: i64::from(input.initial_quantity),
                previous_quantity: 0,
                new_quantity: input.initial_quantity,
                reason: "Initial stock".to_string(),
                occurred_at: at,
            };
            cs.transactions.push(InventoryTransaction::record(id, &opening, actor));
        }
        self.store.commit(cs).await?;
        info!(supply_id = %id, name = supply.name(), quantity = supply.quantity, "supply created");
        Ok(supply)
    }

    /// Descriptive fields only; stock moves through restock/adjust/release.
    pub async fn update_supply(&self, id: SupplyId, details: SupplyDetails) -> ServiceResult<Supply> {
        self.ensure_category(details.category_id).await?;
        let mut supply = self.load_supply(id).await?;
        let expected = supply.version;
        execute(
            &mut supply,
            &SupplyCommand::Update(UpdateSupply {
                details,
                occurred_at: now(),
            }),
        )?;
        let mut cs = Changeset::new();
        cs.supplies.push(Versioned::new(supply.clone(), ExpectedVersion::Exact(expected)));
        self.store.commit(cs).await?;
        Ok(supply)
    }

    pub async fn delete_supply(&self, id: SupplyId) -> ServiceResult<()> {
        self.store.delete_supply(id).await?;
        info!(supply_id = %id, "supply deleted");
        Ok(())
    }

    pub async fn restock(
        &self,
        actor: UserId,
        id: SupplyId,
        quantity: u32,
        reason: Option<String>,
    ) -> ServiceResult<Supply> {
        if quantity == 0 {
            return Err(DomainError::validation("restock quantity must be greater than zero").into());
        }
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESTOCK_REASON.to_string());
        let mut supply = self.load_supply(id).await?;
        let mut cs = Changeset::new();
        self.move_stock(
            &mut cs,
            &mut supply,
            SupplyCommand::Receive(ReceiveStock {
                quantity,
                reason,
                occurred_at: now(),
            }),
            actor,
        )
        .await?;
        self.store.commit(cs).await?;
        info!(supply_id = %id, quantity, new_quantity = supply.quantity, "supply restocked");
        Ok(supply)
    }

    /// Signed correction for lost, damaged or miscounted stock.
    pub async fn adjust_stock(
        &self,
        actor: UserId,
        id: SupplyId,
        delta: i64,
        reason: &str,
    ) -> ServiceResult<Supply> {
        if reason.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason is required").into());
        }
        let mut supply = self.load_supply(id).await?;
        let mut cs = Changeset::new();
        self.move_stock(
            &mut cs,
            &mut supply,
            SupplyCommand::Adjust(AdjustStock {
                delta,
                reason: reason.trim().to_string(),
                occurred_at: now(),
            }),
            actor,
        )
        .await?;
        self.store.commit(cs).await?;
        info!(supply_id = %id, delta, new_quantity = supply.quantity, "stock adjusted");
        Ok(supply)
    }

    pub async fn list_transactions(&self, supply: Option<SupplyId>) -> ServiceResult<Vec<InventoryTransaction>> {
        Ok(self.store.list_transactions(supply).await?)
    }

    /// Render the supply label QR into the media directory.
    pub async fn generate_supply_qr(&self, id: SupplyId) -> ServiceResult<StoredQr> {
        let supply = self.load_supply(id).await?;
        let payload = QrPayload::Supply {
            supply_id: supply.id,
            name: supply.details.name.clone(),
        };
        Ok(self.media.write_supply_qr(supply.id, &payload).await?)
    }
}
