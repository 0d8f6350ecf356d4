//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | N/A | `Backend` |
//!
//! ## Optimistic Concurrency
//!
//! Versioned records are written with `UPDATE ... WHERE id = $1 AND version = $expected`;
//! zero affected rows means another writer got there first and the whole
//! changeset transaction is rolled back with `Conflict`.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use supplydesk_auth::{ApprovalStatus, Role, User};
use supplydesk_borrowing::{
    BorrowedItem, QrScanLog, RequestKind, RequestStatus, ScanAction, SupplyRequest,
};
use supplydesk_core::{
    BorrowedItemId, CategoryId, ExpectedVersion, NotificationId, RequestId, ScanLogId, SupplyId,
    TransactionId, UserId,
};
use supplydesk_inventory::{Category, InventoryTransaction, Supply, SupplyDetails, TransactionKind};
use supplydesk_notifications::{Notification, NotificationLevel};

use super::{Changeset, LoanFilter, RequestFilter, StoreError, StoreResult, SupplyDeskStore, Versioned};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Statements are idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn decode_err(operation: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("failed to decode row in {operation}: {e}"))
}

fn to_u32(v: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(v).map_err(|_| StoreError::Backend(format!("column {column} out of range: {v}")))
}

fn bad_enum(column: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected {column} value '{value}'"))
}

fn version_bind(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let approval: String = row.try_get("approval_status")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        role: Role::parse(&role).ok_or_else(|| sqlx::Error::Decode(format!("role '{role}'").into()))?,
        department: row.try_get("department")?,
        approval_status: ApprovalStatus::parse(&approval)
            .ok_or_else(|| sqlx::Error::Decode(format!("approval_status '{approval}'").into()))?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_material: row.try_get("is_material")?,
    })
}

fn supply_from_row(row: &PgRow) -> StoreResult<Supply> {
    let op = decode_err("supply");
    let category: Option<Uuid> = row.try_get("category_id").map_err(&op)?;
    Ok(Supply {
        id: SupplyId::from_uuid(row.try_get("id").map_err(&op)?),
        details: SupplyDetails {
            name: row.try_get("name").map_err(&op)?,
            description: row.try_get("description").map_err(&op)?,
            category_id: category.map(CategoryId::from_uuid),
            min_stock_level: to_u32(row.try_get("min_stock_level").map_err(&op)?, "min_stock_level")?,
            unit: row.try_get("unit").map_err(&op)?,
            cost_per_unit_cents: row.try_get("cost_per_unit_cents").map_err(&op)?,
            location: row.try_get("location").map_err(&op)?,
            is_consumable: row.try_get("is_consumable").map_err(&op)?,
        },
        quantity: to_u32(row.try_get("quantity").map_err(&op)?, "quantity")?,
        created_at: row.try_get("created_at").map_err(&op)?,
        updated_at: row.try_get("updated_at").map_err(&op)?,
        version: row.try_get::<i64, _>("version").map_err(&op)? as u64,
    })
}

fn request_from_row(row: &PgRow) -> StoreResult<SupplyRequest> {
    let op = decode_err("supply_request");
    let kind: String = row.try_get("kind").map_err(&op)?;
    let duration: Option<i64> = row.try_get("borrow_duration_days").map_err(&op)?;
    let kind = match kind.as_str() {
        "consumable" => RequestKind::Consumable,
        "borrowing" => RequestKind::Borrowing {
            duration_days: to_u32(duration.unwrap_or(3), "borrow_duration_days")?,
        },
        other => return Err(bad_enum("kind", other)),
    };
    let status: String = row.try_get("status").map_err(&op)?;
    let opt_user = |col: &str| -> StoreResult<Option<UserId>> {
        let v: Option<Uuid> = row.try_get(col).map_err(&op)?;
        Ok(v.map(UserId::from_uuid))
    };
    Ok(SupplyRequest {
        id: RequestId::from_uuid(row.try_get("id").map_err(&op)?),
        code: row.try_get("code").map_err(&op)?,
        requester: UserId::from_uuid(row.try_get("requester_id").map_err(&op)?),
        supply_id: SupplyId::from_uuid(row.try_get("supply_id").map_err(&op)?),
        quantity_requested: to_u32(row.try_get("quantity_requested").map_err(&op)?, "quantity_requested")?,
        purpose: row.try_get("purpose").map_err(&op)?,
        kind,
        status: RequestStatus::parse(&status).ok_or_else(|| bad_enum("status", &status))?,
        approved_by: opt_user("approved_by")?,
        approved_at: row.try_get("approved_at").map_err(&op)?,
        released_by: opt_user("released_by")?,
        released_at: row.try_get("released_at").map_err(&op)?,
        rejection_reason: row.try_get("rejection_reason").map_err(&op)?,
        requested_location: row.try_get("requested_location").map_err(&op)?,
        created_at: row.try_get("created_at").map_err(&op)?,
        updated_at: row.try_get("updated_at").map_err(&op)?,
        version: row.try_get::<i64, _>("version").map_err(&op)? as u64,
    })
}

fn loan_from_row(row: &PgRow) -> StoreResult<BorrowedItem> {
    let op = decode_err("borrowed_item");
    let request: Option<Uuid> = row.try_get("request_id").map_err(&op)?;
    Ok(BorrowedItem {
        id: BorrowedItemId::from_uuid(row.try_get("id").map_err(&op)?),
        supply_id: SupplyId::from_uuid(row.try_get("supply_id").map_err(&op)?),
        borrower: UserId::from_uuid(row.try_get("borrower_id").map_err(&op)?),
        request_id: request.map(RequestId::from_uuid),
        borrowed_date: row.try_get("borrowed_date").map_err(&op)?,
        borrowed_at: row.try_get("borrowed_at").map_err(&op)?,
        returned_at: row.try_get("returned_at").map_err(&op)?,
        quantity: to_u32(row.try_get("quantity").map_err(&op)?, "quantity")?,
        location_when_borrowed: row.try_get("location_when_borrowed").map_err(&op)?,
        location_when_returned: row.try_get("location_when_returned").map_err(&op)?,
        notes: row.try_get("notes").map_err(&op)?,
        return_deadline: row.try_get("return_deadline").map_err(&op)?,
        borrow_duration_days: to_u32(row.try_get("borrow_duration_days").map_err(&op)?, "borrow_duration_days")?,
        version: row.try_get::<i64, _>("version").map_err(&op)? as u64,
    })
}

fn transaction_from_row(row: &PgRow) -> StoreResult<InventoryTransaction> {
    let op = decode_err("inventory_transaction");
    let kind: String = row.try_get("kind").map_err(&op)?;
    Ok(InventoryTransaction {
        id: TransactionId::from_uuid(row.try_get("id").map_err(&op)?),
        supply_id: SupplyId::from_uuid(row.try_get("supply_id").map_err(&op)?),
        kind: TransactionKind::parse(&kind).ok_or_else(|| bad_enum("kind", &kind))?,
        quantity: row.try_get("quantity").map_err(&op)?,
        previous_quantity: to_u32(row.try_get("previous_quantity").map_err(&op)?, "previous_quantity")?,
        new_quantity: to_u32(row.try_get("new_quantity").map_err(&op)?, "new_quantity")?,
        reason: row.try_get("reason").map_err(&op)?,
        performed_by: UserId::from_uuid(row.try_get("performed_by").map_err(&op)?),
        created_at: row.try_get("created_at").map_err(&op)?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    let op = decode_err("notification");
    let level: String = row.try_get("level").map_err(&op)?;
    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get("id").map_err(&op)?),
        recipient: UserId::from_uuid(row.try_get("recipient_id").map_err(&op)?),
        title: row.try_get("title").map_err(&op)?,
        message: row.try_get("message").map_err(&op)?,
        url: row.try_get("url").map_err(&op)?,
        level: NotificationLevel::parse(&level).ok_or_else(|| bad_enum("level", &level))?,
        is_read: row.try_get("is_read").map_err(&op)?,
        created_at: row.try_get("created_at").map_err(&op)?,
    })
}

fn scan_from_row(row: &PgRow) -> StoreResult<QrScanLog> {
    let op = decode_err("qr_scan_log");
    let action: String = row.try_get("action").map_err(&op)?;
    Ok(QrScanLog {
        id: ScanLogId::from_uuid(row.try_get("id").map_err(&op)?),
        supply_id: SupplyId::from_uuid(row.try_get("supply_id").map_err(&op)?),
        scanned_by: UserId::from_uuid(row.try_get("scanned_by").map_err(&op)?),
        action: ScanAction::parse(&action).ok_or_else(|| bad_enum("action", &action))?,
        location: row.try_get("location").map_err(&op)?,
        notes: row.try_get("notes").map_err(&op)?,
        scanned_at: row.try_get("scanned_at").map_err(&op)?,
    })
}

fn collect<T>(rows: Vec<PgRow>, f: impl Fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(f).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Versioned writes
// ─────────────────────────────────────────────────────────────────────────────

fn ensure_applied(affected: u64, kind: &str, id: impl core::fmt::Display, expected: ExpectedVersion) -> StoreResult<()> {
    if affected == 0 {
        return Err(StoreError::Conflict(format!(
            "{kind} {id} was modified concurrently (expected {expected:?})"
        )));
    }
    Ok(())
}

/// `Exact(0)` inserts, `Exact(n)` updates guarded by version, `Any` updates unguarded.
fn write_mode(expected: ExpectedVersion) -> (bool, Option<i64>) {
    match expected {
        ExpectedVersion::Exact(0) => (true, None),
        ExpectedVersion::Exact(v) => (false, Some(version_bind(v))),
        ExpectedVersion::Any => (false, None),
    }
}

async fn write_supply(tx: &mut Transaction<'_, Postgres>, v: &Versioned<Supply>) -> StoreResult<()> {
    let s = &v.record;
    let (insert, guard) = write_mode(v.expected);
    let sql = if insert {
        r#"
        INSERT INTO supplies (id, name, description, category_id, quantity, min_stock_level, unit,
                              cost_per_unit_cents, location, is_consumable, created_at, updated_at, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#
    } else {
        r#"
        UPDATE supplies SET name = $2, description = $3, category_id = $4, quantity = $5,
               min_stock_level = $6, unit = $7, cost_per_unit_cents = $8, location = $9,
               is_consumable = $10, created_at = $11, updated_at = $12, version = $13
        WHERE id = $1 AND ($14::BIGINT IS NULL OR version = $14)
        "#
    };
    let mut q = sqlx::query(sql)
        .bind(s.id.as_uuid())
        .bind(&s.details.name)
        .bind(&s.details.description)
        .bind(s.details.category_id.map(|c| *c.as_uuid()))
        .bind(i64::from(s.quantity))
        .bind(i64::from(s.details.min_stock_level))
        .bind(&s.details.unit)
        .bind(s.details.cost_per_unit_cents)
        .bind(&s.details.location)
        .bind(s.details.is_consumable)
        .bind(s.created_at)
        .bind(s.updated_at)
        .bind(version_bind(s.version));
    if !insert {
        q = q.bind(guard);
    }
    let res = q.execute(&mut **tx).await.map_err(|e| map_sqlx_error("write_supply", e))?;
    ensure_applied(res.rows_affected(), "supply", s.id, v.expected)
}

async fn write_request(tx: &mut Transaction<'_, Postgres>, v: &Versioned<SupplyRequest>) -> StoreResult<()> {
    let r = &v.record;
    let (insert, guard) = write_mode(v.expected);
    let sql = if insert {
        r#"
        INSERT INTO supply_requests (id, code, requester_id, supply_id, quantity_requested, purpose, kind,
                                     borrow_duration_days, status, approved_by, approved_at, released_by,
                                     released_at, rejection_reason, requested_location, created_at, updated_at, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#
    } else {
        r#"
        UPDATE supply_requests SET code = $2, requester_id = $3, supply_id = $4, quantity_requested = $5,
               purpose = $6, kind = $7, borrow_duration_days = $8, status = $9, approved_by = $10,
               approved_at = $11, released_by = $12, released_at = $13, rejection_reason = $14,
               requested_location = $15, created_at = $16, updated_at = $17, version = $18
        WHERE id = $1 AND ($19::BIGINT IS NULL OR version = $19)
        "#
    };
    let mut q = sqlx::query(sql)
        .bind(r.id.as_uuid())
        .bind(&r.code)
        .bind(r.requester.as_uuid())
        .bind(r.supply_id.as_uuid())
        .bind(i64::from(r.quantity_requested))
        .bind(&r.purpose)
        .bind(r.kind.as_str())
        .bind(r.kind.duration_days().map(i64::from))
        .bind(r.status.as_str())
        .bind(r.approved_by.map(|u| *u.as_uuid()))
        .bind(r.approved_at)
        .bind(r.released_by.map(|u| *u.as_uuid()))
        .bind(r.released_at)
        .bind(&r.rejection_reason)
        .bind(&r.requested_location)
        .bind(r.created_at)
        .bind(r.updated_at)
        .bind(version_bind(r.version));
    if !insert {
        q = q.bind(guard);
    }
    let res = q.execute(&mut **tx).await.map_err(|e| map_sqlx_error("write_request", e))?;
    ensure_applied(res.rows_affected(), "request", r.id, v.expected)
}

async fn write_loan(tx: &mut Transaction<'_, Postgres>, v: &Versioned<BorrowedItem>) -> StoreResult<()> {
    let l = &v.record;
    let (insert, guard) = write_mode(v.expected);
    let sql = if insert {
        r#"
        INSERT INTO borrowed_items (id, supply_id, borrower_id, request_id, borrowed_date, borrowed_at,
                                    returned_at, quantity, location_when_borrowed, location_when_returned,
                                    notes, return_deadline, borrow_duration_days, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#
    } else {
        r#"
        UPDATE borrowed_items SET supply_id = $2, borrower_id = $3, request_id = $4, borrowed_date = $5,
               borrowed_at = $6, returned_at = $7, quantity = $8, location_when_borrowed = $9,
               location_when_returned = $10, notes = $11, return_deadline = $12,
               borrow_duration_days = $13, version = $14
        WHERE id = $1 AND ($15::BIGINT IS NULL OR version = $15)
        "#
    };
    let mut q = sqlx::query(sql)
        .bind(l.id.as_uuid())
        .bind(l.supply_id.as_uuid())
        .bind(l.borrower.as_uuid())
        .bind(l.request_id.map(|r| *r.as_uuid()))
        .bind(l.borrowed_date)
        .bind(l.borrowed_at)
        .bind(l.returned_at)
        .bind(i64::from(l.quantity))
        .bind(&l.location_when_borrowed)
        .bind(&l.location_when_returned)
        .bind(&l.notes)
        .bind(l.return_deadline)
        .bind(i64::from(l.borrow_duration_days))
        .bind(version_bind(l.version));
    if !insert {
        q = q.bind(guard);
    }
    let res = q.execute(&mut **tx).await.map_err(|e| map_sqlx_error("write_loan", e))?;
    ensure_applied(res.rows_affected(), "borrowed item", l.id, v.expected)
}

#[async_trait]
impl SupplyDeskStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(decode_err("get_user"))
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        collect(rows, |r| user_from_row(r).map_err(decode_err("list_users")))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn save_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, full_name, role, department, approval_status, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                full_name = EXCLUDED.full_name,
                role = EXCLUDED.role,
                department = EXCLUDED.department,
                approval_status = EXCLUDED.approval_status,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(user.approval_status.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref()
            .map(category_from_row)
            .transpose()
            .map_err(decode_err("get_category"))
    }

    #[instrument(skip(self), err)]
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        collect(rows, |r| category_from_row(r).map_err(decode_err("list_categories")))
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn save_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, is_material)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                is_material = EXCLUDED.is_material
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_material)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_category", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        // ON DELETE RESTRICT turns "still in use" into a 23503 -> Conflict.
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_supply(&self, id: SupplyId) -> StoreResult<Option<Supply>> {
        let row = sqlx::query("SELECT * FROM supplies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_supply", e))?;
        row.as_ref().map(supply_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>> {
        let rows = sqlx::query("SELECT * FROM supplies ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_supplies", e))?;
        collect(rows, supply_from_row)
    }

    #[instrument(skip(self), err)]
    async fn delete_supply(&self, id: SupplyId) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM supplies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_supply", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("supply {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_request(&self, id: RequestId) -> StoreResult<Option<SupplyRequest>> {
        let row = sqlx::query("SELECT * FROM supply_requests WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_request", e))?;
        row.as_ref().map(request_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<SupplyRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM supply_requests
            WHERE ($1::UUID IS NULL OR requester_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::UUID IS NULL OR supply_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.requester.map(|u| *u.as_uuid()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.supply.map(|s| *s.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_requests", e))?;
        collect(rows, request_from_row)
    }

    #[instrument(skip(self), err)]
    async fn get_loan(&self, id: BorrowedItemId) -> StoreResult<Option<BorrowedItem>> {
        let row = sqlx::query("SELECT * FROM borrowed_items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_loan", e))?;
        row.as_ref().map(loan_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_loans(&self, filter: &LoanFilter) -> StoreResult<Vec<BorrowedItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM borrowed_items
            WHERE ($1::UUID IS NULL OR borrower_id = $1)
              AND ($2::UUID IS NULL OR supply_id = $2)
              AND ($3::BOOLEAN IS NULL OR (returned_at IS NOT NULL) = $3)
            ORDER BY borrowed_at DESC
            "#,
        )
        .bind(filter.borrower.map(|u| *u.as_uuid()))
        .bind(filter.supply.map(|s| *s.as_uuid()))
        .bind(filter.returned)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_loans", e))?;
        collect(rows, loan_from_row)
    }

    #[instrument(skip(self), err)]
    async fn list_transactions(&self, supply: Option<SupplyId>) -> StoreResult<Vec<InventoryTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM inventory_transactions
            WHERE ($1::UUID IS NULL OR supply_id = $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(supply.map(|s| *s.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;
        collect(rows, transaction_from_row)
    }

    #[instrument(skip(self), err)]
    async fn list_notifications(&self, recipient: UserId, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(recipient.as_uuid())
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_notifications", e))?;
        collect(rows, notification_from_row)
    }

    #[instrument(skip(self), err)]
    async fn mark_all_read(&self, recipient: UserId) -> StoreResult<u64> {
        let res = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND NOT is_read")
            .bind(recipient.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_all_read", e))?;
        Ok(res.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn recent_scans(&self, limit: usize) -> StoreResult<Vec<QrScanLog>> {
        let rows = sqlx::query("SELECT * FROM qr_scan_logs ORDER BY scanned_at DESC, id DESC LIMIT $1")
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("recent_scans", e))?;
        collect(rows, scan_from_row)
    }

    #[instrument(
        skip(self, changes),
        fields(
            supplies = changes.supplies.len(),
            requests = changes.requests.len(),
            loans = changes.loans.len(),
            transactions = changes.transactions.len(),
            notifications = changes.notifications.len()
        ),
        err
    )]
    async fn commit(&self, changes: Changeset) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Dropping `tx` on an early return rolls the transaction back.
        for v in &changes.supplies {
            write_supply(&mut tx, v).await?;
        }
        for v in &changes.requests {
            write_request(&mut tx, v).await?;
        }
        for v in &changes.loans {
            write_loan(&mut tx, v).await?;
        }
        for (id, expected) in &changes.deleted_loans {
            let guard = match expected {
                ExpectedVersion::Exact(v) => Some(version_bind(*v)),
                ExpectedVersion::Any => None,
            };
            let res = sqlx::query("DELETE FROM borrowed_items WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)")
                .bind(id.as_uuid())
                .bind(guard)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_loan", e))?;
            ensure_applied(res.rows_affected(), "borrowed item", id, *expected)?;
        }
        for t in &changes.transactions {
            sqlx::query(
                r#"
                INSERT INTO inventory_transactions
                    (id, supply_id, kind, quantity, previous_quantity, new_quantity, reason, performed_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(t.id.as_uuid())
            .bind(t.supply_id.as_uuid())
            .bind(t.kind.as_str())
            .bind(t.quantity)
            .bind(i64::from(t.previous_quantity))
            .bind(i64::from(t.new_quantity))
            .bind(&t.reason)
            .bind(t.performed_by.as_uuid())
            .bind(t.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        }
        for n in &changes.notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, recipient_id, title, message, url, level, is_read, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(n.id.as_uuid())
            .bind(n.recipient.as_uuid())
            .bind(&n.title)
            .bind(&n.message)
            .bind(&n.url)
            .bind(n.level.as_str())
            .bind(n.is_read)
            .bind(n.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_notification", e))?;
        }
        for s in &changes.scan_logs {
            sqlx::query(
                r#"
                INSERT INTO qr_scan_logs (id, supply_id, scanned_by, action, location, notes, scanned_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(s.id.as_uuid())
            .bind(s.supply_id.as_uuid())
            .bind(s.scanned_by.as_uuid())
            .bind(s.action.as_str())
            .bind(&s.location)
            .bind(&s.notes)
            .bind(s.scanned_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_scan_log", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}
