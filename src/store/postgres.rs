use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::catalog::CatalogItemId;
use crate::domain::errors::RepositoryError;
use crate::domain::order::{
    Address, CatalogItemOrdered, Money, Order, OrderId, OrderItem, OrderItemId, OrderRepository,
};
use crate::outbox::{NotificationChannel, OutboxEntry, OutboxStatus, OutboxStore};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// orders ──< order_items
//   └─────< notification_outbox   (UNIQUE order_id, channel)
//
// `add` writes all three tables in one transaction. Order and order item ids
// come from BIGSERIALs, so they are positive and increase with every
// successful write.
//
// Claims use `FOR UPDATE SKIP LOCKED`, so concurrent dispatchers sharing the
// database never claim the same entry. Settling an entry is conditional on
// `status = 'in_flight'`.
//
// ============================================================================

const SCHEMA: [&str; 4] = [
    r"
    CREATE TABLE IF NOT EXISTS orders (
        id            BIGSERIAL PRIMARY KEY,
        buyer_id      TEXT NOT NULL,
        order_date    TIMESTAMPTZ NOT NULL,
        ship_street   TEXT NOT NULL,
        ship_city     TEXT NOT NULL,
        ship_state    TEXT NOT NULL,
        ship_country  TEXT NOT NULL,
        ship_zip_code TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS order_items (
        id               BIGSERIAL PRIMARY KEY,
        order_id         BIGINT NOT NULL REFERENCES orders(id),
        line_no          INT NOT NULL,
        catalog_item_id  BIGINT NOT NULL,
        product_name     TEXT NOT NULL,
        picture_uri      TEXT NOT NULL,
        unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0),
        units            INT NOT NULL CHECK (units > 0),
        UNIQUE (order_id, line_no)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS notification_outbox (
        id         UUID PRIMARY KEY,
        order_id   BIGINT NOT NULL REFERENCES orders(id),
        channel    TEXT NOT NULL,
        status     TEXT NOT NULL,
        attempts   INT NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        claimed_at TIMESTAMPTZ,
        UNIQUE (order_id, channel)
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS notification_outbox_pending
        ON notification_outbox (status, created_at)
    ",
];

const OUTBOX_COLUMNS: &str = "id, order_id, channel, status, attempts, last_error, created_at, claimed_at";

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections = max_connections, "✅ Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Order schema ready");
        Ok(())
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT id, catalog_item_id, product_name, picture_uri, unit_price_cents, units
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no
            ",
        )
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_item_from_row).collect()
    }
}

fn order_item_from_row(row: &PgRow) -> Result<OrderItem, RepositoryError> {
    let ordered = CatalogItemOrdered::new(
        CatalogItemId(row.try_get("catalog_item_id")?),
        row.try_get::<String, _>("product_name")?,
        row.try_get::<String, _>("picture_uri")?,
    );

    let item = OrderItem::new(
        ordered,
        Money::from_cents(row.try_get("unit_price_cents")?),
        row.try_get("units")?,
    )
    .map_err(|e| RepositoryError::Corrupt(format!("order item: {e}")))?;

    Ok(item.with_id(OrderItemId(row.try_get("id")?)))
}

fn outbox_entry_from_row(row: &PgRow) -> Result<OutboxEntry, RepositoryError> {
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        order_id: OrderId(row.try_get("order_id")?),
        channel: row.try_get::<String, _>("channel")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        claimed_at: row.try_get("claimed_at")?,
    })
}

/// `RETURNING` gives no ordering guarantee
fn oldest_first(rows: &[PgRow]) -> Result<Vec<OutboxEntry>, RepositoryError> {
    let mut entries = rows.iter().map(outbox_entry_from_row).collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| (e.created_at, e.id));
    Ok(entries)
}

#[async_trait]
impl OrderRepository for PgOrderStore {
    async fn add(&self, order: Order, notifications: &[NotificationChannel]) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let address = order.ship_to_address();

        let id: i64 = sqlx::query(
            r"
            INSERT INTO orders (
                buyer_id, order_date, ship_street, ship_city, ship_state, ship_country, ship_zip_code
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(order.buyer_id())
        .bind(order.order_date())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country)
        .bind(&address.zip_code)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        let mut item_ids = Vec::with_capacity(order.items().len());
        for (line_no, item) in order.items().iter().enumerate() {
            let item_id: i64 = sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, line_no, catalog_item_id, product_name, picture_uri, unit_price_cents, units
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                ",
            )
            .bind(id)
            .bind(line_no as i32)
            .bind(item.item_ordered().catalog_item_id().0)
            .bind(item.item_ordered().product_name())
            .bind(item.item_ordered().picture_uri())
            .bind(item.unit_price().cents())
            .bind(item.units())
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;
            item_ids.push(OrderItemId(item_id));
        }

        for channel in notifications {
            let entry = OutboxEntry::pending(OrderId(id), *channel);
            sqlx::query(
                r"
                INSERT INTO notification_outbox (id, order_id, channel, status, attempts, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(entry.id)
            .bind(id)
            .bind(entry.channel.as_str())
            .bind(entry.status.as_str())
            .bind(entry.attempts)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(order_id = id, items = order.items().len(), "Order row committed");
        Ok(order.with_id(OrderId(id)).with_item_ids(item_ids))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT buyer_id, order_date, ship_street, ship_city, ship_state, ship_country, ship_zip_code
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let address = Address::new(
            row.try_get::<String, _>("ship_street")?,
            row.try_get::<String, _>("ship_city")?,
            row.try_get::<String, _>("ship_state")?,
            row.try_get::<String, _>("ship_country")?,
            row.try_get::<String, _>("ship_zip_code")?,
        );
        let order_date: DateTime<Utc> = row.try_get("order_date")?;
        let buyer_id: String = row.try_get("buyer_id")?;
        let items = self.load_items(id).await?;

        Order::restore(id, buyer_id, order_date, address, items)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupt(format!("order {id}: {e}")))
    }
}

#[async_trait]
impl OutboxStore for PgOrderStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE status = $1 ORDER BY created_at, id LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(OutboxStatus::Pending.as_str())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(outbox_entry_from_row).collect()
    }

    async fn claim_pending(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE notification_outbox
            SET status = $1, claimed_at = now()
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE status = $2 OR (status = $1 AND claimed_at < $3)
                ORDER BY created_at, id
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {OUTBOX_COLUMNS}
            "
        );
        let rows = sqlx::query(&sql)
            .bind(OutboxStatus::InFlight.as_str())
            .bind(OutboxStatus::Pending.as_str())
            .bind(stale_before)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        oldest_first(&rows)
    }

    async fn claim_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE notification_outbox
            SET status = $1, claimed_at = now()
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE order_id = $2 AND status = $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {OUTBOX_COLUMNS}
            "
        );
        let rows = sqlx::query(&sql)
            .bind(OutboxStatus::InFlight.as_str())
            .bind(order_id.0)
            .bind(OutboxStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?;

        oldest_first(&rows)
    }

    async fn mark_delivered(&self, entry_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE notification_outbox
            SET status = $2, claimed_at = NULL
            WHERE id = $1 AND status = $3
            ",
        )
        .bind(entry_id)
        .bind(OutboxStatus::Delivered.as_str())
        .bind(OutboxStatus::InFlight.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(&self, entry_id: Uuid, error: &str) -> Result<Option<i32>, RepositoryError> {
        let row = sqlx::query(
            r"
            UPDATE notification_outbox
            SET status = $2, claimed_at = NULL, attempts = attempts + 1, last_error = $3
            WHERE id = $1 AND status = $4
            RETURNING attempts
            ",
        )
        .bind(entry_id)
        .bind(OutboxStatus::Pending.as_str())
        .bind(error)
        .bind(OutboxStatus::InFlight.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("attempts")?)),
            None => Ok(None),
        }
    }

    async fn mark_dead_lettered(&self, entry_id: Uuid, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE notification_outbox
            SET status = $2, claimed_at = NULL, attempts = attempts + 1, last_error = $3
            WHERE id = $1 AND status = $4
            ",
        )
        .bind(entry_id)
        .bind(OutboxStatus::DeadLettered.as_str())
        .bind(error)
        .bind(OutboxStatus::InFlight.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Tests - run against the database in DATABASE_URL, skipped when it is unset.
// Each test works in its own schema, dropped at the end.
// ============================================================================
