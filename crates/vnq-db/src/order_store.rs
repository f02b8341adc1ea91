//! Postgres-backed [`OrderStore`].
//!
//! Backs the `vnq-execution::OrderStore` port directly with plain
//! `sqlx::query` + `try_get` calls -- `place_order` submits to the broker
//! synchronously, so there is no separate dispatch loop to claim work
//! from.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use vnq_execution::OrderStore;
use vnq_schemas::{Order, OrderStatus, OrderType, Price, Quantity, Side, Symbol};

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn side_to_str(s: Side) -> &'static str {
    match s {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn side_from_str(s: &str) -> Result<Side> {
    match s {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(anyhow!("invalid order side in db row: {other}")),
    }
}

fn order_type_to_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Lo => "LO",
        OrderType::Ato => "ATO",
        OrderType::Atc => "ATC",
        OrderType::Mp => "MP",
    }
}

fn order_type_from_str(s: &str) -> Result<OrderType> {
    match s {
        "LO" => Ok(OrderType::Lo),
        "ATO" => Ok(OrderType::Ato),
        "ATC" => Ok(OrderType::Atc),
        "MP" => Ok(OrderType::Mp),
        other => Err(anyhow!("invalid order type in db row: {other}")),
    }
}

fn status_to_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Created => "CREATED",
        OrderStatus::Pending => "PENDING",
        OrderStatus::PartialFill => "PARTIAL_FILL",
        OrderStatus::Matched => "MATCHED",
        OrderStatus::Rejected => "REJECTED",
        OrderStatus::BrokerRejected => "BROKER_REJECTED",
        OrderStatus::Cancelled => "CANCELLED",
    }
}

fn status_from_str(s: &str) -> Result<OrderStatus> {
    match s {
        "CREATED" => Ok(OrderStatus::Created),
        "PENDING" => Ok(OrderStatus::Pending),
        "PARTIAL_FILL" => Ok(OrderStatus::PartialFill),
        "MATCHED" => Ok(OrderStatus::Matched),
        "REJECTED" => Ok(OrderStatus::Rejected),
        "BROKER_REJECTED" => Ok(OrderStatus::BrokerRejected),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        other => Err(anyhow!("invalid order status in db row: {other}")),
    }
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        order_id: row.try_get("order_id")?,
        symbol: Symbol::new(row.try_get::<String, _>("symbol")?),
        side: side_from_str(&row.try_get::<String, _>("side")?)?,
        order_type: order_type_from_str(&row.try_get::<String, _>("order_type")?)?,
        quantity: Quantity::new(row.try_get("quantity")?),
        limit_price: Price::parse(&row.try_get::<String, _>("limit_price")?)?,
        ceiling_price: Price::parse(&row.try_get::<String, _>("ceiling_price")?)?,
        floor_price: Price::parse(&row.try_get::<String, _>("floor_price")?)?,
        status: status_from_str(&row.try_get::<String, _>("status")?)?,
        filled_quantity: Quantity::new(row.try_get("filled_quantity")?),
        avg_fill_price: Price::parse(&row.try_get::<String, _>("avg_fill_price")?)?,
        broker_order_id: row.try_get("broker_order_id")?,
        rejection_reason: row.try_get("rejection_reason")?,
        idempotency_key: row.try_get("idempotency_key")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("select * from orders where idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("find_by_idempotency_key failed")?;

        row.as_ref().map(row_to_order).transpose()
    }

    /// `ON CONFLICT (idempotency_key) DO NOTHING RETURNING` makes the
    /// insert itself the race arbiter: exactly one concurrent caller per
    /// key gets a row back, the rest get `None` and must treat the
    /// existing row (fetched separately by the caller) as authoritative.
    async fn insert(&self, order: &Order) -> anyhow::Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            insert into orders (
              order_id, symbol, side, order_type, quantity,
              limit_price, ceiling_price, floor_price,
              status, filled_quantity, avg_fill_price,
              broker_order_id, rejection_reason, idempotency_key,
              created_at, updated_at
            ) values (
              $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16
            )
            on conflict (idempotency_key) do nothing
            returning order_id
            "#,
        )
        .bind(&order.order_id)
        .bind(order.symbol.as_str())
        .bind(side_to_str(order.side))
        .bind(order_type_to_str(order.order_type))
        .bind(order.quantity.raw())
        .bind(order.limit_price.to_wire_string())
        .bind(order.ceiling_price.to_wire_string())
        .bind(order.floor_price.to_wire_string())
        .bind(status_to_str(order.status))
        .bind(order.filled_quantity.raw())
        .bind(order.avg_fill_price.to_wire_string())
        .bind(&order.broker_order_id)
        .bind(&order.rejection_reason)
        .bind(&order.idempotency_key)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await
        .context("order insert failed")?;

        Ok(row.is_some())
    }

    async fn update(&self, order: &Order) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            update orders set
              status           = $2,
              filled_quantity  = $3,
              avg_fill_price   = $4,
              broker_order_id  = $5,
              rejection_reason = $6,
              updated_at       = $7
            where order_id = $1
            "#,
        )
        .bind(&order.order_id)
        .bind(status_to_str(order.status))
        .bind(order.filled_quantity.raw())
        .bind(order.avg_fill_price.to_wire_string())
        .bind(&order.broker_order_id)
        .bind(&order.rejection_reason)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .context("order update failed")?;

        Ok(())
    }

    async fn find_open_orders(&self) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            select * from orders
            where status not in ('MATCHED','REJECTED','BROKER_REJECTED','CANCELLED')
            order by created_at asc
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("find_open_orders failed")?;

        rows.iter().map(row_to_order).collect()
    }
}
