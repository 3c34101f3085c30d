//! # Order Repository
//!
//! Orders as the billing core sees them: read, list what is billable, and
//! move between `ready` and `delivered`.
//!
//! ## Billable Orders
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status = 'ready'                                                      │
//! │    AND NOT EXISTS (open ticket for the order)                          │
//! │                                                                         │
//! │  ready_for_table(table)   → table / customer billing                   │
//! │  expired_ready(before)    → backfill of orders left from earlier days  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order creation here exists for seeding and tests; the floor application
//! owns the real order workflow.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mesa_core::{Order, OrderItem, OrderStatus};

const ORDER_COLUMNS: &str = "id, table_id, waiter_id, customer_id, customer_name, status, total_cents, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Reads an order inside a unit of work.
    pub async fn find(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    /// Ready orders of a table that have no open ticket, oldest first.
    pub async fn ready_for_table(
        &self,
        conn: &mut SqliteConnection,
        table_id: &str,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM orders o
            WHERE o.table_id = ?1
              AND o.status = 'ready'
              AND NOT EXISTS (
                  SELECT 1 FROM tickets t WHERE t.order_id = o.id AND t.status = 'open'
              )
            ORDER BY o.created_at ASC, o.id ASC
            "#,
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(table_id)
            .fetch_all(conn)
            .await?;
        Ok(orders)
    }

    /// Ready, ticket-less orders created before `before` (earlier business
    /// days), oldest first.
    pub async fn expired_ready(&self, before: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM orders o
            WHERE o.status = 'ready'
              AND o.created_at < ?1
              AND NOT EXISTS (
                  SELECT 1 FROM tickets t WHERE t.order_id = o.id AND t.status = 'open'
              )
            ORDER BY o.created_at ASC, o.id ASC
            "#,
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Moves an order to `status`.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - no order with that id
    pub async fn transition_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        status: OrderStatus,
    ) -> DbResult<()> {
        debug!(order_id = %id, status = %status, "Transitioning order");

        let result = sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Dish lines of an order.
    pub async fn items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, dish_id, quantity FROM order_items WHERE order_id = ?1 ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;
        Ok(items)
    }

    /// Inserts an order.
    pub async fn insert(&self, conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, table_id = %order.table_id, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, table_id, waiter_id, customer_id, customer_name,
                status, total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.table_id)
        .bind(&order.waiter_id)
        .bind(&order.customer_id)
        .bind(&order.customer_name)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds a dish line to an order.
    pub async fn add_item(&self, conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query("INSERT INTO order_items (id, order_id, dish_id, quantity) VALUES (?1, ?2, ?3, ?4)")
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.dish_id)
            .bind(item.quantity)
            .execute(conn)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
