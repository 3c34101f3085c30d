//! # Customer Repository
//!
//! Visit and spend counters maintained by billing.
//!
//! ```text
//! ticket committed   → total_visits + 1, total_spent + amount, last_visit = now
//! ticket cancelled   → total_visits - 1, total_spent - amount  (floored at 0)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mesa_core::Money;

/// Customer with purchase statistics.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub total_visits: i64,
    pub total_spent_cents: i64,
}

/// Repository for customer statistics.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CustomerRecord>> {
        let customer = sqlx::query_as::<_, CustomerRecord>(
            "SELECT id, name, total_visits, total_spent_cents FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    /// Records one visit worth `amount`.
    pub async fn apply_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        debug!(customer_id = %customer_id, amount = %amount, "Applying purchase to customer stats");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET total_visits = total_visits + 1,
                total_spent_cents = total_spent_cents + ?1,
                last_visit_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(amount.cents())
        .bind(Utc::now())
        .bind(customer_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }
        Ok(())
    }

    /// Undoes one visit worth `amount`. Counters never go below zero.
    pub async fn reverse_purchase(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        debug!(customer_id = %customer_id, amount = %amount, "Reversing purchase from customer stats");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET total_visits = MAX(total_visits - 1, 0),
                total_spent_cents = MAX(total_spent_cents - ?1, 0)
            WHERE id = ?2
            "#,
        )
        .bind(amount.cents())
        .bind(customer_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }
        Ok(())
    }

    pub async fn insert(&self, conn: &mut SqliteConnection, id: &str, name: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO customers (id, name) VALUES (?1, ?2)")
            .bind(id)
            .bind(name)
            .execute(conn)
            .await?;
        Ok(())
    }
}
