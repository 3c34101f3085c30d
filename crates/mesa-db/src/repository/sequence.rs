//! # Ticket Sequence Repository
//!
//! Per-day counter behind `T<YYYYMMDD><NNNN>` ticket numbers.
//!
//! ## Atomic Increment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT INTO ticket_sequences (business_day, last_value)               │
//! │  VALUES (day, <highest number used that day> + 1)                      │
//! │  ON CONFLICT(business_day) DO UPDATE SET last_value = last_value + 1   │
//! │  RETURNING last_value                                                  │
//! │                                                                         │
//! │  • One statement: read and increment cannot interleave                 │
//! │  • Runs under BEGIN IMMEDIATE: the writer lock is already held         │
//! │  • Rolled back with the ticket: a failed bill does not burn a number   │
//! │  • First use of a day seeds from the highest number already issued,   │
//! │    so databases that predate the counter continue their numbering      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for the daily ticket counter.
#[derive(Debug, Clone)]
pub struct TicketSequenceRepository {
    pool: SqlitePool,
}

impl TicketSequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TicketSequenceRepository { pool }
    }

    /// Claims the next sequence value for `day`.
    pub async fn next_value(&self, conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<u32> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ticket_sequences (business_day, last_value)
            VALUES (
                ?1,
                (SELECT COALESCE(MAX(CAST(substr(ticket_number, 10) AS INTEGER)), 0)
                 FROM tickets WHERE business_day = ?1) + 1
            )
            ON CONFLICT(business_day) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(conn)
        .await?;

        debug!(business_day = %day, value = value, "Claimed ticket sequence value");

        u32::try_from(value)
            .map_err(|_| DbError::Internal(format!("ticket sequence out of range: {}", value)))
    }

    /// Last value handed out for `day` (0 if none).
    pub async fn current(&self, day: NaiveDate) -> DbResult<u32> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM ticket_sequences WHERE business_day = ?1")
                .bind(day)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.unwrap_or(0).max(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::uow::UnitOfWork;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_sequence_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ticket_sequences();
        {
            let mut conn = db.acquire().await.unwrap();
            assert_eq!(repo.next_value(&mut conn, day(18)).await.unwrap(), 1);
            assert_eq!(repo.next_value(&mut conn, day(18)).await.unwrap(), 2);
            assert_eq!(repo.next_value(&mut conn, day(19)).await.unwrap(), 1);
        }
        assert_eq!(repo.current(day(18)).await.unwrap(), 2);
        assert_eq!(repo.current(day(20)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rolled_back_claim_is_reused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ticket_sequences();
        let mut conn = db.acquire().await.unwrap();

        let mut uow = UnitOfWork::begin(&mut conn).await.unwrap();
        assert_eq!(repo.next_value(uow.conn(), day(18)).await.unwrap(), 1);
        uow.rollback().await;

        let mut uow = UnitOfWork::begin(&mut conn).await.unwrap();
        assert_eq!(repo.next_value(uow.conn(), day(18)).await.unwrap(), 1);
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_seeds_from_existing_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        sqlx::query("INSERT INTO dining_tables (id, number) VALUES ('t1', 1)")
            .execute(&mut *conn)
            .await
            .unwrap();
        for (order, number) in [("o1", "T202610180001"), ("o2", "T202610180001"), ("o3", "T202610180002")] {
            sqlx::query("INSERT INTO orders (id, table_id, waiter_id, status, total_cents, created_at) VALUES (?1, 't1', 'w1', 'delivered', 11600, '2026-10-18T12:00:00+00:00')")
                .bind(order)
                .execute(&mut *conn)
                .await
                .unwrap();
            sqlx::query(
                r#"INSERT INTO tickets (id, order_id, ticket_number, cashier_id, subtotal_cents, tax_cents, total_cents,
                       payment_method, status, business_day, created_at)
                   VALUES (?1, ?1, ?2, 'c', 10000, 1600, 11600, 'cash', 'open', '2026-10-18', '2026-10-18T12:00:00+00:00')"#,
            )
            .bind(order)
            .bind(number)
            .execute(&mut *conn)
            .await
            .unwrap();
        }

        // Highest number used that day is 0002.
        let next = db.ticket_sequences().next_value(&mut conn, day(18)).await.unwrap();
        assert_eq!(next, 3);
    }
}
