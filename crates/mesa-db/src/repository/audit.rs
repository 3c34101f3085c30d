//! # Cancellation Audit Repository
//!
//! Append-only trail of ticket cancellations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use mesa_core::Money;

/// One cancellation as recorded in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CancellationEntry {
    pub id: String,
    pub ticket_id: String,
    pub ticket_number: String,
    pub cancelled_by: String,
    pub reason: String,
    pub amount_cents: i64,
    pub cancelled_at: DateTime<Utc>,
}

/// Fields of a new audit entry.
#[derive(Debug, Clone)]
pub struct NewCancellation<'a> {
    pub ticket_id: &'a str,
    pub ticket_number: &'a str,
    pub cancelled_by: &'a str,
    pub reason: &'a str,
    pub amount: Money,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CancellationAuditRepository {
    pool: SqlitePool,
}

impl CancellationAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CancellationAuditRepository { pool }
    }

    /// Appends an audit entry.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        entry: &NewCancellation<'_>,
    ) -> DbResult<String> {
        let id = mesa_core::new_id();
        debug!(ticket_id = %entry.ticket_id, amount = %entry.amount, "Recording cancellation audit entry");

        sqlx::query(
            r#"
            INSERT INTO ticket_cancellations (id, ticket_id, ticket_number, cancelled_by, reason, amount_cents, cancelled_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(entry.ticket_id)
        .bind(entry.ticket_number)
        .bind(entry.cancelled_by)
        .bind(entry.reason)
        .bind(entry.amount.cents())
        .bind(entry.cancelled_at)
        .execute(conn)
        .await?;

        Ok(id)
    }

    /// Audit entries for a ticket row, oldest first.
    pub async fn for_ticket(&self, ticket_id: &str) -> DbResult<Vec<CancellationEntry>> {
        let entries = sqlx::query_as::<_, CancellationEntry>(
            r#"
            SELECT id, ticket_id, ticket_number, cancelled_by, reason, amount_cents, cancelled_at
            FROM ticket_cancellations
            WHERE ticket_id = ?1
            ORDER BY cancelled_at ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
