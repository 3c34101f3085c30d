//! # Ticket Repository
//!
//! Billing rows. One row per order; rows billed together share a
//! `ticket_number`.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ticket Row Lifecycle                              │
//! │                                                                         │
//! │  insert()                      status = open (inside the unit of work) │
//! │     │                                                                   │
//! │     ├── update_payment_method()  every open row of the number          │
//! │     ├── attach_evidence()        every open row of the number          │
//! │     ├── apply_tip()              every open row of the number          │
//! │     │                                                                   │
//! │     └── cancel()                 open → cancelled (terminal, per row)  │
//! │                                                                         │
//! │  Rows are never deleted.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use mesa_core::{PaymentMethod, Ticket};

const TICKET_COLUMNS: &str = r#"
    id, order_id, ticket_number, cashier_id,
    subtotal_cents, tax_cents, total_cents,
    payment_method, status, business_day,
    cancelled_at, cancelled_by, cancellation_reason,
    tip_amount_cents, tip_percentage_bps, tip_date, tip_added_by,
    evidence_file, evidence_uploaded_at, evidence_uploaded_by,
    created_at
"#;

/// Tip fields written to every row of a ticket number.
#[derive(Debug, Clone)]
pub struct TipUpdate<'a> {
    pub amount_cents: i64,
    pub percentage_bps: Option<i64>,
    pub tip_date: NaiveDate,
    pub added_by: &'a str,
}

/// Repository for ticket rows.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TicketRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a ticket row by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS);
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// All rows sharing a ticket number, in insertion order.
    pub async fn get_by_number(&self, ticket_number: &str) -> DbResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE ticket_number = ?1 ORDER BY rowid",
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_number)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Reads a row inside a unit of work.
    pub async fn find(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS);
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(ticket)
    }

    /// Rows of a ticket number inside a unit of work.
    pub async fn find_by_number(
        &self,
        conn: &mut SqliteConnection,
        ticket_number: &str,
    ) -> DbResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE ticket_number = ?1 ORDER BY rowid",
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_number)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// The open ticket row of an order, if any.
    pub async fn active_for_order(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE order_id = ?1 AND status = 'open'",
            TICKET_COLUMNS
        );
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
        Ok(ticket)
    }

    /// Number of rows (any status) for an order.
    pub async fn count_for_order(&self, order_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Writes (inside a unit of work)
    // =========================================================================

    /// Inserts a ticket row.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the order already has an open ticket
    /// * `DbError::CheckViolation` - payment method outside the deployed
    ///   domain, or a broken tax split
    pub async fn insert(&self, conn: &mut SqliteConnection, ticket: &Ticket) -> DbResult<()> {
        debug!(
            id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            order_id = %ticket.order_id,
            "Inserting ticket row"
        );

        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, order_id, ticket_number, cashier_id,
                subtotal_cents, tax_cents, total_cents,
                payment_method, status, business_day,
                cancelled_at, cancelled_by, cancellation_reason,
                tip_amount_cents, tip_percentage_bps, tip_date, tip_added_by,
                evidence_file, evidence_uploaded_at, evidence_uploaded_by,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19, ?20,
                ?21
            )
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.order_id)
        .bind(&ticket.ticket_number)
        .bind(&ticket.cashier_id)
        .bind(ticket.subtotal_cents)
        .bind(ticket.tax_cents)
        .bind(ticket.total_cents)
        .bind(ticket.payment_method)
        .bind(ticket.status)
        .bind(ticket.business_day)
        .bind(ticket.cancelled_at)
        .bind(&ticket.cancelled_by)
        .bind(&ticket.cancellation_reason)
        .bind(ticket.tip_amount_cents)
        .bind(ticket.tip_percentage_bps)
        .bind(ticket.tip_date)
        .bind(&ticket.tip_added_by)
        .bind(&ticket.evidence_file)
        .bind(ticket.evidence_uploaded_at)
        .bind(&ticket.evidence_uploaded_by)
        .bind(ticket.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Cancels one open row. Returns false if the row was not open.
    pub async fn cancel(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        cancelled_by: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'cancelled', cancelled_at = ?1, cancelled_by = ?2, cancellation_reason = ?3
            WHERE id = ?4 AND status = 'open'
            "#,
        )
        .bind(at)
        .bind(cancelled_by)
        .bind(reason)
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sets the payment method on every open row of a ticket number.
    /// Returns the number of rows changed.
    pub async fn update_payment_method(
        &self,
        conn: &mut SqliteConnection,
        ticket_number: &str,
        method: PaymentMethod,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE tickets SET payment_method = ?1 WHERE ticket_number = ?2 AND status = 'open'",
        )
        .bind(method)
        .bind(ticket_number)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Records a payment evidence file on every open row of a ticket number.
    pub async fn attach_evidence(
        &self,
        conn: &mut SqliteConnection,
        ticket_number: &str,
        file: &str,
        uploaded_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET evidence_file = ?1, evidence_uploaded_at = ?2, evidence_uploaded_by = ?3
            WHERE ticket_number = ?4 AND status = 'open'
            "#,
        )
        .bind(file)
        .bind(at)
        .bind(uploaded_by)
        .bind(ticket_number)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Writes the tip on every open row of a ticket number.
    pub async fn apply_tip(
        &self,
        conn: &mut SqliteConnection,
        ticket_number: &str,
        tip: &TipUpdate<'_>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET tip_amount_cents = ?1, tip_percentage_bps = ?2, tip_date = ?3, tip_added_by = ?4
            WHERE ticket_number = ?5 AND status = 'open'
            "#,
        )
        .bind(tip.amount_cents)
        .bind(tip.percentage_bps)
        .bind(tip.tip_date)
        .bind(tip.added_by)
        .bind(ticket_number)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
