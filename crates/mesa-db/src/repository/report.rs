//! # Report Repository
//!
//! Read-only aggregations over committed tickets. Every query runs straight
//! on the pool; none of them takes the writer lock.
//!
//! ## Filtering Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Date axis        tickets.business_day (never the raw UTC timestamp)   │
//! │  Cancelled rows   excluded unless include_cancelled = true             │
//! │  Income           excludes pending_collection (no money changed hands) │
//! │  Ticket count     COUNT(DISTINCT ticket_number), rows are per order    │
//! │  Tips             MAX per ticket_number (every row carries the tip)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;
use mesa_core::{ManualTip, PaymentMethod, Ticket};

// =============================================================================
// Row Types
// =============================================================================

/// Inclusive range of business days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DayRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DayRange { from, to }
    }

    pub fn single(day: NaiveDate) -> Self {
        DayRange { from: day, to: day }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SalesTotals {
    pub ticket_count: i64,
    pub row_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MethodSales {
    pub payment_method: PaymentMethod,
    pub ticket_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyMethodSales {
    pub business_day: NaiveDate,
    pub payment_method: PaymentMethod,
    pub ticket_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyIncome {
    pub business_day: NaiveDate,
    pub ticket_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// A money amount summed per calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyAmount {
    pub day: NaiveDate,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CountAndTotal {
    pub ticket_count: i64,
    pub total_cents: i64,
}

/// One bill (all rows of a ticket number) in list views.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketSummary {
    pub ticket_number: String,
    pub first_ticket_id: String,
    pub table_number: Option<i64>,
    pub customer_names: Option<String>,
    pub cashier_id: String,
    pub order_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub tip_amount_cents: Option<i64>,
    pub payment_method: PaymentMethod,
    /// `open` if any row is still open.
    pub status: String,
    pub business_day: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A ticket-bound tip, counted once per ticket number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketTip {
    pub ticket_number: String,
    pub tip_amount_cents: i64,
    pub tip_percentage_bps: Option<i64>,
    pub tip_date: NaiveDate,
    pub tip_added_by: Option<String>,
}

const TICKET_COLUMNS: &str = r#"
    t.id, t.order_id, t.ticket_number, t.cashier_id,
    t.subtotal_cents, t.tax_cents, t.total_cents,
    t.payment_method, t.status, t.business_day,
    t.cancelled_at, t.cancelled_by, t.cancellation_reason,
    t.tip_amount_cents, t.tip_percentage_bps, t.tip_date, t.tip_added_by,
    t.evidence_file, t.evidence_uploaded_at, t.evidence_uploaded_by,
    t.created_at
"#;

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Sales per payment method over a range (all methods, open rows only
    /// unless `include_cancelled`).
    pub async fn sales_by_method(
        &self,
        range: DayRange,
        include_cancelled: bool,
    ) -> DbResult<Vec<MethodSales>> {
        let rows = sqlx::query_as::<_, MethodSales>(
            r#"
            SELECT payment_method,
                   COUNT(DISTINCT ticket_number) AS ticket_count,
                   COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE business_day BETWEEN ?1 AND ?2
              AND (?3 OR status = 'open')
            GROUP BY payment_method
            ORDER BY total_cents DESC, payment_method ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(include_cancelled)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Overall totals over a range (all methods).
    pub async fn sales_totals(&self, range: DayRange, include_cancelled: bool) -> DbResult<SalesTotals> {
        let totals = sqlx::query_as::<_, SalesTotals>(
            r#"
            SELECT COUNT(DISTINCT ticket_number) AS ticket_count,
                   COUNT(*) AS row_count,
                   COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE business_day BETWEEN ?1 AND ?2
              AND (?3 OR status = 'open')
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(include_cancelled)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Sales per day and payment method, newest day first.
    pub async fn sales_by_day_and_method(
        &self,
        range: DayRange,
        include_cancelled: bool,
    ) -> DbResult<Vec<DailyMethodSales>> {
        let rows = sqlx::query_as::<_, DailyMethodSales>(
            r#"
            SELECT business_day, payment_method,
                   COUNT(DISTINCT ticket_number) AS ticket_count,
                   COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE business_day BETWEEN ?1 AND ?2
              AND (?3 OR status = 'open')
            GROUP BY business_day, payment_method
            ORDER BY business_day DESC, payment_method ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(include_cancelled)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Income (money actually received)
    // -------------------------------------------------------------------------

    pub async fn income_totals(&self, range: DayRange, include_cancelled: bool) -> DbResult<SalesTotals> {
        let totals = sqlx::query_as::<_, SalesTotals>(
            r#"
            SELECT COUNT(DISTINCT ticket_number) AS ticket_count,
                   COUNT(*) AS row_count,
                   COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE business_day BETWEEN ?1 AND ?2
              AND payment_method != 'pending_collection'
              AND (?3 OR status = 'open')
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(include_cancelled)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Income per business day, oldest first.
    pub async fn income_by_day(&self, range: DayRange, include_cancelled: bool) -> DbResult<Vec<DailyIncome>> {
        let rows = sqlx::query_as::<_, DailyIncome>(
            r#"
            SELECT business_day,
                   COUNT(DISTINCT ticket_number) AS ticket_count,
                   COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE business_day BETWEEN ?1 AND ?2
              AND payment_method != 'pending_collection'
              AND (?3 OR status = 'open')
            GROUP BY business_day
            ORDER BY business_day ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(include_cancelled)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Count and total of open tickets paid with `method`.
    pub async fn method_total(&self, method: PaymentMethod, range: DayRange) -> DbResult<CountAndTotal> {
        let totals = sqlx::query_as::<_, CountAndTotal>(
            r#"
            SELECT COUNT(DISTINCT ticket_number) AS ticket_count,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM tickets
            WHERE payment_method = ?1
              AND business_day BETWEEN ?2 AND ?3
              AND status = 'open'
            "#,
        )
        .bind(method)
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Open ticket rows paid with `method`, newest first.
    pub async fn tickets_by_method(&self, method: PaymentMethod, range: DayRange) -> DbResult<Vec<Ticket>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tickets t
            WHERE t.payment_method = ?1
              AND t.business_day BETWEEN ?2 AND ?3
              AND t.status = 'open'
            ORDER BY t.created_at DESC, t.ticket_number DESC
            "#,
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, Ticket>(&sql)
            .bind(method)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Outflows
    // -------------------------------------------------------------------------

    pub async fn expenses_by_day(&self, range: DayRange) -> DbResult<Vec<DailyAmount>> {
        let rows = sqlx::query_as::<_, DailyAmount>(
            r#"
            SELECT expense_date AS day, COALESCE(SUM(amount_cents), 0) AS amount_cents
            FROM expenses
            WHERE expense_date BETWEEN ?1 AND ?2
            GROUP BY expense_date
            ORDER BY expense_date ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn withdrawals_by_day(&self, range: DayRange) -> DbResult<Vec<DailyAmount>> {
        let rows = sqlx::query_as::<_, DailyAmount>(
            r#"
            SELECT withdrawal_date AS day, COALESCE(SUM(amount_cents), 0) AS amount_cents
            FROM cash_withdrawals
            WHERE withdrawal_date BETWEEN ?1 AND ?2
            GROUP BY withdrawal_date
            ORDER BY withdrawal_date ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Bill listings
    // -------------------------------------------------------------------------

    /// Bills of one business day, newest first.
    ///
    /// `search` matches the order's customer name, the registered customer
    /// name or the table number.
    pub async fn tickets_for_day(
        &self,
        day: NaiveDate,
        cashier_id: Option<&str>,
        search: Option<&str>,
    ) -> DbResult<Vec<TicketSummary>> {
        let rows = sqlx::query_as::<_, TicketSummary>(
            r#"
            SELECT t.ticket_number,
                   MIN(t.id) AS first_ticket_id,
                   MAX(dt.number) AS table_number,
                   GROUP_CONCAT(DISTINCT COALESCE(c.name, o.customer_name)) AS customer_names,
                   MAX(t.cashier_id) AS cashier_id,
                   COUNT(*) AS order_count,
                   COALESCE(SUM(t.subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(t.tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(t.total_cents), 0) AS total_cents,
                   MAX(t.tip_amount_cents) AS tip_amount_cents,
                   MAX(t.payment_method) AS payment_method,
                   MAX(t.status) AS status,
                   MAX(t.business_day) AS business_day,
                   MAX(t.created_at) AS created_at
            FROM tickets t
            JOIN orders o ON t.order_id = o.id
            LEFT JOIN dining_tables dt ON o.table_id = dt.id
            LEFT JOIN customers c ON o.customer_id = c.id
            WHERE t.business_day = ?1
              AND (?2 IS NULL OR t.cashier_id = ?2)
              AND (?3 IS NULL
                   OR o.customer_name LIKE '%' || ?3 || '%'
                   OR c.name LIKE '%' || ?3 || '%'
                   OR CAST(dt.number AS TEXT) LIKE '%' || ?3 || '%')
            GROUP BY t.ticket_number
            ORDER BY MAX(t.created_at) DESC
            "#,
        )
        .bind(day)
        .bind(cashier_id)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Open bills still awaiting collection, newest first.
    pub async fn pending_collection(&self, search: Option<&str>) -> DbResult<Vec<TicketSummary>> {
        let rows = sqlx::query_as::<_, TicketSummary>(
            r#"
            SELECT t.ticket_number,
                   MIN(t.id) AS first_ticket_id,
                   MAX(dt.number) AS table_number,
                   GROUP_CONCAT(DISTINCT COALESCE(c.name, o.customer_name)) AS customer_names,
                   MAX(t.cashier_id) AS cashier_id,
                   COUNT(*) AS order_count,
                   COALESCE(SUM(t.subtotal_cents), 0) AS subtotal_cents,
                   COALESCE(SUM(t.tax_cents), 0) AS tax_cents,
                   COALESCE(SUM(t.total_cents), 0) AS total_cents,
                   MAX(t.tip_amount_cents) AS tip_amount_cents,
                   MAX(t.payment_method) AS payment_method,
                   MAX(t.status) AS status,
                   MAX(t.business_day) AS business_day,
                   MAX(t.created_at) AS created_at
            FROM tickets t
            JOIN orders o ON t.order_id = o.id
            LEFT JOIN dining_tables dt ON o.table_id = dt.id
            LEFT JOIN customers c ON o.customer_id = c.id
            WHERE t.payment_method = 'pending_collection'
              AND t.status = 'open'
              AND (?1 IS NULL
                   OR o.customer_name LIKE '%' || ?1 || '%'
                   OR c.name LIKE '%' || ?1 || '%'
                   OR CAST(dt.number AS TEXT) LIKE '%' || ?1 || '%')
            GROUP BY t.ticket_number
            ORDER BY MAX(t.created_at) DESC
            "#,
        )
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Cancelled rows whose cancellation falls in `[start, end)`, newest first.
    pub async fn cancelled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Ticket>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tickets t
            WHERE t.status = 'cancelled'
              AND t.cancelled_at >= ?1 AND t.cancelled_at < ?2
            ORDER BY t.cancelled_at DESC
            "#,
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, Ticket>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Tips
    // -------------------------------------------------------------------------

    /// Ticket-bound tips dated within the range, one entry per ticket number.
    pub async fn ticket_tips(&self, range: DayRange) -> DbResult<Vec<TicketTip>> {
        let rows = sqlx::query_as::<_, TicketTip>(
            r#"
            SELECT ticket_number,
                   MAX(tip_amount_cents) AS tip_amount_cents,
                   MAX(tip_percentage_bps) AS tip_percentage_bps,
                   MAX(tip_date) AS tip_date,
                   MAX(tip_added_by) AS tip_added_by
            FROM tickets
            WHERE tip_amount_cents > 0
              AND tip_date BETWEEN ?1 AND ?2
              AND status = 'open'
            GROUP BY ticket_number
            ORDER BY MAX(tip_date) DESC, ticket_number DESC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Standalone tips dated within the range, newest first.
    pub async fn manual_tips(&self, range: DayRange) -> DbResult<Vec<ManualTip>> {
        let rows = sqlx::query_as::<_, ManualTip>(
            r#"
            SELECT id, amount_cents, tip_date, added_by, note, created_at
            FROM manual_tips
            WHERE tip_date BETWEEN ?1 AND ?2
            ORDER BY tip_date DESC, created_at DESC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
