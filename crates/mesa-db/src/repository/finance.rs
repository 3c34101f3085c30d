//! # Finance Repository
//!
//! Expenses and cash withdrawals: the outflow side of the income vs
//! expenses report.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use mesa_core::Money;

#[derive(Debug, Clone)]
pub struct FinanceRepository {
    pool: SqlitePool,
}

impl FinanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FinanceRepository { pool }
    }

    pub async fn record_expense(
        &self,
        description: &str,
        amount: Money,
        expense_date: NaiveDate,
        created_by: &str,
    ) -> DbResult<String> {
        let id = mesa_core::new_id();
        debug!(id = %id, amount = %amount, date = %expense_date, "Recording expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, description, amount_cents, expense_date, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(description)
        .bind(amount.cents())
        .bind(expense_date)
        .bind(created_by)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn record_withdrawal(
        &self,
        reason: &str,
        amount: Money,
        withdrawal_date: NaiveDate,
        created_by: &str,
    ) -> DbResult<String> {
        let id = mesa_core::new_id();
        debug!(id = %id, amount = %amount, date = %withdrawal_date, "Recording cash withdrawal");

        sqlx::query(
            r#"
            INSERT INTO cash_withdrawals (id, reason, amount_cents, withdrawal_date, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(reason)
        .bind(amount.cents())
        .bind(withdrawal_date)
        .bind(created_by)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}
