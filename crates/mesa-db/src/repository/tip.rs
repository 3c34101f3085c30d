//! # Manual Tip Repository
//!
//! Gratuities recorded without a ticket (left at the bar, pooled cash).
//! Ticket-bound tips live on the ticket rows themselves.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use mesa_core::{ManualTip, Money};

#[derive(Debug, Clone)]
pub struct ManualTipRepository {
    pool: SqlitePool,
}

impl ManualTipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ManualTipRepository { pool }
    }

    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        amount: Money,
        tip_date: NaiveDate,
        added_by: &str,
        note: Option<&str>,
    ) -> DbResult<ManualTip> {
        let tip = ManualTip {
            id: mesa_core::new_id(),
            amount_cents: amount.cents(),
            tip_date,
            added_by: added_by.to_string(),
            note: note.map(str::to_string),
            created_at: Utc::now(),
        };

        debug!(id = %tip.id, amount = %amount, tip_date = %tip_date, "Recording manual tip");

        sqlx::query(
            r#"
            INSERT INTO manual_tips (id, amount_cents, tip_date, added_by, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&tip.id)
        .bind(tip.amount_cents)
        .bind(tip.tip_date)
        .bind(&tip.added_by)
        .bind(&tip.note)
        .bind(tip.created_at)
        .execute(conn)
        .await?;

        Ok(tip)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ManualTip>> {
        let tip = sqlx::query_as::<_, ManualTip>(
            "SELECT id, amount_cents, tip_date, added_by, note, created_at FROM manual_tips WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tip)
    }
}
