//! # Table Repository
//!
//! Dining tables: lookup and the two state changes billing performs.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mesa_core::{DiningTable, TableStatus};

/// Repository for dining table operations.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
}

impl TableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TableRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DiningTable>> {
        let table = sqlx::query_as::<_, DiningTable>(
            "SELECT id, number, status, waiter_id FROM dining_tables WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(table)
    }

    pub async fn find(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<DiningTable>> {
        let table = sqlx::query_as::<_, DiningTable>(
            "SELECT id, number, status, waiter_id FROM dining_tables WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(table)
    }

    /// Marks the table `available` and clears its waiter.
    pub async fn free(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(table_id = %id, "Freeing table");

        let result = sqlx::query(
            "UPDATE dining_tables SET status = 'available', waiter_id = NULL, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Table", id));
        }
        Ok(())
    }

    pub async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        status: TableStatus,
    ) -> DbResult<()> {
        debug!(table_id = %id, status = status.as_str(), "Setting table status");

        let result = sqlx::query("UPDATE dining_tables SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Table", id));
        }
        Ok(())
    }

    pub async fn insert(&self, conn: &mut SqliteConnection, table: &DiningTable) -> DbResult<()> {
        sqlx::query("INSERT INTO dining_tables (id, number, status, waiter_id) VALUES (?1, ?2, ?3, ?4)")
            .bind(&table.id)
            .bind(table.number)
            .bind(table.status)
            .bind(&table.waiter_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_free_clears_waiter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tables();
        let mut conn = db.acquire().await.unwrap();

        let table = DiningTable {
            id: "t5".into(),
            number: 5,
            status: TableStatus::Occupied,
            waiter_id: Some("w1".into()),
        };
        repo.insert(&mut conn, &table).await.unwrap();

        repo.set_status(&mut conn, "t5", TableStatus::BillRequested).await.unwrap();
        assert_eq!(
            repo.find(&mut conn, "t5").await.unwrap().unwrap().status,
            TableStatus::BillRequested
        );

        repo.free(&mut conn, "t5").await.unwrap();
        let freed = repo.find(&mut conn, "t5").await.unwrap().unwrap();
        assert_eq!(freed.status, TableStatus::Available);
        assert!(freed.waiter_id.is_none());

        assert!(matches!(
            repo.free(&mut conn, "missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
