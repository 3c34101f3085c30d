//! # Payment Method Repository
//!
//! Reads the versioned allow-list shipped by migrations.
//!
//! ```text
//! migration 0002 ──► payment_methods rows + ck_tickets_payment_method
//!                          │
//!                          ▼
//!            TicketService::new() loads them once
//!                          │
//!                          ▼
//!            every request checks against the in-memory set
//! ```

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use mesa_core::PaymentMethod;

#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    /// Payment methods the deployed schema accepts, in display order.
    ///
    /// Codes this build does not know are skipped with a warning; they come
    /// from a newer migration than the running binary.
    pub async fn deployed(&self) -> DbResult<Vec<PaymentMethod>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT code FROM payment_methods ORDER BY sort_order, code")
                .fetch_all(&self.pool)
                .await?;

        let mut methods = Vec::with_capacity(codes.len());
        for code in codes {
            match code.parse::<PaymentMethod>() {
                Ok(method) => methods.push(method),
                Err(_) => warn!(code = %code, "Ignoring payment method unknown to this build"),
            }
        }

        debug!(count = methods.len(), "Loaded deployed payment methods");
        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_deployed_domain() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let methods = db.payment_methods().deployed().await.unwrap();
        assert_eq!(methods, PaymentMethod::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_unknown_codes_skipped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO payment_methods (code, label, sort_order) VALUES ('crypto', 'Crypto', 9)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("DELETE FROM payment_methods WHERE code = 'in_kind_exchange'")
            .execute(db.pool())
            .await
            .unwrap();

        let methods = db.payment_methods().deployed().await.unwrap();
        assert_eq!(methods.len(), 4);
        assert!(!methods.contains(&PaymentMethod::InKindExchange));
    }
}
