//! # Database Migrations
//!
//! Embedded SQL migrations for Mesa POS.
//!
//! ## Migration Set
//! ```text
//! migrations/sqlite/
//! ├── 0001_floor_and_orders.sql  tables, customers, dishes, stock, orders
//! ├── 0002_ticketing.sql         payment_methods, tickets, ticket_sequences,
//! │                              ticket_cancellations, manual_tips
//! └── 0003_cash_flow.sql         expenses, cash_withdrawals
//! ```
//!
//! ## Payment-Method Domain
//! The accepted payment methods are data shipped by a migration (the
//! `payment_methods` rows plus the `ck_tickets_payment_method` CHECK on
//! `tickets`). Request handling never inspects the schema; it reads the
//! allow-list once at startup. Adding a method means adding a migration that
//! touches both.
//!
//! Never modify an applied migration, always add a new one.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded at compile time from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent; each migration runs in its own transaction, in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(embedded, applied)` migration counts.
///
/// For diagnostics and health checks.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    // Missing bookkeeping table means nothing has been applied yet.
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
