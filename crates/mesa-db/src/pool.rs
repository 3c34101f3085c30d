//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  MesaSettings::load()                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool sizing, busy timeout                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ├── db.acquire()  → one connection for a UnitOfWork              │
//! │       │                   (ticket creation, cancellation, tips)        │
//! │       │                                                                 │
//! │       └── db.reports()  → read-only queries straight on the pool       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode and Busy Timeout
//! File databases run in WAL mode so report readers never block the cashier.
//! Writers are serialized by `BEGIN IMMEDIATE`; a writer that cannot take the
//! lock waits up to `busy_timeout` and then fails with `DbError::Busy`.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::CancellationAuditRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::finance::FinanceRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::order::OrderRepository;
use crate::repository::payment_method::PaymentMethodRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sequence::TicketSequenceRepository;
use crate::repository::table::TableRepository;
use crate::repository::ticket::TicketRepository;
use crate::repository::tip::ManualTipRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// A connection checked out of the pool.
pub type PooledConnection = PoolConnection<Sqlite>;

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/mesa/mesa.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Pool acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a statement waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the pool acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the statement busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A private in-memory database lives and dies with its connection, so
    /// the pool holds exactly one and never recycles it.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cloning is cheap (the pool is reference counted). Services hold a clone
/// and either hand out repositories for reads or acquire a dedicated
/// connection to run a [`UnitOfWork`](crate::uow::UnitOfWork) on.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for file databases
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - Busy timeout from the config
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let base = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Memory)
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = base
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent. Called by `new()` when `run_migrations` is set.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks out one connection for a unit of work.
    ///
    /// The connection returns to the pool when dropped. Any transaction left
    /// open on it is cleaned up by the next `UnitOfWork::begin`.
    pub async fn acquire(&self) -> DbResult<PooledConnection> {
        Ok(self.pool.acquire().await?)
    }

    // -------------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------------

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn tables(&self) -> TableRepository {
        TableRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    pub fn tickets(&self) -> TicketRepository {
        TicketRepository::new(self.pool.clone())
    }

    pub fn ticket_sequences(&self) -> TicketSequenceRepository {
        TicketSequenceRepository::new(self.pool.clone())
    }

    pub fn cancellations(&self) -> CancellationAuditRepository {
        CancellationAuditRepository::new(self.pool.clone())
    }

    pub fn manual_tips(&self) -> ManualTipRepository {
        ManualTipRepository::new(self.pool.clone())
    }

    pub fn payment_methods(&self) -> PaymentMethodRepository {
        PaymentMethodRepository::new(self.pool.clone())
    }

    pub fn finance(&self) -> FinanceRepository {
        FinanceRepository::new(self.pool.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        // Migrations ran: the payment-method allow-list is seeded.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_methods")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO order_items (id, order_id, dish_id, quantity) VALUES ('i', 'missing', 'missing', 1)",
        )
        .execute(db.pool())
        .await;
        assert!(matches!(
            result.map_err(DbError::from),
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/mesa.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
