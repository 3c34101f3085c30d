//! # Mesa Settings
//!
//! Loads the database and billing configuration of a deployment.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MESA_DATABASE_PATH=/var/lib/mesa/mesa.db                           │
//! │     MESA_PENDING_COLLECTION_ENABLED=true                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mesa-pos/mesa.toml (Linux)                               │
//! │     ~/Library/Application Support/com.mesa.pos/mesa.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     mesa.db next to the binary, 16% tax, same-day enforced             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/mesa/mesa.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [billing]
//! tax_rate_bps = 1600
//! pending_collection_enabled = false
//! same_day_policy = "enforce"
//! business_utc_offset_minutes = -360
//!
//! [billing.side_effects]
//! customer_stats = "transactional"
//! inventory = "best_effort"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use mesa_core::BillingConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// The `[database]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the lock before failing busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mesa.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Main Settings
// =============================================================================

/// Complete deployment settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MesaSettings {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub billing: BillingConfig,
}

impl MesaSettings {
    /// Loads settings from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (mesa.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut settings = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settings from file");
                settings = Self::from_file(&path)?;
            } else {
                debug!(?path, "Settings file not found, using defaults");
            }
        }

        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    /// Parses a settings file without applying environment overrides.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DbError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(format!("Invalid mesa.toml: {}", e)))
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        self.billing
            .validate()
            .map_err(|e| DbError::Config(e.to_string()))
    }

    /// Pool configuration for [`Database::new`](crate::Database::new).
    pub fn to_db_config(&self) -> DbConfig {
        if self.database.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory().run_migrations(self.database.run_migrations);
        }
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .run_migrations(self.database.run_migrations)
    }

    /// Applies `MESA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are
    /// logged and skipped.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("MESA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("MESA_BUSY_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.database.busy_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid MESA_BUSY_TIMEOUT_MS"),
            }
        }

        if let Some(raw) = lookup("MESA_TAX_RATE_BPS") {
            match raw.parse::<u32>() {
                Ok(bps) => self.billing.tax_rate_bps = bps,
                Err(_) => warn!(value = %raw, "Ignoring invalid MESA_TAX_RATE_BPS"),
            }
        }

        if let Some(raw) = lookup("MESA_PENDING_COLLECTION_ENABLED") {
            match parse_flag(&raw) {
                Some(on) => self.billing.pending_collection_enabled = on,
                None => warn!(value = %raw, "Ignoring invalid MESA_PENDING_COLLECTION_ENABLED"),
            }
        }

        if let Some(raw) = lookup("MESA_INVENTORY_ENABLED") {
            match parse_flag(&raw) {
                Some(on) => self.billing.inventory_enabled = on,
                None => warn!(value = %raw, "Ignoring invalid MESA_INVENTORY_ENABLED"),
            }
        }

        if let Some(raw) = lookup("MESA_AUTO_DEDUCT_INVENTORY") {
            match parse_flag(&raw) {
                Some(on) => self.billing.auto_deduct_inventory = on,
                None => warn!(value = %raw, "Ignoring invalid MESA_AUTO_DEDUCT_INVENTORY"),
            }
        }

        if let Some(raw) = lookup("MESA_SAME_DAY_POLICY") {
            match raw.parse() {
                Ok(policy) => self.billing.same_day_policy = policy,
                Err(e) => warn!(error = %e, "Ignoring invalid MESA_SAME_DAY_POLICY"),
            }
        }

        if let Some(raw) = lookup("MESA_BUSINESS_UTC_OFFSET_MINUTES") {
            match raw.parse::<i32>() {
                Ok(minutes) => self.billing.business_utc_offset_minutes = minutes,
                Err(_) => warn!(value = %raw, "Ignoring invalid MESA_BUSINESS_UTC_OFFSET_MINUTES"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mesa", "pos")
            .map(|dirs| dirs.config_dir().join("mesa.toml"))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
