//! # Billing Configuration
//!
//! Deployment switches that change billing behavior. This module only holds
//! the types and their validation; loading from `mesa.toml` and `MESA_*`
//! environment variables lives in `mesa-db::settings`.
//!
//! ## Side-Effect Policies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Effect               Default         On failure                        │
//! │  ───────────────────  ──────────────  ─────────────────────────────── │
//! │  customer_stats       transactional   whole partition rolls back       │
//! │  inventory            best_effort     logged, savepoint rolled back    │
//! │  cancellation_audit   best_effort     logged, cancellation commits     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::ledger::BusinessCalendar;
use crate::tax::TaxRate;
use crate::types::PaymentMethod;

// =============================================================================
// Policies
// =============================================================================

/// How a side effect participates in the ticket transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectPolicy {
    /// Failure aborts and rolls back the enclosing unit of work.
    Transactional,
    /// Failure is logged; the effect's partial writes are discarded and the
    /// enclosing unit of work carries on.
    BestEffort,
}

impl SideEffectPolicy {
    pub fn is_best_effort(&self) -> bool {
        matches!(self, SideEffectPolicy::BestEffort)
    }
}

impl fmt::Display for SideEffectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffectPolicy::Transactional => write!(f, "transactional"),
            SideEffectPolicy::BestEffort => write!(f, "best_effort"),
        }
    }
}

impl FromStr for SideEffectPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transactional" => Ok(SideEffectPolicy::Transactional),
            "best_effort" | "best-effort" => Ok(SideEffectPolicy::BestEffort),
            other => Err(CoreError::InvalidConfig(format!(
                "Unknown side effect policy: '{}'. Valid options: transactional, best_effort",
                other
            ))),
        }
    }
}

/// Whether orders billed together must come from the same business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDayPolicy {
    Enforce,
    Ignore,
}

impl SameDayPolicy {
    pub fn is_enforced(&self) -> bool {
        matches!(self, SameDayPolicy::Enforce)
    }
}

impl FromStr for SameDayPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enforce" | "on" | "true" => Ok(SameDayPolicy::Enforce),
            "ignore" | "off" | "false" => Ok(SameDayPolicy::Ignore),
            other => Err(CoreError::InvalidConfig(format!(
                "Unknown same day policy: '{}'. Valid options: enforce, ignore",
                other
            ))),
        }
    }
}

/// Per-effect policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectPolicies {
    #[serde(default = "default_transactional")]
    pub customer_stats: SideEffectPolicy,

    #[serde(default = "default_best_effort")]
    pub inventory: SideEffectPolicy,

    #[serde(default = "default_best_effort")]
    pub cancellation_audit: SideEffectPolicy,
}

fn default_transactional() -> SideEffectPolicy {
    SideEffectPolicy::Transactional
}

fn default_best_effort() -> SideEffectPolicy {
    SideEffectPolicy::BestEffort
}

impl Default for SideEffectPolicies {
    fn default() -> Self {
        SideEffectPolicies {
            customer_stats: default_transactional(),
            inventory: default_best_effort(),
            cancellation_audit: default_best_effort(),
        }
    }
}

/// Rules for payment evidence attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRules {
    /// Lower-case extensions without the dot.
    #[serde(default = "default_evidence_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_evidence_max_bytes")]
    pub max_bytes: u64,
}

fn default_evidence_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_evidence_max_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for EvidenceRules {
    fn default() -> Self {
        EvidenceRules {
            allowed_extensions: default_evidence_extensions(),
            max_bytes: default_evidence_max_bytes(),
        }
    }
}

// =============================================================================
// Billing Config
// =============================================================================

/// Billing switches.
///
/// ## Example (mesa.toml)
/// ```toml
/// [billing]
/// tax_rate_bps = 1600
/// pending_collection_enabled = true
/// same_day_policy = "enforce"
/// business_utc_offset_minutes = -360
///
/// [billing.side_effects]
/// inventory = "best_effort"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Allows `pending_collection` as a payment method.
    #[serde(default)]
    pub pending_collection_enabled: bool,

    #[serde(default = "default_true")]
    pub inventory_enabled: bool,

    #[serde(default = "default_true")]
    pub auto_deduct_inventory: bool,

    #[serde(default = "default_same_day_policy")]
    pub same_day_policy: SameDayPolicy,

    #[serde(default)]
    pub business_utc_offset_minutes: i32,

    #[serde(default = "default_min_reason_len")]
    pub min_cancellation_reason_len: usize,

    #[serde(default)]
    pub side_effects: SideEffectPolicies,

    #[serde(default)]
    pub evidence: EvidenceRules,
}

fn default_tax_rate_bps() -> u32 {
    TaxRate::STANDARD.bps()
}

fn default_true() -> bool {
    true
}

fn default_same_day_policy() -> SameDayPolicy {
    SameDayPolicy::Enforce
}

fn default_min_reason_len() -> usize {
    10
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            tax_rate_bps: default_tax_rate_bps(),
            pending_collection_enabled: false,
            inventory_enabled: true,
            auto_deduct_inventory: true,
            same_day_policy: default_same_day_policy(),
            business_utc_offset_minutes: 0,
            min_cancellation_reason_len: default_min_reason_len(),
            side_effects: SideEffectPolicies::default(),
            evidence: EvidenceRules::default(),
        }
    }
}

impl BillingConfig {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    pub fn calendar(&self) -> CoreResult<BusinessCalendar> {
        BusinessCalendar::with_offset_minutes(self.business_utc_offset_minutes)
    }

    /// Both inventory switches must be on for tickets to deduct stock.
    pub fn deducts_inventory(&self) -> bool {
        self.inventory_enabled && self.auto_deduct_inventory
    }

    /// Rejects methods this deployment does not accept.
    ///
    /// ## When This Fails
    /// - `pending_collection` while `pending_collection_enabled` is false
    pub fn check_payment_method(&self, method: PaymentMethod) -> CoreResult<()> {
        if method == PaymentMethod::PendingCollection && !self.pending_collection_enabled {
            return Err(CoreError::PaymentMethodDisabled {
                method: method.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Payment methods a cashier may pick right now.
    pub fn enabled_payment_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|m| self.check_payment_method(*m).is_ok())
            .collect()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.tax_rate_bps > 10_000 {
            return Err(CoreError::InvalidConfig(format!(
                "tax_rate_bps must be at most 10000, got {}",
                self.tax_rate_bps
            )));
        }
        self.calendar()?;
        if self.min_cancellation_reason_len == 0 {
            return Err(CoreError::InvalidConfig(
                "min_cancellation_reason_len must be greater than 0".into(),
            ));
        }
        if self.evidence.allowed_extensions.is_empty() {
            return Err(CoreError::InvalidConfig(
                "evidence.allowed_extensions must not be empty".into(),
            ));
        }
        if self.evidence.max_bytes == 0 {
            return Err(CoreError::InvalidConfig(
                "evidence.max_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.tax_rate(), TaxRate::STANDARD);
        assert!(!config.pending_collection_enabled);
        assert!(config.deducts_inventory());
        assert_eq!(config.side_effects.customer_stats, SideEffectPolicy::Transactional);
        assert_eq!(config.side_effects.inventory, SideEffectPolicy::BestEffort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pending_collection_gate() {
        let mut config = BillingConfig::default();
        let err = config
            .check_payment_method(PaymentMethod::PendingCollection)
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentMethodDisabled { .. }));
        assert_eq!(config.enabled_payment_methods().len(), 4);

        config.pending_collection_enabled = true;
        assert!(config.check_payment_method(PaymentMethod::PendingCollection).is_ok());
        assert_eq!(config.enabled_payment_methods().len(), 5);
    }

    #[test]
    fn test_inventory_needs_both_flags() {
        let mut config = BillingConfig::default();
        config.auto_deduct_inventory = false;
        assert!(!config.deducts_inventory());
        config.auto_deduct_inventory = true;
        config.inventory_enabled = false;
        assert!(!config.deducts_inventory());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "best-effort".parse::<SideEffectPolicy>().unwrap(),
            SideEffectPolicy::BestEffort
        );
        assert!("sometimes".parse::<SideEffectPolicy>().is_err());
        assert_eq!("ignore".parse::<SameDayPolicy>().unwrap(), SameDayPolicy::Ignore);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BillingConfig::default();
        config.tax_rate_bps = 20_000;
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.business_utc_offset_minutes = 5000;
        assert!(config.validate().is_err());
    }
}
