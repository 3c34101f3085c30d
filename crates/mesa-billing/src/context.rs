//! # Billing Context
//!
//! State shared by every billing service: the database, the deployment's
//! billing rules, the collaborators, and the payment-method domain.
//!
//! ## Payment-Method Domain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment_methods table (shipped by migration)                           │
//! │       │  loaded once, at BillingContext::load                           │
//! │       ▼                                                                 │
//! │  PaymentDomain ── accept(method)                                        │
//! │       ├── PaymentMethodDisabled   gate switched off in BillingConfig    │
//! │       └── SchemaRejectedValue     method known to code, not deployed    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No request ever inspects the schema; a deployment that lags the code is
//! detected by the domain check before any insert.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BillingError, BillingResult};
use mesa_core::{Aggregator, BillingConfig, BusinessCalendar, PaymentMethod, SideEffectPolicy};
use mesa_db::{Collaborators, Database, DbResult, Savepoint, UnitOfWork};

// =============================================================================
// Payment Domain
// =============================================================================

/// Payment methods the deployed schema accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDomain {
    deployed: Vec<PaymentMethod>,
}

impl PaymentDomain {
    pub fn new(deployed: Vec<PaymentMethod>) -> Self {
        PaymentDomain { deployed }
    }

    pub fn contains(&self, method: PaymentMethod) -> bool {
        self.deployed.contains(&method)
    }

    pub fn methods(&self) -> &[PaymentMethod] {
        &self.deployed
    }

    /// Checks the configuration gate, then the deployed domain.
    pub fn accept(&self, config: &BillingConfig, method: PaymentMethod) -> BillingResult<()> {
        config.check_payment_method(method)?;
        if !self.contains(method) {
            return Err(BillingError::schema_rejected_payment_method(method.as_str()));
        }
        Ok(())
    }
}

// =============================================================================
// Context
// =============================================================================

/// Everything a billing service needs. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub(crate) db: Database,
    pub(crate) config: Arc<BillingConfig>,
    pub(crate) aggregator: Aggregator,
    pub(crate) services: Collaborators,
    pub(crate) payments: Arc<PaymentDomain>,
}

impl BillingContext {
    /// Validates the configuration and loads the payment domain.
    pub async fn load(db: Database, config: BillingConfig) -> BillingResult<Self> {
        let services = Collaborators::sql(&db);
        Self::load_with(db, config, services).await
    }

    /// Same as [`BillingContext::load`] with caller-supplied collaborators.
    pub async fn load_with(
        db: Database,
        config: BillingConfig,
        services: Collaborators,
    ) -> BillingResult<Self> {
        config.validate()?;
        let aggregator = Aggregator::new(&config)?;

        let deployed = db
            .payment_methods()
            .deployed()
            .await
            .map_err(|e| BillingError::persistence("Loading payment methods", e))?;
        info!(methods = deployed.len(), "Payment-method domain loaded");

        for method in config.enabled_payment_methods() {
            if !deployed.contains(&method) {
                warn!(method = %method, "Enabled payment method is not deployed; tickets using it will be rejected");
            }
        }

        Ok(BillingContext {
            db,
            config: Arc::new(config),
            aggregator,
            services,
            payments: Arc::new(PaymentDomain::new(deployed)),
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn calendar(&self) -> BusinessCalendar {
        self.aggregator.calendar()
    }

    pub fn payment_domain(&self) -> &PaymentDomain {
        &self.payments
    }

    /// Methods a cashier may pick: enabled by config and deployed.
    pub fn selectable_payment_methods(&self) -> Vec<PaymentMethod> {
        self.config
            .enabled_payment_methods()
            .into_iter()
            .filter(|m| self.payments.contains(*m))
            .collect()
    }

    pub(crate) fn accept_payment_method(&self, method: PaymentMethod) -> BillingResult<()> {
        self.payments.accept(&self.config, method)
    }
}

// =============================================================================
// Side Effects
// =============================================================================

/// Opens a savepoint when the effect is best-effort.
pub(crate) async fn open_effect(
    uow: &mut UnitOfWork<'_>,
    policy: SideEffectPolicy,
) -> BillingResult<Option<Savepoint>> {
    if !policy.is_best_effort() {
        return Ok(None);
    }
    let savepoint = uow
        .savepoint()
        .await
        .map_err(|e| BillingError::persistence("Opening savepoint", e))?;
    Ok(Some(savepoint))
}

/// Applies the policy to an effect's outcome.
///
/// ```text
/// transactional  Ok → Ok              Err → Err (caller rolls back)
/// best_effort    Ok → release         Err → warn, rollback to savepoint, Ok
/// ```
pub(crate) async fn settle_effect(
    uow: &mut UnitOfWork<'_>,
    savepoint: Option<Savepoint>,
    effect: &'static str,
    subject: &str,
    outcome: DbResult<()>,
) -> BillingResult<()> {
    match (outcome, savepoint) {
        (Ok(()), None) => Ok(()),
        (Ok(()), Some(savepoint)) => uow
            .release_savepoint(savepoint)
            .await
            .map_err(|e| BillingError::persistence("Releasing savepoint", e)),
        (Err(err), None) => Err(BillingError::persistence(effect, err)),
        (Err(err), Some(savepoint)) => {
            warn!(effect, subject, error = %err, "Best-effort side effect failed, continuing");
            uow.rollback_to_savepoint(savepoint)
                .await
                .map_err(|e| BillingError::persistence("Rolling back savepoint", e))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Floor;
    use mesa_db::DbError;

    #[test]
    fn test_domain_checks_gate_before_deployment() {
        let domain = PaymentDomain::new(vec![PaymentMethod::Cash]);
        let config = BillingConfig::default();

        assert!(domain.accept(&config, PaymentMethod::Cash).is_ok());
        assert!(matches!(
            domain.accept(&config, PaymentMethod::Card),
            Err(BillingError::SchemaRejectedValue { .. })
        ));
        assert!(matches!(
            domain.accept(&config, PaymentMethod::PendingCollection),
            Err(BillingError::PaymentMethodDisabled { .. })
        ));
    }

    #[tokio::test]
    async fn test_selectable_methods_follow_config() {
        let floor = Floor::new().await;
        let ctx = floor.context().await;

        let methods = ctx.selectable_payment_methods();
        assert!(methods.contains(&PaymentMethod::Cash));
        assert!(!methods.contains(&PaymentMethod::PendingCollection));
        assert_eq!(ctx.payment_domain().methods().len(), PaymentMethod::ALL.len());
    }

    #[tokio::test]
    async fn test_best_effort_failure_discards_partial_writes() {
        let floor = Floor::new().await;
        floor.table("table-1", 1).await;
        let mut conn = floor.db.acquire().await.unwrap();
        let mut uow = UnitOfWork::begin(&mut conn).await.unwrap();

        let savepoint = open_effect(&mut uow, SideEffectPolicy::BestEffort)
            .await
            .unwrap();
        assert!(savepoint.is_some());
        sqlx::query("UPDATE dining_tables SET status = 'available'")
            .execute(uow.conn())
            .await
            .unwrap();
        let outcome: DbResult<()> = Err(DbError::Internal("boom".into()));
        settle_effect(&mut uow, savepoint, "Test effect", "table-1", outcome)
            .await
            .unwrap();
        uow.commit().await.unwrap();
        drop(conn);

        assert_eq!(
            floor.table_status("table-1").await,
            mesa_core::TableStatus::Occupied
        );
    }

    #[tokio::test]
    async fn test_transactional_failure_is_returned() {
        let floor = Floor::new().await;
        let mut conn = floor.db.acquire().await.unwrap();
        let mut uow = UnitOfWork::begin(&mut conn).await.unwrap();

        let savepoint = open_effect(&mut uow, SideEffectPolicy::Transactional)
            .await
            .unwrap();
        assert!(savepoint.is_none());
        let outcome: DbResult<()> = Err(DbError::Internal("boom".into()));
        let err = settle_effect(&mut uow, savepoint, "Test effect", "x", outcome)
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        uow.rollback().await;
    }
}
