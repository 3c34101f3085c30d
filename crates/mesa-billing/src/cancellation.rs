//! # Cancellation and Reversal
//!
//! Cancels one ticket row and undoes what billing it did.
//!
//! ```text
//! validate reason (outside the transaction)
//!      │
//!      ▼
//! BEGIN IMMEDIATE
//!   row open?          ── no ──► TicketNotFound / AlreadyCancelled
//!   row → cancelled    (who, when, why)
//!   order → ready
//!   customer stats −= row total        (side_effects.customer_stats)
//!   audit entry                        (side_effects.cancellation_audit)
//! COMMIT
//! ```
//!
//! Inventory is not restocked: the food was cooked.

use chrono::Utc;
use tracing::{debug, info};

use crate::context::{open_effect, settle_effect, BillingContext};
use crate::coordinator::{begin, finish};
use crate::dto::CancelTicketRequest;
use crate::error::{BillingError, BillingResult};
use mesa_core::validation::validate_cancellation_reason;
use mesa_core::{OrderStatus, Ticket};
use mesa_db::{NewCancellation, UnitOfWork};

/// Cancels tickets.
#[derive(Debug, Clone)]
pub struct CancellationService {
    ctx: BillingContext,
}

impl CancellationService {
    pub fn new(ctx: BillingContext) -> Self {
        CancellationService { ctx }
    }

    /// Cancels the ticket row `ticket_id`. Returns the cancelled row.
    pub async fn cancel_ticket(&self, request: &CancelTicketRequest) -> BillingResult<Ticket> {
        debug!(ticket_id = %request.ticket_id, "cancel_ticket");
        let reason =
            validate_cancellation_reason(&request.reason, self.ctx.config.min_cancellation_reason_len)?;

        let mut conn = self
            .ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))?;
        let mut uow = begin(&mut conn).await?;
        let result = self
            .reverse(&mut uow, &request.ticket_id, &request.cancelled_by, &reason)
            .await;
        let ticket = finish(uow, result).await?;

        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            total_cents = ticket.total_cents,
            cancelled_by = %request.cancelled_by,
            "Ticket cancelled"
        );
        Ok(ticket)
    }

    async fn reverse(
        &self,
        uow: &mut UnitOfWork<'_>,
        ticket_id: &str,
        cancelled_by: &str,
        reason: &str,
    ) -> BillingResult<Ticket> {
        let tickets = self.ctx.db.tickets();
        let services = &self.ctx.services;

        let ticket = tickets
            .find(uow.conn(), ticket_id)
            .await?
            .ok_or_else(|| BillingError::TicketNotFound(ticket_id.to_string()))?;
        if ticket.is_cancelled() {
            return Err(BillingError::AlreadyCancelled {
                ticket_id: ticket_id.to_string(),
            });
        }

        let now = Utc::now();
        if !tickets.cancel(uow.conn(), ticket_id, cancelled_by, reason, now).await? {
            return Err(BillingError::AlreadyCancelled {
                ticket_id: ticket_id.to_string(),
            });
        }

        let order = services
            .orders
            .find(uow.conn(), &ticket.order_id)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(ticket.order_id.clone()))?;
        services
            .orders
            .transition_status(uow.conn(), &order.id, OrderStatus::Ready)
            .await?;

        if let Some(customer_id) = &order.customer_id {
            let savepoint = open_effect(uow, self.ctx.config.side_effects.customer_stats).await?;
            let outcome = services
                .customers
                .reverse_purchase(uow.conn(), customer_id, ticket.total())
                .await;
            settle_effect(uow, savepoint, "Customer statistics reversal", customer_id, outcome)
                .await?;
        }

        let savepoint = open_effect(uow, self.ctx.config.side_effects.cancellation_audit).await?;
        let outcome = self
            .ctx
            .db
            .cancellations()
            .record(
                uow.conn(),
                &NewCancellation {
                    ticket_id,
                    ticket_number: &ticket.ticket_number,
                    cancelled_by,
                    reason,
                    amount: ticket.total(),
                    cancelled_at: now,
                },
            )
            .await
            .map(|_| ());
        settle_effect(uow, savepoint, "Cancellation audit", ticket_id, outcome).await?;

        let cancelled = tickets
            .find(uow.conn(), ticket_id)
            .await?
            .ok_or_else(|| BillingError::TicketNotFound(ticket_id.to_string()))?;
        Ok(cancelled)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::TicketService;
    use crate::dto::{OrderTicket, TicketReceipt};
    use crate::testing::{ready, Floor, CASHIER};
    use mesa_core::{BillingConfig, PaymentMethod, TicketStatus};

    const REASON: &str = "Customer disputed the dish";

    async fn billed(floor: &Floor, ctx: &BillingContext, customer: bool) -> (String, TicketReceipt) {
        floor.table("table-5", 5).await;
        let mut spec = ready("table-5", 11600);
        if customer {
            floor.customer("cust-1", "Maria").await;
            spec = spec.customer("cust-1", "Maria");
        }
        let order_id = floor.order(spec).await;
        let receipt = TicketService::new(ctx.clone())
            .create_for_order(&OrderTicket {
                order_id: order_id.clone(),
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();
        (order_id, receipt)
    }

    fn request(ticket_id: &str, reason: &str) -> CancelTicketRequest {
        CancelTicketRequest {
            ticket_id: ticket_id.to_string(),
            reason: reason.to_string(),
            cancelled_by: "manager-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cancel_reverses_the_ticket() {
        let floor = Floor::new().await;
        let ctx = floor.context().await;
        let (order_id, receipt) = billed(&floor, &ctx, true).await;
        assert_eq!(floor.visits("cust-1").await, (1, 11600));
        let service = CancellationService::new(ctx);

        let ticket = service
            .cancel_ticket(&request(&receipt.ticket_ids[0], REASON))
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Cancelled);
        assert_eq!(ticket.cancelled_by.as_deref(), Some("manager-1"));
        assert_eq!(ticket.cancellation_reason.as_deref(), Some(REASON));
        assert!(ticket.cancelled_at.is_some());
        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Ready);
        assert_eq!(floor.visits("cust-1").await, (0, 0));

        let audit = floor
            .db
            .cancellations()
            .for_ticket(&ticket.id)
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].amount_cents, 11600);
    }

    #[tokio::test]
    async fn test_second_cancel_fails() {
        let floor = Floor::new().await;
        let ctx = floor.context().await;
        let (_, receipt) = billed(&floor, &ctx, false).await;
        let service = CancellationService::new(ctx);
        let req = request(&receipt.ticket_ids[0], REASON);

        service.cancel_ticket(&req).await.unwrap();
        let err = service.cancel_ticket(&req).await.unwrap_err();

        assert!(matches!(err, BillingError::AlreadyCancelled { .. }));
    }

    #[tokio::test]
    async fn test_short_reason_is_rejected_before_any_write() {
        let floor = Floor::new().await;
        let ctx = floor.context().await;
        let (order_id, receipt) = billed(&floor, &ctx, false).await;
        let service = CancellationService::new(ctx);

        let err = service
            .cancel_ticket(&request(&receipt.ticket_ids[0], "  oops   "))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let floor = Floor::new().await;
        let service = CancellationService::new(floor.context().await);

        let err = service
            .cancel_ticket(&request("missing", REASON))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::TicketNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancelled_order_can_be_billed_again() {
        let floor = Floor::new().await;
        let ctx = floor.context().await;
        let (order_id, receipt) = billed(&floor, &ctx, false).await;
        CancellationService::new(ctx.clone())
            .cancel_ticket(&request(&receipt.ticket_ids[0], REASON))
            .await
            .unwrap();

        let again = TicketService::new(ctx)
            .create_for_order(&OrderTicket {
                order_id: order_id.clone(),
                payment_method: PaymentMethod::Card,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        assert_ne!(again.ticket_number, receipt.ticket_number);
        assert_eq!(floor.ticket_rows().await, 2);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_block_cancellation() {
        let floor = Floor::new().await;
        let ctx = floor.context_with(BillingConfig::default()).await;
        let (order_id, receipt) = billed(&floor, &ctx, false).await;
        sqlx::query("DROP TABLE ticket_cancellations")
            .execute(floor.db.pool())
            .await
            .unwrap();
        let service = CancellationService::new(ctx);

        let ticket = service
            .cancel_ticket(&request(&receipt.ticket_ids[0], REASON))
            .await
            .unwrap();

        assert!(ticket.is_cancelled());
        assert_eq!(floor.order_status(&order_id).await, OrderStatus::Ready);
    }
}
