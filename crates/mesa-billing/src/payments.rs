//! # Payment Updates
//!
//! Changes how a ticket was paid after it was issued. Every open row sharing
//! the ticket number moves together; cancelled rows are left alone.

use chrono::Utc;
use tracing::{debug, info};

use crate::context::BillingContext;
use crate::coordinator::{begin, finish};
use crate::dto::PaymentUpdate;
use crate::error::{BillingError, BillingResult};
use mesa_core::validation::validate_evidence_file;
use mesa_core::{PaymentMethod, Ticket};
use mesa_db::UnitOfWork;

/// Updates payment methods and evidence.
#[derive(Debug, Clone)]
pub struct PaymentService {
    ctx: BillingContext,
}

impl PaymentService {
    pub fn new(ctx: BillingContext) -> Self {
        PaymentService { ctx }
    }

    /// Sets the payment method of a ticket, optionally attaching evidence.
    /// Returns the number of rows changed.
    pub async fn update_payment_method(&self, update: &PaymentUpdate) -> BillingResult<u64> {
        debug!(ticket_number = %update.ticket_number, method = %update.payment_method, "update_payment_method");
        self.ctx.accept_payment_method(update.payment_method)?;
        if let Some((file_name, size_bytes)) = &update.evidence {
            validate_evidence_file(file_name, *size_bytes, &self.ctx.config.evidence)?;
        }

        let mut conn = self
            .ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))?;
        let mut uow = begin(&mut conn).await?;
        let result = self.apply_update(&mut uow, update, None).await;
        let changed = finish(uow, result).await?;

        info!(
            ticket_number = %update.ticket_number,
            method = %update.payment_method,
            rows = changed,
            evidence = update.evidence.is_some(),
            "Payment method updated"
        );
        Ok(changed)
    }

    /// Settles a `pending_collection` ticket with the method actually used.
    pub async fn mark_as_paid(
        &self,
        ticket_number: &str,
        method: PaymentMethod,
        paid_by: &str,
    ) -> BillingResult<u64> {
        debug!(ticket_number, method = %method, "mark_as_paid");
        if !method.counts_as_income() {
            return Err(BillingError::InvalidPaymentMethod {
                value: method.as_str().to_string(),
            });
        }
        self.ctx.accept_payment_method(method)?;

        let update = PaymentUpdate {
            ticket_number: ticket_number.to_string(),
            payment_method: method,
            updated_by: paid_by.to_string(),
            evidence: None,
        };

        let mut conn = self
            .ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))?;
        let mut uow = begin(&mut conn).await?;
        let result = self
            .apply_update(&mut uow, &update, Some(PaymentMethod::PendingCollection))
            .await;
        let changed = finish(uow, result).await?;

        info!(ticket_number, method = %method, paid_by, "Pending ticket collected");
        Ok(changed)
    }

    async fn apply_update(
        &self,
        uow: &mut UnitOfWork<'_>,
        update: &PaymentUpdate,
        required_current: Option<PaymentMethod>,
    ) -> BillingResult<u64> {
        let tickets = self.ctx.db.tickets();
        let rows = tickets.find_by_number(uow.conn(), &update.ticket_number).await?;
        let open = open_rows(&update.ticket_number, &rows)?;

        if let Some(required) = required_current {
            if open.iter().any(|t| t.payment_method != required) {
                return Err(BillingError::NotPendingCollection {
                    ticket_number: update.ticket_number.clone(),
                });
            }
        }

        let changed = match tickets
            .update_payment_method(uow.conn(), &update.ticket_number, update.payment_method)
            .await
        {
            Ok(changed) => changed,
            Err(e) if e.is_check_violation("ck_tickets_payment_method") => {
                return Err(BillingError::schema_rejected_payment_method(
                    update.payment_method.as_str(),
                ))
            }
            Err(e) => return Err(BillingError::persistence("Updating payment method", e)),
        };

        if let Some((file_name, _)) = &update.evidence {
            tickets
                .attach_evidence(
                    uow.conn(),
                    &update.ticket_number,
                    file_name,
                    &update.updated_by,
                    Utc::now(),
                )
                .await?;
        }

        Ok(changed)
    }
}

/// Open rows of a ticket number; errors when there are none.
pub(crate) fn open_rows<'a>(ticket_number: &str, rows: &'a [Ticket]) -> BillingResult<Vec<&'a Ticket>> {
    if rows.is_empty() {
        return Err(BillingError::TicketNotFound(ticket_number.to_string()));
    }
    let open: Vec<&Ticket> = rows.iter().filter(|t| !t.is_cancelled()).collect();
    if open.is_empty() {
        return Err(BillingError::TicketCancelled {
            ticket_number: ticket_number.to_string(),
        });
    }
    Ok(open)
}

// =============================================================================
// Unit Tests
// =============================================================================
