//! # Gratuities
//!
//! Tips on a ticket, and tips recorded without one.
//!
//! A percentage tip is computed over the whole bill: the sum of the totals of
//! every open row sharing the ticket number. The resulting amount is written
//! to each of those rows, so reports count it once per ticket number.

use chrono::Utc;
use tracing::{debug, info};

use crate::context::BillingContext;
use crate::coordinator::{begin, finish};
use crate::dto::{AddTipRequest, ManualTipRequest, TipInput};
use crate::error::{BillingError, BillingResult};
use crate::payments::open_rows;
use mesa_core::validation::{validate_required, validate_tip_amount, validate_tip_percentage_bps};
use mesa_core::{ManualTip, Money};
use mesa_db::{TipUpdate, UnitOfWork};

/// Records tips.
#[derive(Debug, Clone)]
pub struct GratuityService {
    ctx: BillingContext,
}

impl GratuityService {
    pub fn new(ctx: BillingContext) -> Self {
        GratuityService { ctx }
    }

    /// Adds a tip to a ticket. Returns the tip amount.
    ///
    /// A second call replaces the first tip.
    pub async fn add_tip(&self, request: &AddTipRequest) -> BillingResult<Money> {
        debug!(ticket_number = %request.ticket_number, tip = ?request.tip, "add_tip");
        match request.tip {
            TipInput::PercentageBps(bps) => validate_tip_percentage_bps(bps)?,
            TipInput::AmountCents(cents) => validate_tip_amount(cents)?,
        }
        validate_required("added_by", &request.added_by)?;

        let mut conn = self
            .ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))?;
        let mut uow = begin(&mut conn).await?;
        let result = self.apply_tip(&mut uow, request).await;
        let amount = finish(uow, result).await?;

        info!(ticket_number = %request.ticket_number, amount = %amount, "Tip added");
        Ok(amount)
    }

    async fn apply_tip(
        &self,
        uow: &mut UnitOfWork<'_>,
        request: &AddTipRequest,
    ) -> BillingResult<Money> {
        let tickets = self.ctx.db.tickets();
        let rows = tickets.find_by_number(uow.conn(), &request.ticket_number).await?;
        let open = open_rows(&request.ticket_number, &rows)?;

        let (amount, percentage_bps) = match request.tip {
            TipInput::PercentageBps(bps) => {
                let bill: Money = open.iter().map(|t| t.total()).sum();
                (bill.apply_bps(bps), Some(i64::from(bps)))
            }
            TipInput::AmountCents(cents) => (Money::from_cents(cents), None),
        };

        let tip_date = self.ctx.calendar().day_of(Utc::now());
        tickets
            .apply_tip(
                uow.conn(),
                &request.ticket_number,
                &TipUpdate {
                    amount_cents: amount.cents(),
                    percentage_bps,
                    tip_date,
                    added_by: &request.added_by,
                },
            )
            .await?;

        Ok(amount)
    }

    /// Records a tip that belongs to no ticket. The date defaults to the
    /// current business day.
    pub async fn add_manual_tip(&self, request: &ManualTipRequest) -> BillingResult<ManualTip> {
        validate_tip_amount(request.amount_cents)?;
        validate_required("added_by", &request.added_by)?;
        let tip_date = request
            .tip_date
            .unwrap_or_else(|| self.ctx.calendar().day_of(Utc::now()));

        let mut conn = self
            .ctx
            .db
            .acquire()
            .await
            .map_err(|e| BillingError::persistence("Acquiring connection", e))?;
        let tip = self
            .ctx
            .db
            .manual_tips()
            .insert(
                &mut conn,
                Money::from_cents(request.amount_cents),
                tip_date,
                &request.added_by,
                request.note.as_deref(),
            )
            .await
            .map_err(|e| BillingError::persistence("Recording manual tip", e))?;

        info!(id = %tip.id, amount_cents = tip.amount_cents, tip_date = %tip.tip_date, "Manual tip recorded");
        Ok(tip)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
