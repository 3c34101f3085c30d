//! # Reports
//!
//! Read-only views over committed tickets, tips and cash flow. Every query
//! runs on the pool; nothing here opens a transaction.
//!
//! ## Counting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales        all methods, open rows (cancelled only on request)        │
//! │  income       sales minus pending_collection                            │
//! │  tickets      COUNT(DISTINCT ticket_number), never rows                 │
//! │  tips         once per ticket number + manual tips                      │
//! │  days         business_day of the ticket, not the order                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::context::BillingContext;
use crate::error::BillingResult;
use mesa_core::validation::validate_date_range;
use mesa_core::{ManualTip, PaymentMethod, Ticket};
use mesa_db::{
    CountAndTotal, DailyIncome, DailyMethodSales, DayRange, MethodSales, ReportRepository,
    SalesTotals, TicketSummary, TicketTip,
};

// =============================================================================
// Report Types
// =============================================================================

/// Sales of one business day.
#[derive(Debug, Clone, Serialize)]
pub struct DailySales {
    pub day: NaiveDate,
    pub by_method: Vec<MethodSales>,
    pub totals: SalesTotals,
    /// Same as `totals` without pending collection.
    pub income: SalesTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncomeReport {
    pub range: DayRange,
    pub totals: SalesTotals,
    pub by_day: Vec<DailyIncome>,
    pub by_method: Vec<MethodSales>,
}

/// One day of income against money going out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBalance {
    pub day: NaiveDate,
    pub income_cents: i64,
    pub expenses_cents: i64,
    pub withdrawals_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub range: DayRange,
    /// Newest day first.
    pub days: Vec<DailyBalance>,
    pub income_cents: i64,
    pub expenses_cents: i64,
    pub withdrawals_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TipsReport {
    pub range: DayRange,
    pub ticket_tips: Vec<TicketTip>,
    pub manual_tips: Vec<ManualTip>,
    pub ticket_tips_cents: i64,
    pub manual_tips_cents: i64,
    pub total_cents: i64,
}

/// A payment method's slice of sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodShare {
    pub payment_method: PaymentMethod,
    pub ticket_count: i64,
    pub total_cents: i64,
    /// Share of all sales in basis points.
    pub share_bps: i64,
}

// =============================================================================
// Service
// =============================================================================

/// Report facade.
#[derive(Debug, Clone)]
pub struct ReportService {
    ctx: BillingContext,
}

impl ReportService {
    pub fn new(ctx: BillingContext) -> Self {
        ReportService { ctx }
    }

    fn repo(&self) -> ReportRepository {
        self.ctx.db.reports()
    }

    pub async fn daily_sales(&self, day: NaiveDate) -> BillingResult<DailySales> {
        let range = DayRange::single(day);
        let repo = self.repo();
        Ok(DailySales {
            day,
            by_method: repo.sales_by_method(range, false).await?,
            totals: repo.sales_totals(range, false).await?,
            income: repo.income_totals(range, false).await?,
        })
    }

    pub async fn sales_by_date_and_method(
        &self,
        range: DayRange,
        include_cancelled: bool,
    ) -> BillingResult<Vec<DailyMethodSales>> {
        check_range(range)?;
        Ok(self
            .repo()
            .sales_by_day_and_method(range, include_cancelled)
            .await?)
    }

    /// Money received, excluding pending collection.
    pub async fn income(&self, range: DayRange, include_cancelled: bool) -> BillingResult<IncomeReport> {
        check_range(range)?;
        let repo = self.repo();
        let by_method = repo
            .sales_by_method(range, include_cancelled)
            .await?
            .into_iter()
            .filter(|m| m.payment_method.counts_as_income())
            .collect();
        Ok(IncomeReport {
            range,
            totals: repo.income_totals(range, include_cancelled).await?,
            by_day: repo.income_by_day(range, include_cancelled).await?,
            by_method,
        })
    }

    /// Income against expenses and cash withdrawals, per day.
    pub async fn income_vs_expenses(&self, range: DayRange) -> BillingResult<BalanceReport> {
        check_range(range)?;
        let repo = self.repo();

        let mut days: BTreeMap<NaiveDate, DailyBalance> = BTreeMap::new();
        for income in repo.income_by_day(range, false).await? {
            balance_for(&mut days, income.business_day).income_cents += income.total_cents;
        }
        for expense in repo.expenses_by_day(range).await? {
            balance_for(&mut days, expense.day).expenses_cents += expense.amount_cents;
        }
        for withdrawal in repo.withdrawals_by_day(range).await? {
            balance_for(&mut days, withdrawal.day).withdrawals_cents += withdrawal.amount_cents;
        }

        let mut report = BalanceReport {
            range,
            days: Vec::with_capacity(days.len()),
            income_cents: 0,
            expenses_cents: 0,
            withdrawals_cents: 0,
            net_cents: 0,
        };
        for (_, mut day) in days.into_iter().rev() {
            day.net_cents = day.income_cents - day.expenses_cents - day.withdrawals_cents;
            report.income_cents += day.income_cents;
            report.expenses_cents += day.expenses_cents;
            report.withdrawals_cents += day.withdrawals_cents;
            report.net_cents += day.net_cents;
            report.days.push(day);
        }
        Ok(report)
    }

    /// Open bills awaiting collection; `search` matches customer or table.
    pub async fn pending_payments(&self, search: Option<&str>) -> BillingResult<Vec<TicketSummary>> {
        Ok(self.repo().pending_collection(normalize_search(search)).await?)
    }

    pub async fn pending_collection_total(&self, range: DayRange) -> BillingResult<CountAndTotal> {
        self.method_total(PaymentMethod::PendingCollection, range).await
    }

    pub async fn in_kind_total(&self, range: DayRange) -> BillingResult<CountAndTotal> {
        self.method_total(PaymentMethod::InKindExchange, range).await
    }

    pub async fn method_total(
        &self,
        method: PaymentMethod,
        range: DayRange,
    ) -> BillingResult<CountAndTotal> {
        check_range(range)?;
        Ok(self.repo().method_total(method, range).await?)
    }

    pub async fn tickets_by_method(
        &self,
        method: PaymentMethod,
        range: DayRange,
    ) -> BillingResult<Vec<Ticket>> {
        check_range(range)?;
        Ok(self.repo().tickets_by_method(method, range).await?)
    }

    /// Bills of one business day, grouped by ticket number.
    pub async fn tickets_for_day(
        &self,
        day: NaiveDate,
        cashier_id: Option<&str>,
        search: Option<&str>,
    ) -> BillingResult<Vec<TicketSummary>> {
        Ok(self
            .repo()
            .tickets_for_day(day, normalize_search(cashier_id), normalize_search(search))
            .await?)
    }

    pub async fn tips(&self, range: DayRange) -> BillingResult<TipsReport> {
        check_range(range)?;
        let repo = self.repo();
        let ticket_tips = repo.ticket_tips(range).await?;
        let manual_tips = repo.manual_tips(range).await?;

        let ticket_tips_cents = ticket_tips.iter().map(|t| t.tip_amount_cents).sum();
        let manual_tips_cents = manual_tips.iter().map(|t| t.amount_cents).sum();
        debug!(ticket_tips = ticket_tips.len(), manual_tips = manual_tips.len(), "Tips report");

        Ok(TipsReport {
            range,
            ticket_tips,
            manual_tips,
            ticket_tips_cents,
            manual_tips_cents,
            total_cents: ticket_tips_cents + manual_tips_cents,
        })
    }

    /// Rows cancelled during the given business days.
    pub async fn cancelled_tickets(&self, range: DayRange) -> BillingResult<Vec<Ticket>> {
        check_range(range)?;
        let calendar = self.ctx.calendar();
        let (start, _) = calendar.bounds(range.from);
        let (_, end) = calendar.bounds(range.to);
        Ok(self.repo().cancelled_between(start, end).await?)
    }

    /// Each method's share of sales over the range, largest first.
    pub async fn payment_method_stats(&self, range: DayRange) -> BillingResult<Vec<MethodShare>> {
        check_range(range)?;
        let sales = self.repo().sales_by_method(range, false).await?;
        let grand_total: i64 = sales.iter().map(|m| m.total_cents).sum();

        Ok(sales
            .into_iter()
            .map(|m| MethodShare {
                payment_method: m.payment_method,
                ticket_count: m.ticket_count,
                total_cents: m.total_cents,
                share_bps: if grand_total > 0 {
                    m.total_cents * 10_000 / grand_total
                } else {
                    0
                },
            })
            .collect())
    }
}

fn balance_for(days: &mut BTreeMap<NaiveDate, DailyBalance>, day: NaiveDate) -> &mut DailyBalance {
    days.entry(day).or_insert_with(|| DailyBalance {
        day,
        income_cents: 0,
        expenses_cents: 0,
        withdrawals_cents: 0,
        net_cents: 0,
    })
}

fn check_range(range: DayRange) -> BillingResult<()> {
    validate_date_range(range.from, range.to)?;
    Ok(())
}

fn normalize_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationService;
    use crate::coordinator::TicketService;
    use crate::dto::{
        AddTipRequest, CancelTicketRequest, GroupingMode, ManualTipRequest, OrderTicket,
        TableTickets, TicketReceipt, TipInput,
    };
    use crate::gratuity::GratuityService;
    use crate::testing::{ready, Floor, CASHIER};
    use chrono::Utc;
    use mesa_core::{BillingConfig, Money};

    struct Day {
        floor: Floor,
        ctx: BillingContext,
        today: NaiveDate,
    }

    async fn day() -> Day {
        let floor = Floor::new().await;
        floor.table("table-1", 1).await;
        floor.table("table-2", 2).await;
        let ctx = floor
            .context_with(BillingConfig {
                pending_collection_enabled: true,
                ..BillingConfig::default()
            })
            .await;
        let today = ctx.calendar().day_of(Utc::now());
        Day { floor, ctx, today }
    }

    impl Day {
        async fn bill(&self, table: &str, cents: &[i64], method: PaymentMethod) -> TicketReceipt {
            for c in cents {
                self.floor.order(ready(table, *c).named("Maria")).await;
            }
            TicketService::new(self.ctx.clone())
                .create_for_table(&TableTickets {
                    table_id: table.into(),
                    mode: GroupingMode::Table,
                    payment_method: method,
                    cashier_id: CASHIER.into(),
                })
                .await
                .unwrap()
                .remove(0)
        }

        fn reports(&self) -> ReportService {
            ReportService::new(self.ctx.clone())
        }
    }

    #[tokio::test]
    async fn test_daily_sales_count_bills_not_rows() {
        let d = day().await;
        d.bill("table-1", &[6000, 4000], PaymentMethod::Cash).await;
        d.bill("table-2", &[5000], PaymentMethod::PendingCollection).await;

        let sales = d.reports().daily_sales(d.today).await.unwrap();

        assert_eq!(sales.totals.ticket_count, 2);
        assert_eq!(sales.totals.row_count, 3);
        assert_eq!(sales.totals.total_cents, 15000);
        assert_eq!(sales.income.ticket_count, 1);
        assert_eq!(sales.income.total_cents, 10000);

        let cash = sales
            .by_method
            .iter()
            .find(|m| m.payment_method == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash.ticket_count, 1);
        assert_eq!(cash.total_cents, 10000);
    }

    #[tokio::test]
    async fn test_cancelled_rows_leave_income_unless_requested() {
        let d = day().await;
        let receipt = d.bill("table-1", &[6000, 4000], PaymentMethod::Card).await;
        CancellationService::new(d.ctx.clone())
            .cancel_ticket(&CancelTicketRequest {
                ticket_id: receipt.ticket_ids[1].clone(),
                reason: "Dish sent back to kitchen".into(),
                cancelled_by: "manager-1".into(),
            })
            .await
            .unwrap();
        let range = DayRange::single(d.today);

        let income = d.reports().income(range, false).await.unwrap();
        assert_eq!(income.totals.total_cents, 6000);
        assert_eq!(income.by_day.len(), 1);

        let with_cancelled = d.reports().income(range, true).await.unwrap();
        assert_eq!(with_cancelled.totals.total_cents, 10000);

        let cancelled = d.reports().cancelled_tickets(range).await.unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, receipt.ticket_ids[1]);
    }

    #[tokio::test]
    async fn test_income_vs_expenses_nets_each_day() {
        let d = day().await;
        d.bill("table-1", &[20000], PaymentMethod::Cash).await;
        let finance = d.floor.db.finance();
        finance
            .record_expense("Produce", Money::from_cents(5000), d.today, "manager-1")
            .await
            .unwrap();
        finance
            .record_withdrawal("Change run", Money::from_cents(2000), d.today, "manager-1")
            .await
            .unwrap();
        let yesterday = d.today.pred_opt().unwrap();
        finance
            .record_expense("Gas", Money::from_cents(1000), yesterday, "manager-1")
            .await
            .unwrap();

        let report = d
            .reports()
            .income_vs_expenses(DayRange::new(yesterday, d.today))
            .await
            .unwrap();

        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[0].day, d.today);
        assert_eq!(report.days[0].net_cents, 13000);
        assert_eq!(report.days[1].net_cents, -1000);
        assert_eq!(report.net_cents, 12000);
    }

    #[tokio::test]
    async fn test_pending_and_in_kind_totals() {
        let d = day().await;
        d.bill("table-1", &[3000, 2000], PaymentMethod::PendingCollection).await;
        d.bill("table-2", &[7000], PaymentMethod::InKindExchange).await;
        let range = DayRange::single(d.today);
        let reports = d.reports();

        let pending = reports.pending_collection_total(range).await.unwrap();
        assert_eq!(pending.ticket_count, 1);
        assert_eq!(pending.total_cents, 5000);

        let in_kind = reports.in_kind_total(range).await.unwrap();
        assert_eq!(in_kind.total_cents, 7000);

        let list = reports.pending_payments(Some("  mar ")).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].order_count, 2);
        assert!(reports.pending_payments(Some("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tips_count_once_per_number_plus_manual() {
        let d = day().await;
        let receipt = d.bill("table-1", &[8000, 3600], PaymentMethod::Card).await;
        let gratuity = GratuityService::new(d.ctx.clone());
        gratuity
            .add_tip(&AddTipRequest {
                ticket_number: receipt.ticket_number.clone(),
                tip: TipInput::PercentageBps(1000),
                added_by: CASHIER.into(),
            })
            .await
            .unwrap();
        gratuity
            .add_manual_tip(&ManualTipRequest {
                amount_cents: 500,
                added_by: CASHIER.into(),
                tip_date: None,
                note: None,
            })
            .await
            .unwrap();

        let tips = d.reports().tips(DayRange::single(d.today)).await.unwrap();

        assert_eq!(tips.ticket_tips.len(), 1);
        assert_eq!(tips.ticket_tips_cents, 1160);
        assert_eq!(tips.manual_tips_cents, 500);
        assert_eq!(tips.total_cents, 1660);
    }

    #[tokio::test]
    async fn test_method_stats_and_day_listing() {
        let d = day().await;
        d.bill("table-1", &[7500], PaymentMethod::Cash).await;
        d.bill("table-2", &[2500], PaymentMethod::Card).await;
        let reports = d.reports();

        let stats = reports
            .payment_method_stats(DayRange::single(d.today))
            .await
            .unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].payment_method, PaymentMethod::Cash);
        assert_eq!(stats[0].share_bps, 7500);
        assert_eq!(stats[1].share_bps, 2500);

        let bills = reports.tickets_for_day(d.today, None, Some("2")).await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].table_number, Some(2));

        let by_day = reports
            .sales_by_date_and_method(DayRange::single(d.today), false)
            .await
            .unwrap();
        assert_eq!(by_day.len(), 2);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let d = day().await;
        let tomorrow = d.today.succ_opt().unwrap();

        let err = d
            .reports()
            .tips(DayRange::new(tomorrow, d.today))
            .await
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_expired_ticket_counts_on_settlement_day() {
        let d = day().await;
        let order_id = d
            .floor
            .order(ready("table-1", 4200).days_ago(1))
            .await;
        TicketService::new(d.ctx.clone())
            .create_for_expired_order(&OrderTicket {
                order_id,
                payment_method: PaymentMethod::Cash,
                cashier_id: CASHIER.into(),
            })
            .await
            .unwrap();

        let sales = d.reports().daily_sales(d.today).await.unwrap();
        assert_eq!(sales.totals.total_cents, 4200);
    }
}
