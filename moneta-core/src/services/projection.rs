//! Debt payoff projection
//!
//! Pure month-by-month amortization. Nothing here touches the ledger.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Debt, RepaymentStrategy};

/// Simulation stops here when balances have not reached zero
pub const MAX_MONTHS: u32 = 360;

/// Order debts for extra-payment allocation. Ties keep their input order.
pub fn sort_debts(debts: &[Debt], strategy: RepaymentStrategy) -> Vec<Debt> {
    let mut sorted = debts.to_vec();
    match strategy {
        RepaymentStrategy::Snowball => sorted.sort_by(|a, b| a.total_amount.cmp(&b.total_amount)),
        RepaymentStrategy::Avalanche => sorted.sort_by(|a, b| b.interest_rate.cmp(&a.interest_rate)),
    }
    sorted
}

/// Totals for one simulated month, across all debts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSnapshot {
    /// 1-based month number
    pub month: u32,
    pub date: NaiveDate,
    pub interest: Decimal,
    pub paid: Decimal,
    /// Outstanding balance after this month's payments
    pub remaining: Decimal,
}

/// Per-debt outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtPayoff {
    pub debt_id: Uuid,
    pub name: String,
    /// Month in which the balance reached zero, if it did
    pub paid_off_month: Option<u32>,
    pub interest_paid: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    /// Months simulated; equals [`MAX_MONTHS`] when the plan does not converge
    pub months_to_payoff: u32,
    pub total_interest: Decimal,
    /// Interest avoided against the zero-extra baseline; 0 unless computed by [`plan`]
    pub saved_interest: Decimal,
    pub converged: bool,
    pub schedule: Vec<MonthSnapshot>,
    pub payoffs: Vec<DebtPayoff>,
}

struct Running {
    balance: Decimal,
    interest_paid: Decimal,
    paid_off_month: Option<u32>,
}

/// Simulate `sorted` debts from `start`, one calendar month per step.
///
/// Each month every started debt accrues interest on its pre-payment balance
/// in exact decimal arithmetic and pays its minimum, capped at the balance. The extra
/// amount then goes to debts in the given order. Arithmetic overflow ends the
/// run as non-converged.
pub fn project(sorted: &[Debt], monthly_extra: Decimal, start: NaiveDate) -> Projection {
    let mut state: Vec<Running> = sorted
        .iter()
        .map(|d| Running {
            balance: d.total_amount,
            interest_paid: Decimal::ZERO,
            paid_off_month: if d.total_amount > Decimal::ZERO { None } else { Some(0) },
        })
        .collect();

    let mut schedule = Vec::new();
    let mut total_interest = Decimal::ZERO;
    let mut months = 0u32;
    let mut overflowed = false;

    while months < MAX_MONTHS && state.iter().any(|s| s.balance > Decimal::ZERO) {
        let Some(date) = start.checked_add_months(Months::new(months)) else {
            overflowed = true;
            break;
        };
        match simulate_month(sorted, &mut state, monthly_extra, date, months + 1) {
            Some((interest, paid)) => {
                total_interest += interest;
                months += 1;
                schedule.push(MonthSnapshot {
                    month: months,
                    date,
                    interest,
                    paid,
                    remaining: state.iter().map(|s| s.balance.max(Decimal::ZERO)).sum(),
                });
            }
            None => {
                overflowed = true;
                break;
            }
        }
    }

    let converged = !overflowed && state.iter().all(|s| s.balance <= Decimal::ZERO);
    if overflowed {
        tracing::debug!(month = months, "projection overflowed; reporting cap");
    }

    Projection {
        months_to_payoff: if converged { months } else { MAX_MONTHS },
        total_interest,
        saved_interest: Decimal::ZERO,
        converged,
        schedule,
        payoffs: sorted
            .iter()
            .zip(&state)
            .map(|(debt, s)| DebtPayoff {
                debt_id: debt.id,
                name: debt.name.clone(),
                paid_off_month: s.paid_off_month,
                interest_paid: s.interest_paid,
            })
            .collect(),
    }
}

/// One month of interest, minimums and extra. Returns (interest, paid), or
/// `None` on overflow.
fn simulate_month(
    sorted: &[Debt],
    state: &mut [Running],
    monthly_extra: Decimal,
    date: NaiveDate,
    month: u32,
) -> Option<(Decimal, Decimal)> {
    let mut interest_total = Decimal::ZERO;
    let mut paid_total = Decimal::ZERO;

    for (debt, s) in sorted.iter().zip(state.iter_mut()) {
        if s.balance <= Decimal::ZERO || !debt.has_started(date) {
            continue;
        }
        let rate = debt.interest_rate / Decimal::ONE_HUNDRED;
        let interest = s.balance.checked_mul(rate)?;
        s.balance = s.balance.checked_add(interest)?;
        s.interest_paid = s.interest_paid.checked_add(interest)?;
        interest_total = interest_total.checked_add(interest)?;

        let payment = debt.minimum_payment.max(Decimal::ZERO).min(s.balance);
        s.balance -= payment;
        paid_total += payment;
    }

    let mut extra = monthly_extra.max(Decimal::ZERO);
    for (debt, s) in sorted.iter().zip(state.iter_mut()) {
        if extra <= Decimal::ZERO {
            break;
        }
        if s.balance <= Decimal::ZERO || !debt.has_started(date) {
            continue;
        }
        let payment = extra.min(s.balance);
        s.balance -= payment;
        paid_total += payment;
        extra -= payment;
    }

    for s in state.iter_mut() {
        if s.balance <= Decimal::ZERO && s.paid_off_month.is_none() {
            s.paid_off_month = Some(month);
        }
    }

    Some((interest_total, paid_total))
}

/// A strategy applied to a set of debts, compared against paying minimums only
#[derive(Debug, Clone, Serialize)]
pub struct DebtPlan {
    pub strategy: RepaymentStrategy,
    pub monthly_extra: Decimal,
    /// Debt ids in allocation order
    pub order: Vec<Uuid>,
    pub projection: Projection,
}

/// Sort, project, and fill `saved_interest` against the zero-extra baseline
pub fn plan(debts: &[Debt], strategy: RepaymentStrategy, monthly_extra: Decimal, start: NaiveDate) -> DebtPlan {
    let sorted = sort_debts(debts, strategy);
    let mut projection = project(&sorted, monthly_extra, start);
    if monthly_extra > Decimal::ZERO {
        let baseline = project(&sorted, Decimal::ZERO, start);
        projection.saved_interest = baseline.total_interest - projection.total_interest;
    }
    DebtPlan {
        strategy,
        monthly_extra,
        order: sorted.iter().map(|d| d.id).collect(),
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OwnerId;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn debt(name: &str, total: Decimal, rate: Decimal, minimum: Decimal) -> Debt {
        let now = Utc::now();
        Debt {
            id: Uuid::new_v4(),
            owner_id: OwnerId::from("owner"),
            name: name.to_string(),
            total_amount: total,
            original_amount: Some(total),
            interest_rate: rate,
            minimum_payment: minimum,
            installments_total: None,
            installments_paid: None,
            first_installment_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_snowball_orders_by_balance_stably() {
        let debts = vec![
            debt("b", dec!(500), dec!(1), dec!(10)),
            debt("a", dec!(100), dec!(3), dec!(10)),
            debt("c", dec!(500), dec!(2), dec!(10)),
        ];
        let names: Vec<_> = sort_debts(&debts, RepaymentStrategy::Snowball)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_avalanche_orders_by_rate_stably() {
        let debts = vec![
            debt("low", dec!(100), dec!(1), dec!(10)),
            debt("high1", dec!(900), dec!(4), dec!(10)),
            debt("high2", dec!(50), dec!(4), dec!(10)),
        ];
        let names: Vec<_> = sort_debts(&debts, RepaymentStrategy::Avalanche)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["high1", "high2", "low"]);
    }

    #[test]
    fn test_zero_interest_terminates_in_ten_months() {
        let p = project(&[debt("loan", dec!(1000), dec!(0), dec!(100))], dec!(0), start());
        assert_eq!(p.months_to_payoff, 10);
        assert_eq!(p.total_interest, dec!(0));
        assert!(p.converged);
        assert_eq!(p.payoffs[0].paid_off_month, Some(10));
    }

    #[test]
    fn test_first_month_with_interest() {
        let p = project(&[debt("loan", dec!(1000), dec!(5), dec!(100))], dec!(0), start());
        let first = &p.schedule[0];
        assert_eq!(first.interest, dec!(50));
        assert_eq!(first.paid, dec!(100));
        assert_eq!(first.remaining, dec!(950));
    }

    #[test]
    fn test_interest_is_not_rounded() {
        let p = project(&[debt("card", dec!(1000.33), dec!(1.5), dec!(100))], dec!(0), start());
        let first = &p.schedule[0];
        assert_eq!(first.interest, dec!(15.00495));
        assert_eq!(first.remaining, dec!(915.33495));
        assert_eq!(p.payoffs[0].interest_paid, p.total_interest);
    }

    #[test]
    fn test_non_convergence_reports_cap() {
        // Interest equals the minimum payment: the balance never moves
        let p = project(&[debt("stuck", dec!(1000), dec!(10), dec!(100))], dec!(0), start());
        assert_eq!(p.months_to_payoff, MAX_MONTHS);
        assert!(!p.converged);
        assert_eq!(p.schedule.len(), MAX_MONTHS as usize);
    }

    #[test]
    fn test_unstarted_debt_is_skipped() {
        let mut later = debt("later", dec!(300), dec!(10), dec!(100));
        later.first_installment_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        let p = project(&[later], dec!(0), start());

        assert_eq!(p.schedule[0].interest, dec!(0));
        assert_eq!(p.schedule[1].remaining, dec!(300));
        assert_eq!(p.schedule[2].interest, dec!(30));
    }

    #[test]
    fn test_extra_goes_to_first_debt_in_order() {
        let small = debt("small", dec!(100), dec!(0), dec!(10));
        let large = debt("large", dec!(1000), dec!(0), dec!(10));
        let p = project(&[small, large], dec!(200), start());

        // Month 1: small gets 10 minimum + 90 extra, large gets 10 + 110
        assert_eq!(p.payoffs[0].paid_off_month, Some(1));
        assert_eq!(p.schedule[0].remaining, dec!(880));
    }

    #[test]
    fn test_plan_reports_saved_interest() {
        let debts = vec![
            debt("card", dec!(2000), dec!(3), dec!(100)),
            debt("car", dec!(5000), dec!(1), dec!(200)),
        ];
        let baseline = plan(&debts, RepaymentStrategy::Avalanche, dec!(0), start());
        let with_extra = plan(&debts, RepaymentStrategy::Avalanche, dec!(300), start());

        assert_eq!(baseline.projection.saved_interest, dec!(0));
        assert!(with_extra.projection.saved_interest > dec!(0));
        assert!(with_extra.projection.months_to_payoff < baseline.projection.months_to_payoff);
        assert_eq!(with_extra.order[0], debts[0].id);
    }

    #[test]
    fn test_no_debts_is_immediately_done() {
        let p = project(&[], dec!(100), start());
        assert_eq!(p.months_to_payoff, 0);
        assert!(p.converged);
    }
}
