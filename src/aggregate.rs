// 📊 Aggregation - derived views over the raw expense list
//
// Everything here is a linear scan over a small in-memory slice.
// Totals are summed in cents; only the 6-month average rounds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::expense::{Category, Expense, PaymentMethod};
use crate::money::{sum_cents, Cents};
use crate::month::YearMonth;

/// Window for the trailing average KPI
pub const AVERAGE_WINDOW: usize = 6;

/// Length of the trend series and of the always-listed month window
pub const TREND_WINDOW: usize = 12;

// ============================================================================
// FILTERS
// ============================================================================

/// A filter value where `All` disables the predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: PartialEq> Choice<T> {
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(expected) => expected == value,
        }
    }
}

impl<T: Copy + PartialEq> Choice<T> {
    /// Step through `All` then each of `values` in order, wrapping around
    pub fn cycle(&self, values: &[T]) -> Self {
        let next = match self {
            Choice::All => 0,
            Choice::Only(current) => match values.iter().position(|v| v == current) {
                Some(i) => i + 1,
                None => values.len(),
            },
        };
        values.get(next).copied().map_or(Choice::All, Choice::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaidFilter {
    #[default]
    All,
    Paid,
    Pending,
}

impl PaidFilter {
    pub fn accepts(&self, paid: bool) -> bool {
        match self {
            PaidFilter::All => true,
            PaidFilter::Paid => paid,
            PaidFilter::Pending => !paid,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            PaidFilter::All => PaidFilter::Paid,
            PaidFilter::Paid => PaidFilter::Pending,
            PaidFilter::Pending => PaidFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaidFilter::All => "All",
            PaidFilter::Paid => "Paid",
            PaidFilter::Pending => "Pending",
        }
    }
}

/// Conjunction of independent predicates over one month's rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub query: String,
    pub category: Choice<Category>,
    pub payment_method: Choice<PaymentMethod>,
    pub status: PaidFilter,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if !self.category.accepts(&expense.category) {
            return false;
        }
        if !self.payment_method.accepts(&expense.payment_method) {
            return false;
        }
        if !self.status.accepts(expense.paid) {
            return false;
        }

        let query = self.query.trim().to_lowercase();
        query.is_empty() || expense.search_haystack().contains(&query)
    }

    pub fn apply<'a>(&self, rows: &[&'a Expense]) -> Vec<&'a Expense> {
        rows.iter().copied().filter(|e| self.matches(e)).collect()
    }

    pub fn is_active(&self) -> bool {
        *self != ExpenseFilter::default()
    }
}

// ============================================================================
// MONTH VIEWS
// ============================================================================

/// Months that have data plus the 12 ending at `current`, newest first
pub fn month_index(expenses: &[Expense], current: YearMonth) -> Vec<YearMonth> {
    let mut months: BTreeSet<YearMonth> = expenses.iter().map(Expense::year_month).collect();
    months.extend(current.trailing(TREND_WINDOW));
    months.into_iter().rev().collect()
}

/// Expenses dated inside `month`, newest date first
pub fn month_bucket(expenses: &[Expense], month: YearMonth) -> Vec<&Expense> {
    let mut bucket: Vec<&Expense> = expenses.iter().filter(|e| month.contains(e.date)).collect();
    bucket.sort_by(|a, b| b.date.cmp(&a.date));
    bucket
}

pub fn total(rows: &[&Expense]) -> Cents {
    sum_cents(rows.iter().map(|e| e.amount_cents))
}

pub fn monthly_total(expenses: &[Expense], month: YearMonth) -> Cents {
    sum_cents(
        expenses
            .iter()
            .filter(|e| month.contains(e.date))
            .map(|e| e.amount_cents),
    )
}

// ============================================================================
// KPIS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total: Cents,
    pub recurring_total: Cents,
    pub pending_total: Cents,
    /// Mean over the months of the trailing window that had any spending
    pub average_6m: Cents,
}

pub fn compute_kpis(expenses: &[Expense], month: YearMonth) -> Kpis {
    let bucket = month_bucket(expenses, month);

    let recurring_total = sum_cents(
        bucket
            .iter()
            .filter(|e| e.is_recurring())
            .map(|e| e.amount_cents),
    );
    let pending_total = sum_cents(bucket.iter().filter(|e| !e.paid).map(|e| e.amount_cents));

    let window: Vec<Cents> = month
        .trailing(AVERAGE_WINDOW)
        .into_iter()
        .map(|m| monthly_total(expenses, m))
        .collect();

    Kpis {
        total: total(&bucket),
        recurring_total,
        pending_total,
        average_6m: average_of_active(&window),
    }
}

/// Rounded mean of the non-zero values; zero when there are none
pub fn average_of_active(totals: &[Cents]) -> Cents {
    let active: Vec<Cents> = totals.iter().copied().filter(|v| *v > 0).collect();
    if active.is_empty() {
        return 0;
    }
    let count = active.len() as f64;
    let sum = sum_cents(active.iter().copied());
    (sum as f64 / count).round() as Cents
}

// ============================================================================
// CHART SERIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: Category,
    pub total: Cents,
}

/// Per-category sums for one month, largest first
pub fn category_breakdown(expenses: &[Expense], month: YearMonth) -> Vec<CategoryTotal> {
    let mut sums: HashMap<Category, Cents> = HashMap::new();
    for expense in month_bucket(expenses, month) {
        let entry = sums.entry(expense.category).or_insert(0);
        *entry = entry.saturating_add(expense.amount_cents);
    }

    let mut breakdown: Vec<CategoryTotal> = sums
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    // Category order breaks ties so the chart is stable between renders
    breakdown.sort_by(|a, b| b.total.cmp(&a.total).then(a.category.cmp(&b.category)));
    breakdown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub month: YearMonth,
    pub total: Cents,
}

/// The 12 months ending at `month`, oldest first, empty months as zero
pub fn monthly_trend(expenses: &[Expense], month: YearMonth) -> Vec<TrendPoint> {
    let mut months = month.trailing(TREND_WINDOW);
    months.reverse();
    months
        .into_iter()
        .map(|m| TrendPoint {
            month: m,
            total: monthly_total(expenses, m),
        })
        .collect()
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Everything the dashboard renders for one month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub month: YearMonth,
    pub months: Vec<YearMonth>,
    pub kpis: Kpis,
    pub by_category: Vec<CategoryTotal>,
    pub trend: Vec<TrendPoint>,
    pub rows: Vec<Expense>,
    pub month_count: usize,
}

impl DashboardView {
    pub fn build(
        expenses: &[Expense],
        month: YearMonth,
        current: YearMonth,
        filter: &ExpenseFilter,
    ) -> Self {
        let bucket = month_bucket(expenses, month);
        let rows = filter.apply(&bucket).into_iter().cloned().collect();

        DashboardView {
            month,
            months: month_index(expenses, current),
            kpis: compute_kpis(expenses, month),
            by_category: category_breakdown(expenses, month),
            trend: monthly_trend(expenses, month),
            rows,
            month_count: bucket.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::seed_expenses;
    use chrono::NaiveDate;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn expense(date: &str, cents: Cents, category: Category) -> Expense {
        Expense {
            id: uuid::Uuid::new_v4().to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: format!("{} {}", category, date),
            category,
            amount_cents: cents,
            paid: true,
            payment_method: PaymentMethod::Pix,
            vendor: None,
            notes: None,
            recurring: None,
        }
    }

    fn seeded() -> Vec<Expense> {
        seed_expenses(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn test_huge_amounts_do_not_overflow_totals() {
        let mut rows = vec![
            expense("2024-03-02", Cents::MAX, Category::Systems),
            expense("2024-03-05", Cents::MAX, Category::Systems),
        ];
        rows[1].paid = false;

        let kpis = compute_kpis(&rows, ym("2024-03"));
        assert_eq!(kpis.total, Cents::MAX);
        assert_eq!(kpis.pending_total, Cents::MAX);
        assert_eq!(kpis.average_6m, Cents::MAX);

        let breakdown = category_breakdown(&rows, ym("2024-03"));
        assert_eq!(breakdown[0].total, Cents::MAX);
        assert_eq!(monthly_trend(&rows, ym("2024-03")).last().map(|p| p.total), Some(Cents::MAX));
    }

    #[test]
    fn test_choice_cycle_wraps_through_all() {
        let methods = PaymentMethod::ALL;
        let mut choice = Choice::All;
        for expected in methods {
            choice = choice.cycle(&methods);
            assert_eq!(choice, Choice::Only(expected));
        }
        assert_eq!(choice.cycle(&methods), Choice::All);
        assert_eq!(PaidFilter::Pending.next(), PaidFilter::All);
    }

    #[test]
    fn test_seed_kpis() {
        let kpis = compute_kpis(&seeded(), ym("2024-03"));
        assert_eq!(kpis.total, 84800);
        assert_eq!(kpis.pending_total, 45000);
        assert_eq!(kpis.recurring_total, 39800);
        assert_eq!(kpis.average_6m, 84800);
    }

    #[test]
    fn test_average_excludes_empty_months() {
        assert_eq!(average_of_active(&[0, 200, 0, 300, 100, 0]), 200);
        assert_eq!(average_of_active(&[0, 0, 0]), 0);
        assert_eq!(average_of_active(&[]), 0);
        assert_eq!(average_of_active(&[1, 2]), 2);
    }

    #[test]
    fn test_average_window_from_data() {
        // Trailing six from 2024-02: 2024-02 .. 2023-09
        let data = vec![
            expense("2023-08-01", 99999, Category::Other), // outside the window
            expense("2023-09-10", 100, Category::Other),
            expense("2023-11-10", 300, Category::Other),
            expense("2024-01-05", 200, Category::Other),
        ];
        let kpis = compute_kpis(&data, ym("2024-02"));
        assert_eq!(kpis.total, 0);
        assert_eq!(kpis.average_6m, 200);
    }

    #[test]
    fn test_month_index_merges_data_and_window() {
        let data = vec![
            expense("2020-05-01", 100, Category::Taxes),
            expense("2024-03-01", 100, Category::Taxes),
        ];
        let months = month_index(&data, ym("2024-03"));

        assert_eq!(months.len(), 13);
        assert_eq!(months[0], ym("2024-03"));
        assert_eq!(months[11], ym("2023-04"));
        assert_eq!(months[12], ym("2020-05"));
        assert!(months.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_month_index_includes_future_data() {
        let data = vec![expense("2025-01-01", 100, Category::Taxes)];
        let months = month_index(&data, ym("2024-03"));
        assert_eq!(months[0], ym("2025-01"));
        assert_eq!(months.len(), 13);
    }

    #[test]
    fn test_month_bucket_sorted_newest_first() {
        let data = vec![
            expense("2024-03-02", 1, Category::Taxes),
            expense("2024-04-01", 1, Category::Taxes),
            expense("2024-03-20", 1, Category::Taxes),
            expense("2024-03-11", 1, Category::Taxes),
        ];
        let bucket = month_bucket(&data, ym("2024-03"));
        let days: Vec<String> = bucket.iter().map(|e| e.date.to_string()).collect();
        assert_eq!(days, vec!["2024-03-20", "2024-03-11", "2024-03-02"]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let data = seeded();
        let bucket = month_bucket(&data, ym("2024-03"));

        let by_text = ExpenseFilter {
            query: "  ADS ".to_string(),
            ..Default::default()
        };
        assert_eq!(by_text.apply(&bucket).len(), 1);

        let pending_card = ExpenseFilter {
            payment_method: Choice::Only(PaymentMethod::Card),
            status: PaidFilter::Pending,
            ..Default::default()
        };
        assert!(pending_card.apply(&bucket).is_empty());

        let paid = ExpenseFilter {
            status: PaidFilter::Paid,
            ..Default::default()
        };
        assert_eq!(paid.apply(&bucket).len(), 2);
    }

    #[test]
    fn test_filter_order_does_not_matter() {
        let mut data = seeded();
        data.push(Expense {
            description: "Ads for travel fair".to_string(),
            ..expense("2024-03-01", 500, Category::Travel)
        });
        let bucket = month_bucket(&data, ym("2024-03"));

        let category = ExpenseFilter {
            category: Choice::Only(Category::Marketing),
            ..Default::default()
        };
        let text = ExpenseFilter {
            query: "ads".to_string(),
            ..Default::default()
        };

        let a = text.apply(&category.apply(&bucket));
        let b = category.apply(&text.apply(&bucket));
        let ids = |rows: &[&Expense]| rows.iter().map(|e| e.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.len(), 1);
        assert_eq!(text.apply(&bucket).len(), 2);
    }

    #[test]
    fn test_default_filter_is_noop() {
        let data = seeded();
        let bucket = month_bucket(&data, ym("2024-03"));
        let filter = ExpenseFilter::default();
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&bucket).len(), bucket.len());
    }

    #[test]
    fn test_category_breakdown_sorted_desc() {
        let mut data = seeded();
        data.push(expense("2024-03-01", 1000, Category::Marketing));
        data.push(expense("2024-02-01", 999999, Category::Taxes));

        let breakdown = category_breakdown(&data, ym("2024-03"));
        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].category, Category::Marketing);
        assert_eq!(breakdown[0].total, 46000);
        assert_eq!(breakdown[1].category, Category::Systems);
        assert_eq!(breakdown[2].category, Category::AiSubscriptions);
    }

    #[test]
    fn test_trend_is_twelve_oldest_first_with_zeros() {
        let data = vec![
            expense("2024-01-10", 700, Category::Travel),
            expense("2023-03-10", 300, Category::Travel),
            expense("2023-02-10", 999, Category::Travel), // 13 months back
        ];
        let trend = monthly_trend(&data, ym("2024-02"));

        assert_eq!(trend.len(), 12);
        assert_eq!(trend[0].month, ym("2023-03"));
        assert_eq!(trend[0].total, 300);
        assert_eq!(trend[10].month, ym("2024-01"));
        assert_eq!(trend[10].total, 700);
        assert_eq!(trend[11].total, 0);
        assert_eq!(trend.iter().filter(|p| p.total == 0).count(), 10);
    }

    #[test]
    fn test_trend_on_empty_data() {
        let trend = monthly_trend(&[], ym("2024-01"));
        assert_eq!(trend.len(), 12);
        assert!(trend.iter().all(|p| p.total == 0));
    }

    #[test]
    fn test_dashboard_view_snapshot() {
        let data = seeded();
        let filter = ExpenseFilter {
            status: PaidFilter::Pending,
            ..Default::default()
        };
        let view = DashboardView::build(&data, ym("2024-03"), ym("2024-03"), &filter);

        assert_eq!(view.month_count, 3);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.kpis.total, 84800);
        assert_eq!(view.trend.len(), 12);
        assert_eq!(view.months.len(), 12);
    }
}
