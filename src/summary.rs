//! View models handed to the renderer.
//!
//! Everything here is rebuilt from the full record set on each refresh.
//! Divisions are zero-guarded; an empty record set produces an all-zero
//! view rather than an error.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::bucket::Granularity;
use crate::color::{assign_open_set, palette_color, person_color, resolve_person_color};
use crate::cumulative::{time_series, CumulativeBucket};
use crate::group::{group_records, Bucket, Dimension};
use crate::model::{SalesPerson, SalesRecord};
use crate::ranking::{rank_all, top_n, RankedEntry};
use crate::stacked::{build_stacked_series, StackedSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Length of top-N rankings in the detail view.
    pub top_n: usize,
    /// Number of newest transactions on the overview.
    pub recent_limit: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            recent_limit: 10,
        }
    }
}

// =============================================================================
// Arithmetic helpers
// =============================================================================

/// `total / count` to two places, zero when there is nothing to divide by.
pub fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    total
        .checked_div(Decimal::from(count))
        .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

/// `part / whole × 100` to one place, zero when `whole` is zero.
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|v| v.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

fn sum_amounts<'a, I: IntoIterator<Item = &'a SalesRecord>>(records: I) -> Decimal {
    records
        .into_iter()
        .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.total_amount))
}

// =============================================================================
// Overview
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_sales: Decimal,
    pub order_count: u64,
    pub average_order_value: Decimal,
    pub unique_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub key: String,
    pub amount_sum: Decimal,
    pub count: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    pub name: String,
    pub total_amount: Decimal,
    pub deal_count: u64,
    pub average_deal_size: Decimal,
    /// Per-day amounts for the sparkline, date ascending.
    pub daily_series: Vec<Bucket<String>>,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub kpis: Kpis,
    pub daily: Vec<CumulativeBucket<String>>,
    pub weekly: Vec<CumulativeBucket<String>>,
    pub monthly: Vec<CumulativeBucket<String>>,
    pub categories: Vec<CategoryShare>,
    pub category_series: StackedSeries,
    pub people: Vec<PersonSummary>,
    /// Newest first.
    pub recent: Vec<SalesRecord>,
}

impl DashboardView {
    /// The view of an empty record set.
    pub fn empty() -> Self {
        compose_dashboard(&[], &ViewOptions::default())
    }
}

pub fn compose_kpis(records: &[SalesRecord]) -> Kpis {
    let total_sales = sum_amounts(records);
    let order_count = records.len() as u64;
    let unique_customers = records
        .iter()
        .map(|r| r.customer_name.as_str())
        .collect::<HashSet<_>>()
        .len();
    Kpis {
        total_sales,
        order_count,
        average_order_value: average(total_sales, order_count),
        unique_customers,
    }
}

pub fn compose_categories(records: &[SalesRecord]) -> Vec<CategoryShare> {
    let grouped = group_records(records, Dimension::Category);
    let colors = assign_open_set(grouped.keys());
    grouped
        .iter()
        .zip(colors)
        .map(|(b, (_, color))| CategoryShare {
            key: b.key.clone(),
            amount_sum: b.amount_sum,
            count: b.count,
            color,
        })
        .collect()
}

/// One summary per salesperson, in first-seen order.
pub fn compose_person_summaries(records: &[SalesRecord]) -> Vec<PersonSummary> {
    let people = group_records(records, Dimension::SalesPerson);
    let mut by_person: HashMap<&str, Vec<&SalesRecord>> = HashMap::new();
    for r in records {
        by_person.entry(r.sales_person.as_str()).or_default().push(r);
    }

    let mut unknown = 0;
    people
        .iter()
        .map(|b| {
            let own = by_person.get(b.key.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let daily_series =
                group_records(own.iter().copied(), Dimension::Date(Granularity::Day)).into_sorted_by_key();
            let color = resolve_person_color(&b.key, unknown);
            if person_color(&b.key).is_none() {
                unknown += 1;
            }
            PersonSummary {
                name: b.key.clone(),
                total_amount: b.amount_sum,
                deal_count: b.count,
                average_deal_size: average(b.amount_sum, b.count),
                daily_series,
                color,
            }
        })
        .collect()
}

pub fn compose_dashboard(records: &[SalesRecord], options: &ViewOptions) -> DashboardView {
    DashboardView {
        kpis: compose_kpis(records),
        daily: time_series(records, Granularity::Day),
        weekly: time_series(records, Granularity::Week),
        monthly: time_series(records, Granularity::Month),
        categories: compose_categories(records),
        category_series: build_stacked_series(records, Granularity::Month),
        people: compose_person_summaries(records),
        recent: records.iter().rev().take(options.recent_limit).cloned().collect(),
    }
}

// =============================================================================
// Salesperson detail
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductShare {
    pub key: String,
    pub amount_sum: Decimal,
    pub share_pct: Decimal,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetail {
    pub name: String,
    /// Absent when the store has no reference row for this name.
    pub info: Option<SalesPerson>,
    pub total_amount: Decimal,
    pub deal_count: u64,
    pub average_deal_size: Decimal,
    /// Percent of the monthly target; zero without a target.
    pub achievement_rate: Decimal,
    pub daily_series: Vec<Bucket<String>>,
    pub top_customers: Vec<RankedEntry<String>>,
    /// All products, amount descending.
    pub products: Vec<ProductShare>,
    /// Date ascending.
    pub transactions: Vec<SalesRecord>,
}

impl PersonDetail {
    pub fn empty(name: &str) -> Self {
        compose_person_detail(name, None, &[], &ViewOptions::default())
    }
}

/// Detail view for `name`. Records belonging to other people are ignored,
/// so callers may pass either a filtered fetch or the full set.
pub fn compose_person_detail(
    name: &str,
    info: Option<SalesPerson>,
    records: &[SalesRecord],
    options: &ViewOptions,
) -> PersonDetail {
    let own: Vec<&SalesRecord> = records.iter().filter(|r| r.sales_person == name).collect();
    let total_amount = sum_amounts(own.iter().copied());
    let deal_count = own.len() as u64;
    let achievement_rate = info
        .as_ref()
        .map(|p| percentage(total_amount, p.monthly_target))
        .unwrap_or(Decimal::ZERO);

    let customers = group_records(own.iter().copied(), Dimension::Customer);
    let products = group_records(own.iter().copied(), Dimension::Product);
    let product_total = products.total();
    let products = rank_all(&products)
        .into_iter()
        .enumerate()
        .map(|(i, e)| ProductShare {
            share_pct: percentage(e.amount_sum, product_total),
            key: e.key,
            amount_sum: e.amount_sum,
            color: palette_color(i),
        })
        .collect();

    PersonDetail {
        name: name.to_string(),
        info,
        total_amount,
        deal_count,
        average_deal_size: average(total_amount, deal_count),
        achievement_rate,
        daily_series: group_records(own.iter().copied(), Dimension::Date(Granularity::Day))
            .into_sorted_by_key(),
        top_customers: top_n(&customers, options.top_n),
        products,
        transactions: own.into_iter().cloned().collect(),
    }
}

/// SHA-256 of the serialized view, for telling whether a refresh changed anything.
pub fn view_digest<T: Serialize>(view: &T) -> String {
    let bytes = serde_json::to_vec(view).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
