use rust_decimal::Decimal;
use serde::Serialize;
use std::hash::Hash;

use crate::group::Grouped;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry<K> {
    pub key: K,
    pub amount_sum: Decimal,
}

/// Every key, amount descending. Equal amounts keep first-seen order.
pub fn rank_all<K: Eq + Hash + Clone>(grouped: &Grouped<K>) -> Vec<RankedEntry<K>> {
    let mut entries: Vec<RankedEntry<K>> = grouped
        .iter()
        .map(|b| RankedEntry {
            key: b.key.clone(),
            amount_sum: b.amount_sum,
        })
        .collect();
    // sort_by is stable
    entries.sort_by(|a, b| b.amount_sum.cmp(&a.amount_sum));
    entries
}

/// The `n` largest keys by amount; all of them when fewer than `n` exist.
pub fn top_n<K: Eq + Hash + Clone>(grouped: &Grouped<K>, n: usize) -> Vec<RankedEntry<K>> {
    let mut entries = rank_all(grouped);
    entries.truncate(n);
    entries
}
