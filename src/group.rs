//! Generic keyed fold shared by every grouping dimension.
//!
//! Buckets come out in first-seen order: the position of a key is fixed
//! by the first record that contributed to it. Callers that want
//! chronological or ranked output sort afterwards.

use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::bucket::Granularity;
use crate::model::SalesRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket<K> {
    pub key: K,
    pub amount_sum: Decimal,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct Grouped<K> {
    buckets: Vec<Bucket<K>>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Grouped<K> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: K, amount: Decimal) {
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                let idx = self.buckets.len();
                self.index.insert(key.clone(), idx);
                self.buckets.push(Bucket {
                    key,
                    amount_sum: Decimal::ZERO,
                    count: 0,
                });
                idx
            }
        };
        let bucket = &mut self.buckets[idx];
        bucket.amount_sum = bucket.amount_sum.saturating_add(amount);
        bucket.count = bucket.count.saturating_add(1);
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&Bucket<K>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|idx| &self.buckets[*idx])
    }

    /// First-seen position of `key`.
    pub fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket<K>> {
        self.buckets.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.buckets.iter().map(|b| &b.key)
    }

    pub fn total(&self) -> Decimal {
        self.buckets
            .iter()
            .fold(Decimal::ZERO, |acc, b| acc.saturating_add(b.amount_sum))
    }

    pub fn into_buckets(self) -> Vec<Bucket<K>> {
        self.buckets
    }

    /// Buckets ordered by key ascending.
    pub fn into_sorted_by_key(self) -> Vec<Bucket<K>>
    where
        K: Ord,
    {
        let mut buckets = self.buckets;
        buckets.sort_by(|a, b| a.key.cmp(&b.key));
        buckets
    }
}

impl<K: Eq + Hash + Clone> Default for Grouped<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn group_by<'a, T, K, I, FK, FA>(items: I, mut key_fn: FK, mut amount_fn: FA) -> Grouped<K>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    K: Eq + Hash + Clone,
    FK: FnMut(&T) -> K,
    FA: FnMut(&T) -> Decimal,
{
    let mut grouped = Grouped::new();
    for item in items {
        grouped.add(key_fn(item), amount_fn(item));
    }
    grouped
}

/// Grouping dimensions the dashboard folds sales records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Date(Granularity),
    Category,
    SalesPerson,
    Customer,
    Product,
}

impl Dimension {
    pub fn key(&self, record: &SalesRecord) -> String {
        match self {
            Dimension::Date(granularity) => record.date_key(*granularity),
            Dimension::Category => record.category().to_string(),
            Dimension::SalesPerson => record.sales_person.clone(),
            Dimension::Customer => record.customer_name.clone(),
            Dimension::Product => record.product_name.clone(),
        }
    }
}

/// Sum `total_amount` per key of `dimension`.
pub fn group_records<'a, I>(records: I, dimension: Dimension) -> Grouped<String>
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    group_by(records, |r| dimension.key(r), |r| r.total_amount)
}
