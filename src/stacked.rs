//! Per-period category series for stacked charts.
//!
//! Each point only carries the categories that actually sold in that
//! period; a missing category reads as zero. The global category list
//! (first-seen over the whole record set) decides series and stacking
//! order.

use rust_decimal::Decimal;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;

use crate::bucket::Granularity;
use crate::group::Grouped;
use crate::model::SalesRecord;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryAmounts(Vec<(String, Decimal)>);

impl CategoryAmounts {
    pub fn get(&self, category: &str) -> Option<Decimal> {
        self.0.iter().find(|(c, _)| c == category).map(|(_, a)| *a)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(c, a)| (c.as_str(), *a))
    }
}

impl Serialize for CategoryAmounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, amount) in &self.0 {
            map.serialize_entry(category, amount)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySeriesPoint {
    pub bucket_key: String,
    pub amounts: CategoryAmounts,
}

impl CategorySeriesPoint {
    /// Amount for `category` in this period, zero when it did not sell.
    pub fn amount(&self, category: &str) -> Decimal {
        self.amounts.get(category).unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackedSeries {
    pub granularity: Granularity,
    pub categories: Vec<String>,
    pub points: Vec<CategorySeriesPoint>,
}

pub fn build_stacked_series(records: &[SalesRecord], granularity: Granularity) -> StackedSeries {
    let mut categories: Grouped<String> = Grouped::new();
    let mut per_bucket: Vec<(String, Grouped<String>)> = Vec::new();
    let mut bucket_index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let category = record.category().to_string();
        categories.add(category.clone(), record.total_amount);

        let key = record.date_key(granularity);
        let idx = match bucket_index.get(&key) {
            Some(idx) => *idx,
            None => {
                bucket_index.insert(key.clone(), per_bucket.len());
                per_bucket.push((key, Grouped::new()));
                per_bucket.len() - 1
            }
        };
        per_bucket[idx].1.add(category, record.total_amount);
    }

    per_bucket.sort_by(|a, b| a.0.cmp(&b.0));
    let points = per_bucket
        .into_iter()
        .map(|(bucket_key, grouped)| {
            let mut amounts: Vec<(String, Decimal)> = grouped
                .into_buckets()
                .into_iter()
                .map(|b| (b.key, b.amount_sum))
                .collect();
            amounts.sort_by_key(|(c, _)| categories.position(c.as_str()).unwrap_or(usize::MAX));
            CategorySeriesPoint {
                bucket_key,
                amounts: CategoryAmounts(amounts),
            }
        })
        .collect();

    StackedSeries {
        granularity,
        categories: categories.keys().cloned().collect(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::UNCATEGORIZED;

    fn sample() -> Vec<SalesRecord> {
        vec![
            with_category(record("1", "2024-01-05", "Sato", "100"), "Hardware"),
            with_category(record("2", "2024-01-20", "Ito", "40"), "Hardware"),
            with_category(record("3", "2024-02-02", "Ito", "70"), "Services"),
            record("4", "2024-02-10", "Sato", "30"),
            with_category(record("5", "2024-02-11", "Sato", "5"), "Hardware"),
        ]
    }

    #[test]
    fn test_global_categories_first_seen() {
        let s = build_stacked_series(&sample(), Granularity::Month);
        assert_eq!(s.categories, vec!["Hardware", "Services", UNCATEGORIZED]);
    }

    #[test]
    fn test_absent_category_omitted_not_zero() {
        let s = build_stacked_series(&sample(), Granularity::Month);
        assert_eq!(s.points.len(), 2);
        let jan = &s.points[0];
        assert_eq!(jan.bucket_key, "2024-01");
        assert_eq!(jan.amounts.len(), 1);
        assert_eq!(jan.amounts.get("Services"), None);
        assert_eq!(jan.amount("Services"), Decimal::ZERO);
        assert_eq!(jan.amount("Hardware"), dec("140"));
    }

    #[test]
    fn test_point_entries_follow_global_order() {
        let s = build_stacked_series(&sample(), Granularity::Month);
        let feb: Vec<&str> = s.points[1].amounts.iter().map(|(c, _)| c).collect();
        // Feb first saw Services, then Uncategorized, then Hardware
        assert_eq!(feb, vec!["Hardware", "Services", UNCATEGORIZED]);
    }

    #[test]
    fn test_conservation() {
        let records = sample();
        let s = build_stacked_series(&records, Granularity::Week);
        let total = s
            .points
            .iter()
            .flat_map(|p| p.amounts.iter().map(|(_, a)| a))
            .fold(Decimal::ZERO, |acc, a| acc + a);
        assert_eq!(total, dec("245"));
    }

    #[test]
    fn test_serializes_as_map() {
        let s = build_stacked_series(&sample(), Granularity::Month);
        let v = serde_json::to_value(&s.points[0]).unwrap();
        assert_eq!(v["bucketKey"], "2024-01");
        assert_eq!(v["amounts"]["Hardware"].as_f64(), Some(140.0));
        assert!(v["amounts"].get("Services").is_none());
    }

    #[test]
    fn test_empty() {
        let s = build_stacked_series(&[], Granularity::Day);
        assert!(s.categories.is_empty());
        assert!(s.points.is_empty());
    }
}
