use rust_decimal::Decimal;
use serde::Serialize;

use crate::bucket::Granularity;
use crate::group::{group_records, Bucket, Dimension};
use crate::model::SalesRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeBucket<K> {
    pub key: K,
    pub amount_sum: Decimal,
    pub count: u64,
    pub running_total: Decimal,
}

/// Annotate buckets with running totals, left to right, in the order given.
/// Negative sums are accumulated as-is.
pub fn with_running_totals<K>(buckets: Vec<Bucket<K>>) -> Vec<CumulativeBucket<K>> {
    let mut running = Decimal::ZERO;
    buckets
        .into_iter()
        .map(|b| {
            running = running.saturating_add(b.amount_sum);
            CumulativeBucket {
                key: b.key,
                amount_sum: b.amount_sum,
                count: b.count,
                running_total: running,
            }
        })
        .collect()
}

/// Chronological series at `granularity` with running totals.
pub fn time_series(records: &[SalesRecord], granularity: Granularity) -> Vec<CumulativeBucket<String>> {
    let buckets = group_records(records, Dimension::Date(granularity)).into_sorted_by_key();
    with_running_totals(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    fn bucket(key: &str, amount: &str) -> Bucket<String> {
        Bucket {
            key: key.to_string(),
            amount_sum: dec(amount),
            count: 1,
        }
    }

    #[test]
    fn test_running_total_recurrence() {
        let series = with_running_totals(vec![
            bucket("a", "10"),
            bucket("b", "5.5"),
            bucket("c", "0"),
            bucket("d", "100"),
        ]);
        assert_eq!(series[0].running_total, series[0].amount_sum);
        for i in 1..series.len() {
            assert_eq!(
                series[i].running_total,
                series[i - 1].running_total + series[i].amount_sum
            );
        }
        assert_eq!(series[3].running_total, dec("115.5"));
    }

    #[test]
    fn test_negative_sums_not_clamped() {
        let series = with_running_totals(vec![bucket("a", "10"), bucket("b", "-30"), bucket("c", "5")]);
        let totals: Vec<Decimal> = series.iter().map(|b| b.running_total).collect();
        assert_eq!(totals, vec![dec("10"), dec("-20"), dec("-15")]);
    }

    #[test]
    fn test_no_reordering() {
        let series = with_running_totals(vec![bucket("z", "1"), bucket("a", "2")]);
        assert_eq!(series[0].key, "z");
        assert_eq!(series[1].key, "a");
    }

    #[test]
    fn test_empty() {
        let series: Vec<CumulativeBucket<String>> = with_running_totals(Vec::new());
        assert!(series.is_empty());
    }

    #[test]
    fn test_daily_weekly_scenario() {
        let records = vec![
            record("1", "2024-01-01", "Sato", "100"),
            record("2", "2024-01-01", "Sato", "50"),
            record("3", "2024-01-08", "Sato", "200"),
        ];
        let daily = time_series(&records, Granularity::Day);
        assert_eq!(daily.len(), 2);
        assert_eq!((daily[0].key.as_str(), daily[0].amount_sum), ("2024-01-01", dec("150")));
        assert_eq!((daily[1].key.as_str(), daily[1].amount_sum), ("2024-01-08", dec("200")));
        let running: Vec<Decimal> = daily.iter().map(|b| b.running_total).collect();
        assert_eq!(running, vec![dec("150"), dec("350")]);

        let weekly = time_series(&records, Granularity::Week);
        assert_eq!((weekly[0].key.as_str(), weekly[0].amount_sum), ("2023-12-31", dec("150")));
        assert_eq!((weekly[1].key.as_str(), weekly[1].amount_sum), ("2024-01-07", dec("200")));
    }

    #[test]
    fn test_series_sorted_even_if_input_unsorted() {
        let records = vec![
            record("1", "2024-03-02", "Sato", "1"),
            record("2", "2024-01-15", "Sato", "2"),
        ];
        let monthly = time_series(&records, Granularity::Month);
        assert_eq!(monthly[0].key, "2024-01");
        assert_eq!(monthly[1].running_total, dec("3"));
    }
}
