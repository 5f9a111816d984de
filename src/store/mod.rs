use anyhow::Result;
use async_trait::async_trait;

use crate::model::{SalesPerson, SalesRecord};

pub mod feed;
pub mod memory;
pub mod sqlite;

pub use feed::{ChangeFeed, Subscription};

/// Narrowing applied by the store before records reach the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub sales_person: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_person(name: &str) -> Self {
        Self {
            sales_person: Some(name.to_string()),
        }
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        match &self.sales_person {
            Some(name) => record.sales_person == *name,
            None => true,
        }
    }
}

#[async_trait]
pub trait SalesStore: Send + Sync {
    /// Matching records, date ascending.
    async fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>>;
    async fn fetch_person(&self, name: &str) -> Result<Option<SalesPerson>>;
    /// Payload-free change notifications; refetch to learn what changed.
    fn subscribe(&self) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::record;

    #[test]
    fn test_filter_matches() {
        let r = record("1", "2024-01-01", "Sato", "10");
        assert!(RecordFilter::all().matches(&r));
        assert!(RecordFilter::for_person("Sato").matches(&r));
        assert!(!RecordFilter::for_person("Ito").matches(&r));
    }
}
