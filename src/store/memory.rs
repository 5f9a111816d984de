use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{ChangeFeed, RecordFilter, SalesStore, Subscription};
use crate::model::{SalesPerson, SalesRecord};

/// Process-local store. Backs tests and the snapshot tool when fed from CSV.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<SalesRecord>>,
    people: RwLock<Vec<SalesPerson>>,
    unavailable: AtomicBool,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SalesRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.records.write() {
            *guard = records;
        }
        store
    }

    pub fn push(&self, record: SalesRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("records lock poisoned"))?
            .push(record);
        self.feed.notify("push");
        Ok(())
    }

    pub fn put_person(&self, person: SalesPerson) -> Result<()> {
        let mut people = self.people.write().map_err(|_| anyhow!("people lock poisoned"))?;
        people.retain(|p| p.name != person.name);
        people.push(person);
        drop(people);
        self.feed.notify("put_person");
        Ok(())
    }

    /// While set, every fetch fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl SalesStore for MemoryStore {
    async fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
        self.check_available()?;
        let records = self.records.read().map_err(|_| anyhow!("records lock poisoned"))?;
        let mut out: Vec<SalesRecord> = records.iter().filter(|r| filter.matches(r)).cloned().collect();
        // stable: insertion order breaks date ties
        out.sort_by_key(|r| r.date);
        Ok(out)
    }

    async fn fetch_person(&self, name: &str) -> Result<Option<SalesPerson>> {
        self.check_available()?;
        let people = self.people.read().map_err(|_| anyhow!("people lock poisoned"))?;
        Ok(people.iter().find(|p| p.name == name).cloned())
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}
