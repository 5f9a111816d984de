use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{ChangeFeed, RecordFilter, SalesStore, Subscription};
use crate::coerce::{amount_from_f64, amount_from_i64, amount_from_str, quantity_from_amount};
use crate::logging::{log, log_rejected_row, obj, ts_now, v_str, Domain, Level};
use crate::model::{SalesPerson, SalesRecord};

const RECORD_COLUMNS: &str = "id, date, customer_name, product_name, quantity, unit_price, \
     total_amount, sales_person, category, notes, created_at, updated_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening sales db {}", path))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            feed: ChangeFeed::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("sqlite connection poisoned"))
    }

    /// Amounts are stored as decimal text; NUMERIC affinity would round them through REAL.
    pub fn init(&self) -> Result<()> {
        self.lock()?.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS sales_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                date TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                product_name TEXT NOT NULL,
                quantity INTEGER,
                unit_price TEXT,
                total_amount TEXT,
                sales_person TEXT NOT NULL,
                category TEXT,
                notes TEXT,
                created_at TEXT,
                updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sales_records_date ON sales_records (date);
            CREATE INDEX IF NOT EXISTS idx_sales_records_person ON sales_records (sales_person);
            CREATE TABLE IF NOT EXISTS sales_people (
                name TEXT PRIMARY KEY,
                id TEXT,
                department TEXT,
                email TEXT,
                monthly_target TEXT,
                quarterly_target TEXT,
                hire_date TEXT
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Insert or replace by `id`.
    pub fn upsert_records(&self, records: &[SalesRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = ts_now();
        for r in records {
            tx.execute(
                "INSERT INTO sales_records (id, date, customer_name, product_name, quantity, unit_price,
                     total_amount, sales_person, category, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     date = excluded.date,
                     customer_name = excluded.customer_name,
                     product_name = excluded.product_name,
                     quantity = excluded.quantity,
                     unit_price = excluded.unit_price,
                     total_amount = excluded.total_amount,
                     sales_person = excluded.sales_person,
                     category = excluded.category,
                     notes = excluded.notes,
                     updated_at = excluded.updated_at",
                params![
                    r.id,
                    r.date.format("%Y-%m-%d").to_string(),
                    r.customer_name,
                    r.product_name,
                    r.quantity as i64,
                    r.unit_price.to_string(),
                    r.total_amount.to_string(),
                    r.sales_person,
                    r.category,
                    r.notes,
                    r.created_at.clone().unwrap_or_else(|| now.clone()),
                    r.updated_at.clone().unwrap_or_else(|| now.clone()),
                ],
            )?;
        }
        tx.commit()?;
        drop(conn);
        if !records.is_empty() {
            self.feed.notify("upsert_records");
        }
        Ok(records.len())
    }

    pub fn insert_record(&self, record: &SalesRecord) -> Result<()> {
        self.upsert_records(std::slice::from_ref(record)).map(|_| ())
    }

    /// Returns `false` when no record has this id.
    pub fn update_record(&self, record: &SalesRecord) -> Result<bool> {
        let changed = self.lock()?.execute(
            "UPDATE sales_records SET date = ?2, customer_name = ?3, product_name = ?4, quantity = ?5,
                 unit_price = ?6, total_amount = ?7, sales_person = ?8, category = ?9, notes = ?10,
                 updated_at = ?11
             WHERE id = ?1",
            params![
                record.id,
                record.date.format("%Y-%m-%d").to_string(),
                record.customer_name,
                record.product_name,
                record.quantity as i64,
                record.unit_price.to_string(),
                record.total_amount.to_string(),
                record.sales_person,
                record.category,
                record.notes,
                ts_now(),
            ],
        )?;
        if changed > 0 {
            self.feed.notify("update_record");
        }
        Ok(changed > 0)
    }

    pub fn delete_record(&self, id: &str) -> Result<bool> {
        let changed = self
            .lock()?
            .execute("DELETE FROM sales_records WHERE id = ?1", params![id])?;
        if changed > 0 {
            self.feed.notify("delete_record");
        }
        Ok(changed > 0)
    }

    pub fn upsert_person(&self, person: &SalesPerson) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO sales_people (name, id, department, email, monthly_target, quarterly_target, hire_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                 id = excluded.id,
                 department = excluded.department,
                 email = excluded.email,
                 monthly_target = excluded.monthly_target,
                 quarterly_target = excluded.quarterly_target,
                 hire_date = excluded.hire_date",
            params![
                person.name,
                person.id,
                person.department,
                person.email,
                person.monthly_target.to_string(),
                person.quarterly_target.to_string(),
                person.hire_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )?;
        self.feed.notify("upsert_person");
        Ok(())
    }

    /// Bumped by SQLite whenever another connection commits.
    fn data_version(&self) -> Result<i64> {
        Ok(self
            .lock()?
            .query_row("PRAGMA data_version", [], |row| row.get(0))?)
    }

    /// Poll for commits from other connections and turn them into change
    /// notifications. Polling stops when the handle is dropped.
    pub fn spawn_change_watcher(self: &Arc<Self>, interval: Duration) -> WatchHandle {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last = store.data_version().ok();
            loop {
                ticker.tick().await;
                match store.data_version() {
                    Ok(v) if Some(v) != last => {
                        last = Some(v);
                        store.feed.notify("external_commit");
                    }
                    Ok(_) => {}
                    Err(err) => log(
                        Level::Warn,
                        Domain::Store,
                        "watch_failed",
                        obj(&[("error", v_str(&err.to_string()))]),
                    ),
                }
            }
        });
        log(
            Level::Info,
            Domain::Store,
            "watch_started",
            obj(&[("interval_ms", json!(interval.as_millis() as u64))]),
        );
        WatchHandle { handle }
    }
}

/// Owns the change-watch task; aborts it on drop.
pub struct WatchHandle {
    handle: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.handle.abort();
        log(Level::Info, Domain::Store, "watch_stopped", obj(&[]));
    }
}

fn amount_at(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => amount_from_i64(i),
        ValueRef::Real(f) => amount_from_f64(f),
        ValueRef::Text(t) => amount_from_str(&String::from_utf8_lossy(t)),
        ValueRef::Null | ValueRef::Blob(_) => Decimal::ZERO,
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Rows with a malformed date are dropped here rather than inside aggregation.
fn decode_record(row: &Row) -> rusqlite::Result<Result<SalesRecord, (String, String)>> {
    let id: String = row.get(0)?;
    let raw_date: String = row.get(1)?;
    let Some(date) = parse_date(&raw_date) else {
        return Ok(Err((id, format!("malformed date {:?}", raw_date))));
    };
    Ok(Ok(SalesRecord {
        id,
        date,
        customer_name: row.get(2)?,
        product_name: row.get(3)?,
        quantity: quantity_from_amount(amount_at(row, 4)?),
        unit_price: amount_at(row, 5)?,
        total_amount: amount_at(row, 6)?,
        sales_person: row.get(7)?,
        category: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    }))
}

fn query_records(conn: &Connection, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
    let mut sql = format!("SELECT {} FROM sales_records", RECORD_COLUMNS);
    if filter.sales_person.is_some() {
        sql.push_str(" WHERE sales_person = ?1");
    }
    sql.push_str(" ORDER BY date ASC, seq ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = match &filter.sales_person {
        Some(name) => stmt
            .query_map(params![name], decode_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], decode_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            Ok(record) => records.push(record),
            Err((id, reason)) => log_rejected_row("sales_records", &id, &reason),
        }
    }
    Ok(records)
}

fn query_person(conn: &Connection, name: &str) -> Result<Option<SalesPerson>> {
    let person = conn
        .query_row(
            "SELECT name, id, department, email, monthly_target, quarterly_target, hire_date
             FROM sales_people WHERE name = ?1",
            params![name],
            |row| {
                let hire_date: Option<String> = row.get(6)?;
                Ok(SalesPerson {
                    name: row.get(0)?,
                    id: row.get(1)?,
                    department: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    monthly_target: amount_at(row, 4)?,
                    quarterly_target: amount_at(row, 5)?,
                    hire_date: hire_date.as_deref().and_then(parse_date),
                })
            },
        )
        .optional()?;
    Ok(person)
}

#[async_trait]
impl SalesStore for SqliteStore {
    async fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
        let conn = Arc::clone(&self.conn);
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| anyhow!("sqlite connection poisoned"))?;
            query_records(&conn, &filter)
        })
        .await?
    }

    async fn fetch_person(&self, name: &str) -> Result<Option<SalesPerson>> {
        let conn = Arc::clone(&self.conn);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| anyhow!("sqlite connection poisoned"))?;
            query_person(&conn, &name)
        })
        .await?
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        store
    }

    #[tokio::test]
    async fn test_fetch_orders_by_date() {
        let s = store();
        s.upsert_records(&[
            record("b", "2024-01-08", "Sato", "200"),
            record("a", "2024-01-01", "Sato", "100"),
            record("c", "2024-01-01", "Ito", "50"),
        ])
        .unwrap();
        let all = s.fetch_all(&RecordFilter::all()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(all[2].total_amount, dec("200"));
    }

    #[tokio::test]
    async fn test_filter_by_person() {
        let s = store();
        s.upsert_records(&[
            record("a", "2024-01-01", "Sato", "100"),
            record("b", "2024-01-02", "Ito", "50"),
        ])
        .unwrap();
        let own = s.fetch_all(&RecordFilter::for_person("Ito")).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, "b");
    }

    #[tokio::test]
    async fn test_raw_numeric_columns_are_coerced() {
        let s = store();
        s.lock()
            .unwrap()
            .execute_batch(
                "INSERT INTO sales_records (id, date, customer_name, product_name, quantity, unit_price,
                     total_amount, sales_person, category)
                 VALUES ('t', '2024-01-01', 'Acme', 'Widget', '3', 'abc', '12.50', 'Sato', NULL);
                 INSERT INTO sales_records (id, date, customer_name, product_name, quantity, unit_price,
                     total_amount, sales_person, category)
                 VALUES ('n', '2024-01-02', 'Acme', 'Widget', NULL, 1.5, NULL, 'Sato', '');",
            )
            .unwrap();
        let all = s.fetch_all(&RecordFilter::all()).await.unwrap();
        assert_eq!(all[0].quantity, 3);
        assert_eq!(all[0].unit_price, Decimal::ZERO);
        assert_eq!(all[0].total_amount, dec("12.5"));
        assert_eq!(all[1].quantity, 0);
        assert_eq!(all[1].unit_price, dec("1.5"));
        assert_eq!(all[1].total_amount, Decimal::ZERO);
        assert_eq!(all[1].category(), crate::model::UNCATEGORIZED);
    }

    #[tokio::test]
    async fn test_malformed_dates_skipped() {
        let s = store();
        s.insert_record(&record("ok", "2024-01-01", "Sato", "10")).unwrap();
        s.lock()
            .unwrap()
            .execute(
                "INSERT INTO sales_records (id, date, customer_name, product_name, sales_person)
                 VALUES ('bad', '01/02/2024', 'Acme', 'Widget', 'Sato')",
                [],
            )
            .unwrap();
        let all = s.fetch_all(&RecordFilter::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "ok");
    }

    #[tokio::test]
    async fn test_person_lookup() {
        let s = store();
        assert!(s.fetch_person("Sato").await.unwrap().is_none());
        s.upsert_person(&SalesPerson {
            id: Some("p1".to_string()),
            name: "Sato".to_string(),
            department: "East".to_string(),
            email: "sato@example.com".to_string(),
            monthly_target: dec("500000"),
            quarterly_target: dec("1500000"),
            hire_date: Some(date("2019-04-01")),
        })
        .unwrap();
        let p = s.fetch_person("Sato").await.unwrap().unwrap();
        assert_eq!(p.monthly_target, dec("500000"));
        assert_eq!(p.hire_date, Some(date("2019-04-01")));
    }

    #[tokio::test]
    async fn test_writes_notify_subscribers() {
        let s = store();
        let mut sub = s.subscribe();
        s.insert_record(&record("a", "2024-01-01", "Sato", "10")).unwrap();
        assert!(sub.changed().await);

        let mut updated = record("a", "2024-01-01", "Sato", "20");
        updated.notes = Some("revised".to_string());
        assert!(s.update_record(&updated).unwrap());
        assert!(sub.changed().await);

        assert!(s.delete_record("a").unwrap());
        assert!(sub.changed().await);
        assert!(!s.delete_record("a").unwrap());
        assert!(!sub.has_pending());
    }

    #[tokio::test]
    async fn test_amounts_round_trip_exactly() {
        let s = store();
        let mut r = record("big", "2024-01-01", "Sato", "1234567890123.4567");
        r.unit_price = dec("0.000000000000000001");
        s.insert_record(&r).unwrap();
        s.upsert_person(&SalesPerson {
            id: None,
            name: "Sato".to_string(),
            department: String::new(),
            email: String::new(),
            monthly_target: dec("98765432109876.54321"),
            quarterly_target: Decimal::ZERO,
            hire_date: None,
        })
        .unwrap();

        let all = s.fetch_all(&RecordFilter::all()).await.unwrap();
        assert_eq!(all[0].total_amount.to_string(), "1234567890123.4567");
        assert_eq!(all[0].unit_price, dec("0.000000000000000001"));
        let p = s.fetch_person("Sato").await.unwrap().unwrap();
        assert_eq!(p.monthly_target.to_string(), "98765432109876.54321");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_id() {
        let s = store();
        s.insert_record(&record("a", "2024-01-01", "Sato", "10")).unwrap();
        s.insert_record(&record("a", "2024-01-01", "Sato", "15")).unwrap();
        let all = s.fetch_all(&RecordFilter::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total_amount, dec("15"));
    }
}
