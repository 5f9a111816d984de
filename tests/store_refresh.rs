use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tempfile::TempDir;

use salesdash::ingest::read_sales_csv;
use salesdash::model::SalesRecord;
use salesdash::retry::RetryConfig;
use salesdash::service::{DashboardService, RefreshOutcome};
use salesdash::store::sqlite::SqliteStore;
use salesdash::store::{RecordFilter, SalesStore};
use salesdash::summary::ViewOptions;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn rec(id: &str, day: &str, amount: &str) -> SalesRecord {
    SalesRecord {
        id: id.to_string(),
        date: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
        customer_name: "Acme".to_string(),
        product_name: "Widget".to_string(),
        quantity: 1,
        unit_price: dec(amount),
        total_amount: dec(amount),
        sales_person: "松澤".to_string(),
        category: None,
        notes: None,
        created_at: None,
        updated_at: None,
    }
}

fn open(dir: &TempDir) -> SqliteStore {
    let path = dir.path().join("sales.sqlite");
    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    store.init().unwrap();
    store
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.upsert_records(&[rec("a", "2024-01-02", "10"), rec("b", "2024-01-01", "5")]).unwrap();
    }
    let store = open(&dir);
    let all = store.fetch_all(&RecordFilter::all()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn external_commit_wakes_subscriber() {
    let dir = TempDir::new().unwrap();
    let watched = Arc::new(open(&dir));
    let mut sub = watched.subscribe();
    let _watch = watched.spawn_change_watcher(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let writer = open(&dir);
    writer.insert_record(&rec("x", "2024-01-01", "42")).unwrap();

    let woke = tokio::time::timeout(Duration::from_secs(5), sub.changed()).await;
    assert_eq!(woke.ok(), Some(true));
    let all = watched.fetch_all(&RecordFilter::all()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn service_tracks_sqlite_writes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir));
    let service = DashboardService::with_options(
        Arc::clone(&store) as Arc<dyn SalesStore>,
        ViewOptions::default(),
        RetryConfig::none(),
    );

    assert!(matches!(service.refresh().await, RefreshOutcome::Updated { records: 0, .. }));
    assert_eq!(service.current().kpis.total_sales, Decimal::ZERO);

    store.insert_record(&rec("a", "2024-01-01", "100")).unwrap();
    store.insert_record(&rec("b", "2024-01-08", "200")).unwrap();
    service.refresh().await;
    let view = service.current();
    assert_eq!(view.kpis.total_sales, dec("300"));
    assert_eq!(view.weekly.len(), 2);

    assert!(store.delete_record("a").unwrap());
    service.refresh().await;
    assert_eq!(service.current().kpis.total_sales, dec("200"));
}

#[tokio::test]
async fn csv_import_feeds_dashboard() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("sales.csv");
    fs::write(
        &csv,
        "date,customer_name,product_name,quantity,unit_price,total_amount,sales_person,category\n\
         2024-01-01,Acme,Widget,2,50,100,松澤,Hardware\n\
         2024-01-02,Beta,Gadget,1,30,30,坂口,\n\
         not-a-date,Beta,Gadget,1,30,30,坂口,\n",
    )
    .unwrap();
    let (records, report) = read_sales_csv(&csv).unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.bad_rows, 1);

    let store = Arc::new(open(&dir));
    store.upsert_records(&records).unwrap();
    // re-importing the same file does not duplicate rows
    store.upsert_records(&records).unwrap();

    let service = DashboardService::with_options(store, ViewOptions::default(), RetryConfig::none());
    service.refresh().await;
    let view = service.current();
    assert_eq!(view.kpis.order_count, 2);
    assert_eq!(view.kpis.total_sales, dec("130"));
    assert_eq!(view.categories[1].key, "Uncategorized");
}

#[tokio::test]
async fn identical_csv_rows_are_all_stored() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("dupes.csv");
    fs::write(
        &csv,
        "date,customer_name,product_name,total_amount,sales_person\n\
         2024-01-05,Acme,Widget,100,松澤\n\
         2024-01-05,Acme,Widget,100,松澤\n",
    )
    .unwrap();
    let (records, _) = read_sales_csv(&csv).unwrap();

    let store = open(&dir);
    assert_eq!(store.upsert_records(&records).unwrap(), 2);
    // importing the same file twice does not add rows
    store.upsert_records(&records).unwrap();
    let stored = store.fetch_all(&RecordFilter::all()).await.unwrap();
    assert_eq!(stored.len(), 2);
    let total: Decimal = stored.iter().map(|r| r.total_amount).sum();
    assert_eq!(total, dec("200"));
}

#[tokio::test]
async fn csv_amounts_stay_exact_through_sqlite() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("big.csv");
    fs::write(
        &csv,
        "id,date,customer_name,product_name,total_amount,sales_person\n\
         b1,2024-01-05,Acme,Widget,1234567890123.4567,松澤\n",
    )
    .unwrap();
    let (records, _) = read_sales_csv(&csv).unwrap();
    let store = open(&dir);
    store.upsert_records(&records).unwrap();
    let stored = store.fetch_all(&RecordFilter::all()).await.unwrap();
    assert_eq!(stored[0].total_amount, dec("1234567890123.4567"));
}
