//! Load a CSV export into the SQLite store.
//!
//! Run with: cargo run --bin import_sales -- sales.csv
//! Prints the data quality report as JSON; exits non-zero if nothing loads.

use salesdash::config::Config;
use salesdash::ingest::read_sales_csv;
use salesdash::logging::{log, obj, v_str, Domain, Level};
use salesdash::store::sqlite::SqliteStore;
use serde_json::json;
use std::path::PathBuf;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/sales.csv".to_string());
    let cfg = Config::from_env();

    let (records, report) = match read_sales_csv(PathBuf::from(&path).as_path()) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("import failed: {:#}", err);
            std::process::exit(1);
        }
    };

    let store = match SqliteStore::open(&cfg.sqlite_path).and_then(|s| s.init().map(|_| s)) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to open {}: {:#}", cfg.sqlite_path, err);
            std::process::exit(2);
        }
    };
    let loaded = match store.upsert_records(&records) {
        Ok(n) => n,
        Err(err) => {
            eprintln!("write failed: {:#}", err);
            std::process::exit(3);
        }
    };

    log(
        Level::Info,
        Domain::Ingest,
        "import_complete",
        obj(&[
            ("path", v_str(&path)),
            ("loaded", json!(loaded)),
            ("bad_rows", json!(report.bad_rows)),
            ("amount_mismatches", json!(report.amount_mismatches)),
        ]),
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "path": path, "loaded": loaded, "report": report }))
            .unwrap_or_default()
    );
    if loaded == 0 {
        std::process::exit(4);
    }
}
