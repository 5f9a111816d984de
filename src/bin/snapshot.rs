//! Print the current dashboard view as JSON.
//!
//! Run with: cargo run --bin snapshot -- [--person NAME] [--csv PATH]
//! Without `--csv` the view is computed from the SQLite store at SALES_DB_PATH.

use std::path::PathBuf;
use std::sync::Arc;

use salesdash::config::Config;
use salesdash::ingest::read_sales_csv;
use salesdash::service::DashboardService;
use salesdash::store::memory::MemoryStore;
use salesdash::store::sqlite::SqliteStore;
use salesdash::store::SalesStore;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let cfg = Config::from_env();

    let store: Arc<dyn SalesStore> = match flag("--csv") {
        Some(path) => match read_sales_csv(&PathBuf::from(&path)) {
            Ok((records, report)) => {
                if report.bad_rows > 0 {
                    eprintln!("skipped {} bad rows in {}", report.bad_rows, path);
                }
                Arc::new(MemoryStore::with_records(records))
            }
            Err(err) => {
                eprintln!("failed to read {}: {:#}", path, err);
                std::process::exit(1);
            }
        },
        None => match SqliteStore::open(&cfg.sqlite_path).and_then(|s| s.init().map(|_| s)) {
            Ok(s) => Arc::new(s),
            Err(err) => {
                eprintln!("failed to open {}: {:#}", cfg.sqlite_path, err);
                std::process::exit(1);
            }
        },
    };

    let service = DashboardService::new(store, &cfg);
    let json = match flag("--person") {
        Some(name) => serde_json::to_string_pretty(&*service.person_detail(&name).await),
        None => {
            service.refresh().await;
            serde_json::to_string_pretty(&*service.current())
        }
    };
    match json {
        Ok(out) => println!("{}", out),
        Err(err) => {
            eprintln!("failed to serialize view: {}", err);
            std::process::exit(2);
        }
    }
}
