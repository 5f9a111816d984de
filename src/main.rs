use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use salesdash::config::Config;
use salesdash::logging::{log, obj, v_str, Domain, Level};
use salesdash::server::serve;
use salesdash::service::{shutdown_on, DashboardService};
use salesdash::store::sqlite::SqliteStore;
use serde_json::json;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Arc::new(Config::from_env());
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("port", json!(cfg.http_port)),
            ("top_n", json!(cfg.top_n)),
            ("recent_limit", json!(cfg.recent_limit)),
            ("change_poll_ms", json!(cfg.change_poll_ms)),
        ]),
    );

    let store = Arc::new(SqliteStore::open(&cfg.sqlite_path)?);
    store.init()?;
    // commits from other processes only surface through polling
    let _watch = store.spawn_change_watcher(Duration::from_millis(cfg.change_poll_ms.max(10)));

    let service = Arc::new(DashboardService::new(store, &cfg));
    let listener = TcpListener::bind(("127.0.0.1", cfg.http_port)).await?;
    let server = tokio::spawn(serve(listener, Arc::clone(&service), Arc::clone(&cfg)));

    service.run(shutdown_on(tokio::signal::ctrl_c())).await;

    server.abort();
    log(Level::Info, Domain::System, "shutdown", obj(&[]));
    Ok(())
}
