//! Keeps the dashboard view current.
//!
//! Every change notification triggers a full refetch and recompute. A failed
//! fetch leaves the previous view in place; callers always get something to
//! render.

use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use serde_json::json;

use crate::config::Config;
use crate::logging::{log, log_fetch_failure, log_recompute, obj, v_dec, v_str, Domain, Level, ProfileScope};
use crate::model::SalesRecord;
use crate::retry::{retry_async, RetryConfig};
use crate::store::{RecordFilter, SalesStore};
use crate::summary::{compose_dashboard, compose_person_detail, view_digest, DashboardView, PersonDetail, ViewOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated {
        records: usize,
        digest: String,
        changed: bool,
    },
    /// Fetch failed; the previous view is still being served.
    Stale { error: String },
}

pub struct DashboardService {
    store: Arc<dyn SalesStore>,
    options: ViewOptions,
    retry: RetryConfig,
    view: RwLock<Arc<DashboardView>>,
    digest: Mutex<Option<String>>,
    last_detail: Mutex<Option<Arc<PersonDetail>>>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn SalesStore>, cfg: &Config) -> Self {
        Self::with_options(store, cfg.view_options(), cfg.retry_config())
    }

    pub fn with_options(store: Arc<dyn SalesStore>, options: ViewOptions, retry: RetryConfig) -> Self {
        Self {
            store,
            options,
            retry,
            view: RwLock::new(Arc::new(DashboardView::empty())),
            digest: Mutex::new(None),
            last_detail: Mutex::new(None),
        }
    }

    /// Last successfully computed view; the empty view before the first refresh.
    pub fn current(&self) -> Arc<DashboardView> {
        match self.view.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    async fn fetch_records(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
        let store = &self.store;
        retry_async(&self.retry, "fetch_all", move || store.fetch_all(filter)).await
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let _scope = ProfileScope::new("refresh");
        let records = match self.fetch_records(&RecordFilter::all()).await {
            Ok(records) => records,
            Err(err) => {
                let error = err.to_string();
                log_fetch_failure("fetch_all", &error, "previous_view");
                return RefreshOutcome::Stale { error };
            }
        };

        let view = compose_dashboard(&records, &self.options);
        let total = view.kpis.total_sales;
        let digest = view_digest(&view);
        let changed = {
            let mut last = self.digest.lock().unwrap_or_else(|p| p.into_inner());
            let changed = last.as_deref() != Some(digest.as_str());
            *last = Some(digest.clone());
            changed
        };
        match self.view.write() {
            Ok(mut guard) => *guard = Arc::new(view),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(view),
        }
        log_recompute("dashboard", records.len(), total, &digest);
        RefreshOutcome::Updated {
            records: records.len(),
            digest,
            changed,
        }
    }

    /// Detail view for one salesperson. On fetch failure the previous detail
    /// for the same name is returned, or an empty detail if there is none.
    pub async fn person_detail(&self, name: &str) -> Arc<PersonDetail> {
        let _scope = ProfileScope::with_context("person_detail", &[("person", v_str(name))]);
        let fetched = async {
            let records = self.fetch_records(&RecordFilter::for_person(name)).await?;
            let store = &self.store;
            let info = retry_async(&self.retry, "fetch_person", move || store.fetch_person(name)).await?;
            Ok::<_, anyhow::Error>((records, info))
        }
        .await;

        let mut last = self.last_detail.lock().unwrap_or_else(|p| p.into_inner());
        match fetched {
            Ok((records, info)) => {
                let detail = Arc::new(compose_person_detail(name, info, &records, &self.options));
                log(
                    Level::Info,
                    Domain::Aggregate,
                    "recompute",
                    obj(&[
                        ("view", v_str("person_detail")),
                        ("person", v_str(name)),
                        ("records", json!(records.len())),
                        ("total", v_dec(detail.total_amount)),
                    ]),
                );
                *last = Some(Arc::clone(&detail));
                detail
            }
            Err(err) => match last.as_ref().filter(|d| d.name == name) {
                Some(previous) => {
                    log_fetch_failure("person_detail", &err.to_string(), "previous_detail");
                    Arc::clone(previous)
                }
                None => {
                    log_fetch_failure("person_detail", &err.to_string(), "empty_detail");
                    Arc::new(PersonDetail::empty(name))
                }
            },
        }
    }

    /// Subscribe, compute once, then recompute on every change until
    /// `shutdown` resolves or the store goes away.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut subscription = self.store.subscribe();
        log(
            Level::Info,
            Domain::Refresh,
            "refresh_loop_started",
            obj(&[("subscription_id", json!(subscription.id()))]),
        );
        self.refresh().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log(Level::Info, Domain::Refresh, "refresh_loop_stopped", obj(&[("reason", v_str("shutdown"))]));
                    break;
                }
                alive = subscription.changed() => {
                    if !alive {
                        log(Level::Warn, Domain::Refresh, "refresh_loop_stopped", obj(&[("reason", v_str("feed_closed"))]));
                        break;
                    }
                    self.refresh().await;
                }
            }
        }
    }
}

/// Resolves once `signal` fires. A signal that could not be installed is
/// logged and treated as a shutdown request.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => log(Level::Info, Domain::System, "signal_received", obj(&[])),
        Err(err) => log(
            Level::Error,
            Domain::System,
            "signal_failed",
            obj(&[
                ("msg", v_str("shutdown signal handler unavailable; stopping")),
                ("error", v_str(&err.to_string())),
            ]),
        ),
    }
}
