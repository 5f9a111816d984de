//! JSON endpoints for the dashboard renderer.
//!
//! Endpoints:
//!   GET /api/dashboard          - overview view
//!   GET /api/person?name=<name> - salesperson detail
//!   GET /api/config             - renderer settings
//!   GET /api/health             - health check

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::service::DashboardService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Person(String),
    Config,
    Health,
    BadRequest(&'static str),
    NotFound,
}

/// Route from an HTTP request line such as `GET /api/person?name=Sato HTTP/1.1`.
pub fn parse_route(request_line: &str) -> Route {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Route::NotFound;
    };
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };
    match path {
        "/api/dashboard" => Route::Dashboard,
        "/api/config" => Route::Config,
        "/api/health" => Route::Health,
        "/api/person" => url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(Route::Person)
            .unwrap_or(Route::BadRequest("missing name")),
        _ => Route::NotFound,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status: "200 OK",
                content_type: "application/json",
                body,
            },
            Err(err) => Self {
                status: "500 INTERNAL SERVER ERROR",
                content_type: "application/json",
                body: json!({ "error": err.to_string() }).to_string(),
            },
        }
    }

    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            self.status,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

pub async fn handle(service: &DashboardService, cfg: &Config, route: &Route) -> Response {
    match route {
        Route::Dashboard => Response::json(&*service.current()),
        Route::Person(name) => Response::json(&*service.person_detail(name).await),
        Route::Config => Response::json(&json!({
            "displayUrl": cfg.display_url.as_ref().map(|u| u.as_str()),
            "topN": cfg.top_n,
            "recentLimit": cfg.recent_limit,
        })),
        Route::Health => Response::json(&json!({ "status": "ok" })),
        Route::BadRequest(reason) => Response::text("400 BAD REQUEST", reason),
        Route::NotFound => Response::text("404 NOT FOUND", "Not Found"),
    }
}

async fn serve_connection(stream: TcpStream, service: &DashboardService, cfg: &Config) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;
    let route = parse_route(line.trim_end());
    let response = handle(service, cfg, &route).await;
    log(
        Level::Debug,
        Domain::Http,
        "request",
        obj(&[
            ("request", v_str(line.trim_end())),
            ("status", v_str(response.status)),
            ("bytes", json!(response.body.len())),
        ]),
    );
    writer.write_all(response.to_http().as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Accept connections until the task is dropped. Each connection is
/// served on its own task.
pub async fn serve(listener: TcpListener, service: Arc<DashboardService>, cfg: Arc<Config>) -> Result<()> {
    log(
        Level::Info,
        Domain::Http,
        "listening",
        obj(&[("addr", v_str(&listener.local_addr()?.to_string()))]),
    );
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                log(Level::Warn, Domain::Http, "accept_failed", obj(&[("error", v_str(&err.to_string()))]));
                continue;
            }
        };
        let service = Arc::clone(&service);
        let cfg = Arc::clone(&cfg);
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, &service, &cfg).await {
                log(
                    Level::Warn,
                    Domain::Http,
                    "connection_failed",
                    obj(&[("peer", v_str(&peer.to_string())), ("error", v_str(&err.to_string()))]),
                );
            }
        });
    }
}
