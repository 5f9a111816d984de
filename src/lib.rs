pub mod bucket;
pub mod coerce;
pub mod color;
pub mod config;
pub mod cumulative;
pub mod group;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod ranking;
pub mod retry;
pub mod server;
pub mod service;
pub mod stacked;
pub mod store;
pub mod summary;
