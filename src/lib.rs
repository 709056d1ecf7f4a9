pub mod api;
pub mod config;
pub mod db;
pub mod display;
pub mod history;
pub mod ingest;
pub mod liveness;
pub mod mqtt;
pub mod time;
