pub mod config;
pub mod dispatch;
pub mod humanize;
pub mod observability;
pub mod progress;
pub mod reconcile;
pub mod schedule;
pub mod server;
pub mod storage;
pub mod streams;
