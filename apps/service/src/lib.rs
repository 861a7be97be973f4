//! upwatch: periodic HTTP(S) uptime checks with SMS alerts on state change.

pub mod accounts;
pub mod config;
pub mod database;
pub mod logs;
pub mod models;
pub mod monitoring;
pub mod notify;
pub mod orchestrator;
pub mod pool;
pub mod validation;
