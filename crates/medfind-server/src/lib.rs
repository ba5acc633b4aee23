//! HTTP service and CLI for medfind.
//!
//! The binary wires the core resolver to a SQLite pharmacy store, the CSV
//! catalog and the embedding cache, then serves it over axum.

pub mod commands;
pub mod config;
pub mod http;
pub mod telemetry;

pub use config::{Cli, Commands, Settings};
pub use http::{router, AppState};
