//! azdo-exporterd — the azdo-exporter daemon.
//!
//! Wires the Azure DevOps client, the build and release collectors, the
//! commit queue and the scrape endpoint into one process.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition of every family |
//! | GET | `/healthz` | Liveness probe |

pub mod config;
pub mod server;

pub use config::{Cli, parse_duration};
pub use server::{ServerState, build_router};
