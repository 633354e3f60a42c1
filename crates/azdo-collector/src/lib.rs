//! azdo-collector — build and release collectors plus their scheduler.
//!
//! Each collector owns a set of gauge families, fetches one project's
//! records through [`azdo_client::DevOpsApi`], flattens them into a private
//! [`azdo_metrics::MetricSet`] and hands the result to the committer.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   └── Per-collector loop (own interval)
//!       ├── list_projects() → ProjectFilter
//!       ├── empty commit for projects that left scope
//!       └── run_cycle() per project, concurrently
//!           ├── Collector::collect() → MetricSet
//!           └── CommitSender::submit(CommitTask)
//! ```
//!
//! A cycle that fails to fetch queues nothing; the project's previously
//! committed series stay published until the next successful cycle.

pub mod build;
pub mod collector;
pub mod error;
pub mod release;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use build::BuildCollector;
pub use collector::{Collector, ProjectLabels, run_cycle};
pub use error::{CollectError, CollectResult};
pub use release::ReleaseCollector;
pub use scheduler::{ProjectFilter, Round, RoundSummary, Scheduler};
