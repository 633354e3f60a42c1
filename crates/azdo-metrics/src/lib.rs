//! azdo-metrics — the collection-and-publish core of azdo-exporter.
//!
//! Turns hierarchical Azure DevOps records into flat gauge series and
//! publishes them into a shared [`Registry`] without ever exposing a
//! half-updated family to a concurrent scrape.
//!
//! # Architecture
//!
//! ```text
//! Collector cycle (private memory)
//!   ├── flatten::{info, timestamp, duration, boolean, non_zero}
//!   │     FamilySchema + LabelSource → Observation
//!   └── MetricSet ← observations grouped per family
//!
//! Commit protocol
//!   ├── CommitSender::submit(CommitTask) ← one task per finished cycle
//!   └── Committer::run() → Family::replace_since() (single writer, arrival order)
//!
//! Registry
//!   ├── Family (partitioned by project, swapped under a write lock)
//!   └── render() → text/plain for the /metrics endpoint
//! ```

pub mod commit;
pub mod error;
pub mod flatten;
pub mod labels;
pub mod metric_set;
pub mod prometheus;
pub mod registry;

pub use commit::{CommitSender, CommitTask, Committer, Stamp, commit_queue};
pub use error::{CommitError, RegistryError};
pub use flatten::Observation;
pub use labels::{FamilySchema, LabelSource, LabelValues, Typed};
pub use metric_set::MetricSet;
pub use registry::{Family, Registry, Series};
