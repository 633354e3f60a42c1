//! azdo-client — Azure DevOps REST access for azdo-exporter.
//!
//! Collectors depend only on the [`DevOpsApi`] trait; the daemon wires in
//! [`AzureDevOpsClient`], tests wire in fakes.
//!
//! # Endpoints
//!
//! | Call | Path |
//! |---|---|
//! | `list_projects` | `{base}/{org}/_apis/projects` |
//! | `list_latest_builds` | `{base}/{org}/{project}/_apis/build/builds` |
//! | `list_release_definitions` | `{vsrm}/{org}/{project}/_apis/release/definitions` |
//! | `list_release_history` | `{vsrm}/{org}/{project}/_apis/release/releases` |

pub mod api;
pub mod client;
pub mod error;
pub mod model;

pub use api::DevOpsApi;
pub use client::{AzureDevOpsClient, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use model::*;
