//! The calls collectors make against Azure DevOps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ClientResult;
use crate::model::{Build, Project, Release, ReleaseDefinition};

/// Read-only access to the upstream resources the exporter publishes.
///
/// Implementations own pagination and authentication. They do not retry;
/// a failed call surfaces to the collector, which skips the cycle.
#[async_trait]
pub trait DevOpsApi: Send + Sync {
    /// Projects of the configured organisation.
    async fn list_projects(&self) -> ClientResult<Vec<Project>>;

    /// The most recent build of every build definition in a project.
    async fn list_latest_builds(&self, project_id: &str) -> ClientResult<Vec<Build>>;

    /// Release definitions with their environments embedded.
    async fn list_release_definitions(
        &self,
        project_id: &str,
    ) -> ClientResult<Vec<ReleaseDefinition>>;

    /// Releases created at or after `min_created`, with environments,
    /// artifacts and approvals embedded.
    async fn list_release_history(
        &self,
        project_id: &str,
        min_created: DateTime<Utc>,
    ) -> ClientResult<Vec<Release>>;
}
