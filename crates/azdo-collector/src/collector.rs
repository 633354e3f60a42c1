//! The collector contract and the driver for one collection cycle.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, debug, error, info_span};

use azdo_client::Project;
use azdo_metrics::{CommitSender, CommitTask, Family, LabelSource, MetricSet, Stamp};

use crate::error::CollectResult;

/// One resource family's fetch-and-flatten rules.
///
/// `collect` runs with no access to the registry: everything it produces
/// stays in the returned [`MetricSet`] until [`run_cycle`] queues it.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Every family this collector publishes.
    fn families(&self) -> &[Arc<Family>];

    /// Fetch and flatten one project.
    async fn collect(&self, project: &Project) -> CollectResult<MetricSet>;

    /// Drop every series this collector has published. Commits queued by
    /// cycles that started earlier are discarded.
    fn reset(&self) {
        for family in self.families() {
            family.reset();
        }
    }
}

/// Run one cycle: collect a project and queue its commit.
///
/// Failures are logged and returned; in that case nothing is queued.
/// Returns the number of observations handed to the committer.
pub async fn run_cycle(
    collector: &dyn Collector,
    project: &Project,
    commits: &CommitSender,
) -> CollectResult<usize> {
    let span = info_span!(
        "cycle",
        collector = collector.name(),
        project = %project.name,
        project_id = %project.id,
    );

    async move {
        let started = Instant::now();
        let stamp = Stamp::now(collector.families());

        let set = match collector.collect(project).await {
            Ok(set) => set,
            Err(e) => {
                error!(error = %e, "collection failed, keeping previous series");
                return Err(e);
            }
        };

        let observations = set.len();
        let task = CommitTask::stamped(project.id.clone(), stamp, set);
        if let Err(e) = commits.submit(task).await {
            error!(error = %e, "could not queue commit");
            return Err(e.into());
        }

        debug!(
            observations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle queued for commit"
        );
        Ok(observations)
    }
    .instrument(span)
    .await
}

/// Labels identifying the project every series belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ProjectLabels<'a>(pub &'a Project);

impl LabelSource for ProjectLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        match name {
            "projectID" => Some(self.0.id.clone()),
            "projectName" => Some(self.0.name.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BUILD_INFO, BuildCollector};
    use crate::testing::{FakeApi, at, project};
    use azdo_client::Build;
    use azdo_metrics::{Registry, commit_queue};

    fn setup() -> (Registry, Arc<FakeApi>, BuildCollector) {
        let registry = Registry::new();
        let api = Arc::new(FakeApi::default());
        let collector = BuildCollector::setup(&registry, api.clone()).unwrap();
        (registry, api, collector)
    }

    fn build(id: i64) -> Build {
        Build {
            id,
            start_time: at(1_000),
            ..Build::default()
        }
    }

    #[tokio::test]
    async fn successful_cycle_queues_a_commit() {
        let (registry, api, collector) = setup();
        api.set_builds("p1", vec![build(1)]);
        let (commits, mut committer) = commit_queue(4);

        // info + started
        let queued = run_cycle(&collector, &project("p1"), &commits).await.unwrap();
        assert_eq!(queued, 2);

        // Not visible until the committer runs.
        let info = registry.family(BUILD_INFO.name).unwrap();
        assert!(info.is_empty());
        assert_eq!(committer.apply_pending(), 1);
        assert_eq!(info.len(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_queues_nothing() {
        let (_registry, api, collector) = setup();
        api.fail_builds("p1");
        let (commits, mut committer) = commit_queue(4);

        assert!(run_cycle(&collector, &project("p1"), &commits).await.is_err());
        assert_eq!(committer.apply_pending(), 0);
    }

    #[tokio::test]
    async fn closed_queue_is_a_commit_error() {
        let (_registry, api, collector) = setup();
        api.set_builds("p1", vec![build(1)]);
        let (commits, committer) = commit_queue(4);
        drop(committer);

        let err = run_cycle(&collector, &project("p1"), &commits)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::CollectError::Commit(_)));
    }

    #[tokio::test]
    async fn reset_clears_every_family() {
        let (registry, api, collector) = setup();
        api.set_builds("p1", vec![build(1)]);
        let (commits, mut committer) = commit_queue(4);
        run_cycle(&collector, &project("p1"), &commits).await.unwrap();
        committer.apply_pending();
        assert!(registry.families().iter().all(|f| !f.is_empty()));

        collector.reset();
        assert!(registry.families().iter().all(|f| f.is_empty()));
    }

    #[tokio::test]
    async fn reset_discards_commits_already_queued() {
        let (registry, api, collector) = setup();
        api.set_builds("p1", vec![build(1)]);
        let (commits, mut committer) = commit_queue(4);
        run_cycle(&collector, &project("p1"), &commits).await.unwrap();

        collector.reset();
        assert_eq!(committer.apply_pending(), 1);
        assert!(registry.families().iter().all(|f| f.is_empty()));

        // Cycles started after the reset publish normally.
        run_cycle(&collector, &project("p1"), &commits).await.unwrap();
        committer.apply_pending();
        assert_eq!(registry.family(BUILD_INFO.name).unwrap().len(), 1);
    }

    #[test]
    fn project_labels() {
        let p = project("p1");
        let labels = ProjectLabels(&p);
        assert_eq!(labels.label("projectID").as_deref(), Some("p1"));
        assert_eq!(labels.label("projectName").as_deref(), Some("Project p1"));
        assert_eq!(labels.label("buildID"), None);
    }
}
