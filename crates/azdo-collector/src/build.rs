//! Latest-build collector.
//!
//! One upstream call per project: the most recent build of every build
//! definition. Publishes a descriptive info series per build plus status
//! timestamps and the job duration.

use std::sync::Arc;

use async_trait::async_trait;

use azdo_client::{Build, DevOpsApi, Project};
use azdo_metrics::flatten;
use azdo_metrics::{Family, FamilySchema, LabelSource, MetricSet, Registry, RegistryError, Typed};

use crate::collector::{Collector, ProjectLabels};
use crate::error::{CollectError, CollectResult};

pub const BUILD_INFO: FamilySchema = FamilySchema::new(
    "azure_devops_build_latest_info",
    "Azure DevOps build (latest)",
    &[
        "projectID",
        "projectName",
        "buildDefinitionID",
        "buildID",
        "agentPoolID",
        "requestedBy",
        "buildNumber",
        "buildName",
        "sourceBranch",
        "sourceVersion",
        "status",
        "reason",
        "result",
        "url",
    ],
);

pub const BUILD_STATUS: FamilySchema = FamilySchema::new(
    "azure_devops_build_latest_status",
    "Azure DevOps build (latest)",
    &["projectID", "projectName", "buildID", "buildNumber", "type"],
);

/// Publishes the latest build of every definition.
pub struct BuildCollector {
    api: Arc<dyn DevOpsApi>,
    families: Vec<Arc<Family>>,
}

impl BuildCollector {
    /// Register the build families. Call once per registry.
    pub fn setup(registry: &Registry, api: Arc<dyn DevOpsApi>) -> Result<Self, RegistryError> {
        let families = vec![registry.register(BUILD_INFO)?, registry.register(BUILD_STATUS)?];
        Ok(Self { api, families })
    }
}

#[async_trait]
impl Collector for BuildCollector {
    fn name(&self) -> &'static str {
        "build"
    }

    fn families(&self) -> &[Arc<Family>] {
        &self.families
    }

    async fn collect(&self, project: &Project) -> CollectResult<MetricSet> {
        let builds = self
            .api
            .list_latest_builds(&project.id)
            .await
            .map_err(CollectError::fetch("list latest builds"))?;

        let mut set = MetricSet::new();
        flatten_builds(project, &builds, &mut set);
        Ok(set)
    }
}

/// Flatten a project's latest builds into `set`.
pub fn flatten_builds(project: &Project, builds: &[Build], set: &mut MetricSet) {
    let project = ProjectLabels(project);

    for build in builds {
        let labels = (project, BuildLabels(build));
        set.add(flatten::info(&BUILD_INFO, &labels));

        set.extend(flatten::timestamp(
            &BUILD_STATUS,
            &Typed::new(labels, "started"),
            build.start_time,
        ));
        set.extend(flatten::timestamp(
            &BUILD_STATUS,
            &Typed::new(labels, "queued"),
            build.queue_time,
        ));
        set.extend(flatten::timestamp(
            &BUILD_STATUS,
            &Typed::new(labels, "finished"),
            build.finish_time,
        ));
        set.extend(flatten::duration(
            &BUILD_STATUS,
            &Typed::new(labels, "jobDuration"),
            build.start_time,
            build.finish_time,
        ));
    }
}

#[derive(Debug, Clone, Copy)]
struct BuildLabels<'a>(&'a Build);

impl LabelSource for BuildLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let b = self.0;
        let value = match name {
            "buildDefinitionID" => b.definition.id.to_string(),
            "buildID" => b.id.to_string(),
            "agentPoolID" => b.queue.pool.id.to_string(),
            "requestedBy" => b.requested_by.display_name.clone(),
            "buildNumber" => b.build_number.clone(),
            "buildName" => b.definition.name.clone(),
            "sourceBranch" => b.source_branch.clone(),
            "sourceVersion" => b.source_version.clone(),
            "status" => b.status.clone(),
            "reason" => b.reason.clone(),
            "result" => b.result.clone(),
            "url" => b.links.web.href.clone(),
            _ => return None,
        };
        Some(value)
    }
}
