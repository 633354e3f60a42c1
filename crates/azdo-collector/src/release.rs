//! Release collector.
//!
//! Two upstream calls per project: release definitions (with their stages)
//! and the release history inside the lookback window (with stages,
//! artifacts and approvals). Either call failing aborts the whole cycle.
//!
//! Only human approvals are published; automated approvals are dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use azdo_client::{
    Approval, DevOpsApi, Project, Release, ReleaseArtifact, ReleaseDefinition,
    ReleaseDefinitionEnvironment, ReleaseEnvironment,
};
use azdo_metrics::flatten::{self, bool_label};
use azdo_metrics::{Family, FamilySchema, LabelSource, MetricSet, Registry, RegistryError, Typed};

use crate::collector::{Collector, ProjectLabels};
use crate::error::{CollectError, CollectResult};

pub const RELEASE_INFO: FamilySchema = FamilySchema::new(
    "azure_devops_release_info",
    "Azure DevOps release",
    &[
        "projectID",
        "projectName",
        "releaseID",
        "releaseDefinitionID",
        "requestedBy",
        "releaseName",
        "status",
        "reason",
        "result",
        "url",
    ],
);

pub const RELEASE_ARTIFACT: FamilySchema = FamilySchema::new(
    "azure_devops_release_artifact",
    "Azure DevOps release",
    &[
        "projectID",
        "projectName",
        "releaseID",
        "releaseDefinitionID",
        "sourceId",
        "repositoryID",
        "branch",
        "type",
        "alias",
        "version",
    ],
);

pub const RELEASE_ENVIRONMENT: FamilySchema = FamilySchema::new(
    "azure_devops_release_environment",
    "Azure DevOps release environment",
    &[
        "projectID",
        "projectName",
        "releaseID",
        "releaseDefinitionID",
        "environmentID",
        "environmentName",
        "status",
        "triggerReason",
        "rank",
    ],
);

pub const RELEASE_ENVIRONMENT_STATUS: FamilySchema = FamilySchema::new(
    "azure_devops_release_environment_status",
    "Azure DevOps release environment status",
    &[
        "projectID",
        "projectName",
        "releaseID",
        "releaseDefinitionID",
        "environmentID",
        "type",
    ],
);

pub const RELEASE_APPROVAL: FamilySchema = FamilySchema::new(
    "azure_devops_release_approval",
    "Azure DevOps release approval",
    &[
        "projectID",
        "projectName",
        "releaseID",
        "releaseDefinitionID",
        "environmentID",
        "approvalType",
        "status",
        "isAutomated",
        "trialNumber",
        "attempt",
        "rank",
        "approver",
        "approvedBy",
    ],
);

pub const RELEASE_DEFINITION_INFO: FamilySchema = FamilySchema::new(
    "azure_devops_release_definition_info",
    "Azure DevOps release definition",
    &[
        "projectID",
        "projectName",
        "releaseDefinitionID",
        "releaseNameFormat",
        "releaseDefinitionName",
        "path",
        "url",
    ],
);

pub const RELEASE_DEFINITION_ENVIRONMENT: FamilySchema = FamilySchema::new(
    "azure_devops_release_definition_environment",
    "Azure DevOps release definition environment",
    &[
        "projectID",
        "projectName",
        "releaseDefinitionID",
        "environmentID",
        "environmentName",
        "rank",
        "owner",
        "releaseID",
        "badgeUrl",
    ],
);

/// Publishes release definitions and the recent release history.
pub struct ReleaseCollector {
    api: Arc<dyn DevOpsApi>,
    families: Vec<Arc<Family>>,
    /// How far back the release history reaches.
    history: Duration,
}

impl ReleaseCollector {
    /// Register the release families. Call once per registry.
    pub fn setup(
        registry: &Registry,
        api: Arc<dyn DevOpsApi>,
        history: Duration,
    ) -> Result<Self, RegistryError> {
        let families = [
            RELEASE_DEFINITION_INFO,
            RELEASE_DEFINITION_ENVIRONMENT,
            RELEASE_INFO,
            RELEASE_ARTIFACT,
            RELEASE_ENVIRONMENT,
            RELEASE_ENVIRONMENT_STATUS,
            RELEASE_APPROVAL,
        ]
        .into_iter()
        .map(|schema| registry.register(schema))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            api,
            families,
            history,
        })
    }

    fn min_created(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.history)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[async_trait]
impl Collector for ReleaseCollector {
    fn name(&self) -> &'static str {
        "release"
    }

    fn families(&self) -> &[Arc<Family>] {
        &self.families
    }

    async fn collect(&self, project: &Project) -> CollectResult<MetricSet> {
        let definitions = self
            .api
            .list_release_definitions(&project.id)
            .await
            .map_err(CollectError::fetch("list release definitions"))?;

        let releases = self
            .api
            .list_release_history(&project.id, self.min_created())
            .await
            .map_err(CollectError::fetch("list release history"))?;

        let mut set = MetricSet::new();
        flatten_definitions(project, &definitions, &mut set);
        flatten_releases(project, &releases, &mut set);
        Ok(set)
    }
}

/// Flatten release definitions and their stages into `set`.
pub fn flatten_definitions(
    project: &Project,
    definitions: &[ReleaseDefinition],
    set: &mut MetricSet,
) {
    let project = ProjectLabels(project);

    for definition in definitions {
        let parent = (project, DefinitionLabels(definition));
        set.add(flatten::info(&RELEASE_DEFINITION_INFO, &parent));

        for environment in &definition.environments {
            set.add(flatten::info(
                &RELEASE_DEFINITION_ENVIRONMENT,
                &(DefinitionEnvironmentLabels(environment), parent),
            ));
        }
    }
}

/// Flatten releases with their artifacts, stages and approvals into `set`.
pub fn flatten_releases(project: &Project, releases: &[Release], set: &mut MetricSet) {
    let project = ProjectLabels(project);

    for release in releases {
        let parent = (project, ReleaseLabels(release));
        set.add(flatten::info(&RELEASE_INFO, &parent));

        for artifact in &release.artifacts {
            set.add(flatten::info(
                &RELEASE_ARTIFACT,
                &(ArtifactLabels(artifact), parent),
            ));
        }

        for environment in &release.environments {
            let stage = (EnvironmentLabels(environment), parent);
            set.add(flatten::info(&RELEASE_ENVIRONMENT, &stage));

            set.add(flatten::boolean(
                &RELEASE_ENVIRONMENT_STATUS,
                &Typed::new(stage, "succeeded"),
                environment.status == "succeeded",
            ));
            set.extend(flatten::timestamp(
                &RELEASE_ENVIRONMENT_STATUS,
                &Typed::new(stage, "created"),
                environment.created_on,
            ));
            // Upstream reports minutes.
            set.extend(flatten::non_zero(
                &RELEASE_ENVIRONMENT_STATUS,
                &Typed::new(stage, "jobDuration"),
                environment.time_to_deploy * 60.0,
            ));

            let approvals = environment
                .pre_deploy_approvals
                .iter()
                .chain(&environment.post_deploy_approvals)
                .filter(|approval| !approval.is_automated);
            for approval in approvals {
                set.extend(flatten::timestamp(
                    &RELEASE_APPROVAL,
                    &(ApprovalLabels(approval), stage),
                    approval.created_on,
                ));
            }
        }
    }
}

// ── Label sources ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct DefinitionLabels<'a>(&'a ReleaseDefinition);

impl LabelSource for DefinitionLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let d = self.0;
        let value = match name {
            "releaseDefinitionID" => d.id.to_string(),
            "releaseNameFormat" => d.release_name_format.clone(),
            "releaseDefinitionName" => d.name.clone(),
            "path" => d.path.clone(),
            "url" => d.links.web.href.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct DefinitionEnvironmentLabels<'a>(&'a ReleaseDefinitionEnvironment);

impl LabelSource for DefinitionEnvironmentLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let e = self.0;
        let value = match name {
            "environmentID" => e.id.to_string(),
            "environmentName" => e.name.clone(),
            "rank" => e.rank.to_string(),
            "owner" => e.owner.display_name.clone(),
            "releaseID" => e.current_release.id.to_string(),
            "badgeUrl" => e.badge_url.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct ReleaseLabels<'a>(&'a Release);

impl LabelSource for ReleaseLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let r = self.0;
        let value = match name {
            "releaseID" => r.id.to_string(),
            "releaseDefinitionID" => r.definition.id.to_string(),
            "requestedBy" => r.requested_by.display_name.clone(),
            "releaseName" => r.name.clone(),
            "status" => r.status.clone(),
            "reason" => r.reason.clone(),
            "result" => bool_label(r.result),
            "url" => r.links.web.href.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct ArtifactLabels<'a>(&'a ReleaseArtifact);

impl LabelSource for ArtifactLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let a = self.0;
        let value = match name {
            "sourceId" => a.source_id.clone(),
            "repositoryID" => a.definition_reference.repository.name.clone(),
            "branch" => a.definition_reference.branch.name.clone(),
            "type" => a.kind.clone(),
            "alias" => a.alias.clone(),
            "version" => a.definition_reference.version.name.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct EnvironmentLabels<'a>(&'a ReleaseEnvironment);

impl LabelSource for EnvironmentLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let e = self.0;
        let value = match name {
            "environmentID" => e.definition_environment_id.to_string(),
            "environmentName" => e.name.clone(),
            "status" => e.status.clone(),
            "triggerReason" => e.trigger_reason.clone(),
            "rank" => e.rank.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct ApprovalLabels<'a>(&'a Approval);

impl LabelSource for ApprovalLabels<'_> {
    fn label(&self, name: &str) -> Option<String> {
        let a = self.0;
        let value = match name {
            "approvalType" => a.approval_type.clone(),
            "status" => a.status.clone(),
            "isAutomated" => bool_label(a.is_automated),
            "trialNumber" => a.trial_number.to_string(),
            "attempt" => a.attempt.to_string(),
            "rank" => a.rank.to_string(),
            "approver" => a.approver.display_name.clone(),
            "approvedBy" => a.approved_by.display_name.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, at, project};
    use azdo_client::{IdentityRef, ReleaseDefinitionRef, ReleaseRef};
    use azdo_metrics::{CommitTask, Observation};

    fn approval(automated: bool, approver: &str) -> Approval {
        Approval {
            approval_type: "preDeploy".to_string(),
            status: "approved".to_string(),
            is_automated: automated,
            trial_number: 1,
            attempt: 1,
            rank: 1,
            approver: IdentityRef {
                display_name: approver.to_string(),
            },
            created_on: at(1_704_067_200),
            ..Approval::default()
        }
    }

    fn environment() -> ReleaseEnvironment {
        ReleaseEnvironment {
            id: 100,
            definition_environment_id: 5,
            name: "prod".to_string(),
            status: "succeeded".to_string(),
            trigger_reason: "After release".to_string(),
            rank: 1,
            created_on: at(1_704_067_200),
            time_to_deploy: 1.5,
            ..ReleaseEnvironment::default()
        }
    }

    fn release(environments: Vec<ReleaseEnvironment>) -> Release {
        Release {
            id: 9,
            name: "Release-9".to_string(),
            status: "active".to_string(),
            definition: ReleaseDefinitionRef {
                id: 3,
                name: "deploy".to_string(),
            },
            environments,
            ..Release::default()
        }
    }

    fn flattened(releases: &[Release]) -> MetricSet {
        let mut set = MetricSet::new();
        flatten_releases(&project("p1"), releases, &mut set);
        set
    }

    fn env_status<'a>(set: &'a MetricSet, kind: &str) -> Option<&'a Observation> {
        set.observations(RELEASE_ENVIRONMENT_STATUS.name)
            .iter()
            .find(|o| o.labels[5] == kind)
    }

    #[test]
    fn release_info_and_environment() {
        let set = flattened(&[release(vec![environment()])]);

        let info = set.observations(RELEASE_INFO.name);
        assert_eq!(info.len(), 1);
        assert_eq!(
            info[0].labels,
            vec!["p1", "Project p1", "9", "3", "", "Release-9", "active", "", "false", ""]
        );

        let env = set.observations(RELEASE_ENVIRONMENT.name);
        assert_eq!(env.len(), 1);
        assert_eq!(
            env[0].labels,
            vec!["p1", "Project p1", "9", "3", "5", "prod", "succeeded", "After release", "1"]
        );
    }

    #[test]
    fn environment_status_series() {
        let set = flattened(&[release(vec![environment()])]);

        assert_eq!(env_status(&set, "succeeded").unwrap().value, 1.0);
        assert_eq!(env_status(&set, "created").unwrap().value, 1_704_067_200.0);
        assert_eq!(env_status(&set, "jobDuration").unwrap().value, 90.0);
    }

    #[test]
    fn failed_environment_is_zero() {
        let env = ReleaseEnvironment {
            status: "rejected".to_string(),
            ..environment()
        };
        let set = flattened(&[release(vec![env])]);
        assert_eq!(env_status(&set, "succeeded").unwrap().value, 0.0);
    }

    #[test]
    fn zero_time_to_deploy_has_no_job_duration() {
        let env = ReleaseEnvironment {
            time_to_deploy: 0.0,
            ..environment()
        };
        let set = flattened(&[release(vec![env])]);
        assert!(env_status(&set, "jobDuration").is_none());
    }

    #[test]
    fn unset_created_on_has_no_created_series() {
        let env = ReleaseEnvironment {
            created_on: None,
            ..environment()
        };
        let set = flattened(&[release(vec![env])]);
        assert!(env_status(&set, "created").is_none());
        assert!(env_status(&set, "succeeded").is_some());
    }

    #[test]
    fn automated_approvals_are_dropped() {
        let env = ReleaseEnvironment {
            pre_deploy_approvals: vec![approval(true, "system"), approval(false, "Ann")],
            post_deploy_approvals: vec![approval(true, "system")],
            ..environment()
        };
        let set = flattened(&[release(vec![env])]);

        let approvals = set.observations(RELEASE_APPROVAL.name);
        assert_eq!(approvals.len(), 1);
        assert_eq!(
            approvals[0].labels,
            vec![
                "p1", "Project p1", "9", "3", "5", "preDeploy", "approved", "false", "1", "1",
                "1", "Ann", ""
            ]
        );
        assert_eq!(approvals[0].value, 1_704_067_200.0);
    }

    #[test]
    fn post_deploy_approvals_are_published() {
        let mut post = approval(false, "Bob");
        post.approval_type = "postDeploy".to_string();
        let env = ReleaseEnvironment {
            post_deploy_approvals: vec![post],
            ..environment()
        };
        let set = flattened(&[release(vec![env])]);

        let approvals = set.observations(RELEASE_APPROVAL.name);
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].labels[5], "postDeploy");
        assert_eq!(approvals[0].labels[11], "Bob");
    }

    #[test]
    fn artifacts_carry_release_labels() {
        let mut r = release(vec![]);
        r.artifacts = vec![ReleaseArtifact {
            source_id: "p1:7".to_string(),
            kind: "Build".to_string(),
            alias: "_ci".to_string(),
            ..ReleaseArtifact::default()
        }];
        r.artifacts[0].definition_reference.repository.name = "repo".to_string();
        r.artifacts[0].definition_reference.branch.name = "refs/heads/main".to_string();
        r.artifacts[0].definition_reference.version.name = "20240101.1".to_string();

        let set = flattened(&[r]);
        let artifacts = set.observations(RELEASE_ARTIFACT.name);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(
            artifacts[0].labels,
            vec![
                "p1", "Project p1", "9", "3", "p1:7", "repo", "refs/heads/main", "Build", "_ci",
                "20240101.1"
            ]
        );
    }

    #[test]
    fn definitions_and_stages() {
        let definition = ReleaseDefinition {
            id: 3,
            name: "deploy".to_string(),
            path: "\\".to_string(),
            release_name_format: "Release-$(rev:r)".to_string(),
            environments: vec![ReleaseDefinitionEnvironment {
                id: 5,
                name: "prod".to_string(),
                rank: 2,
                owner: IdentityRef {
                    display_name: "Ops".to_string(),
                },
                current_release: ReleaseRef { id: 9 },
                badge_url: "https://badge".to_string(),
            }],
            ..ReleaseDefinition::default()
        };

        let mut set = MetricSet::new();
        flatten_definitions(&project("p1"), &[definition], &mut set);

        let info = set.observations(RELEASE_DEFINITION_INFO.name);
        assert_eq!(
            info[0].labels,
            vec!["p1", "Project p1", "3", "Release-$(rev:r)", "deploy", "\\", ""]
        );
        let stages = set.observations(RELEASE_DEFINITION_ENVIRONMENT.name);
        assert_eq!(
            stages[0].labels,
            vec!["p1", "Project p1", "3", "5", "prod", "2", "Ops", "9", "https://badge"]
        );
    }

    #[tokio::test]
    async fn history_failure_aborts_the_cycle() {
        let registry = Registry::new();
        let api = Arc::new(FakeApi::default());
        api.set_releases("p1", vec![release(vec![environment()])]);
        let collector =
            ReleaseCollector::setup(&registry, api.clone(), Duration::from_secs(3600)).unwrap();

        let set = collector.collect(&project("p1")).await.unwrap();
        CommitTask::new("p1", collector.families().to_vec(), set).apply();
        let info = registry.family(RELEASE_INFO.name).unwrap();
        assert_eq!(info.len(), 1);

        api.fail_releases("p1");
        let err = collector.collect(&project("p1")).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::Fetch {
                call: "list release history",
                ..
            }
        ));
        // Nothing was committed, so the previous cycle is still published.
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn min_created_reaches_back_by_history() {
        let registry = Registry::new();
        let api: Arc<dyn DevOpsApi> = Arc::new(FakeApi::default());
        let collector =
            ReleaseCollector::setup(&registry, api, Duration::from_secs(48 * 3600)).unwrap();

        let age = Utc::now() - collector.min_created();
        assert!(age >= chrono::Duration::hours(47) && age <= chrono::Duration::hours(49));
    }

    #[test]
    fn setup_registers_seven_families() {
        let registry = Registry::new();
        let api: Arc<dyn DevOpsApi> = Arc::new(FakeApi::default());
        let collector = ReleaseCollector::setup(&registry, api, Duration::from_secs(60)).unwrap();
        assert_eq!(collector.families().len(), 7);
        assert_eq!(registry.families().len(), 7);
    }
}
