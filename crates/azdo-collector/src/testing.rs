//! In-memory stand-in for the Azure DevOps API, shared by unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use azdo_client::{
    Build, ClientError, ClientResult, DevOpsApi, Project, Release, ReleaseDefinition,
};

pub fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {id}"),
    }
}

pub fn at(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn unavailable(call: &str) -> ClientError {
    ClientError::Status {
        status: 503,
        url: format!("fake://{call}"),
        body: "unavailable".to_string(),
    }
}

#[derive(Default)]
struct State {
    projects: Vec<Project>,
    projects_fail: bool,
    builds: HashMap<String, Vec<Build>>,
    definitions: HashMap<String, Vec<ReleaseDefinition>>,
    releases: HashMap<String, Vec<Release>>,
    failing: HashSet<(&'static str, String)>,
}

/// Scripted responses keyed by project ID.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn set_projects(&self, projects: Vec<Project>) {
        self.state.lock().projects = projects;
    }

    pub fn fail_projects(&self, fail: bool) {
        self.state.lock().projects_fail = fail;
    }

    pub fn set_builds(&self, project_id: &str, builds: Vec<Build>) {
        let mut state = self.state.lock();
        state.failing.remove(&("builds", project_id.to_string()));
        state.builds.insert(project_id.to_string(), builds);
    }

    pub fn fail_builds(&self, project_id: &str) {
        self.state.lock().failing.insert(("builds", project_id.to_string()));
    }

    pub fn set_definitions(&self, project_id: &str, definitions: Vec<ReleaseDefinition>) {
        self.state
            .lock()
            .definitions
            .insert(project_id.to_string(), definitions);
    }

    pub fn set_releases(&self, project_id: &str, releases: Vec<Release>) {
        let mut state = self.state.lock();
        state.failing.remove(&("releases", project_id.to_string()));
        state.releases.insert(project_id.to_string(), releases);
    }

    pub fn fail_releases(&self, project_id: &str) {
        self.state
            .lock()
            .failing
            .insert(("releases", project_id.to_string()));
    }

    fn check(&self, call: &'static str, project_id: &str) -> ClientResult<()> {
        if self
            .state
            .lock()
            .failing
            .contains(&(call, project_id.to_string()))
        {
            return Err(unavailable(call));
        }
        Ok(())
    }
}

#[async_trait]
impl DevOpsApi for FakeApi {
    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        let state = self.state.lock();
        if state.projects_fail {
            return Err(unavailable("projects"));
        }
        Ok(state.projects.clone())
    }

    async fn list_latest_builds(&self, project_id: &str) -> ClientResult<Vec<Build>> {
        self.check("builds", project_id)?;
        Ok(self
            .state
            .lock()
            .builds
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_release_definitions(
        &self,
        project_id: &str,
    ) -> ClientResult<Vec<ReleaseDefinition>> {
        Ok(self
            .state
            .lock()
            .definitions
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_release_history(
        &self,
        project_id: &str,
        _min_created: DateTime<Utc>,
    ) -> ClientResult<Vec<Release>> {
        self.check("releases", project_id)?;
        Ok(self
            .state
            .lock()
            .releases
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }
}
