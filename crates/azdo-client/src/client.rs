//! HTTP implementation of [`DevOpsApi`] on top of reqwest.
//!
//! Authenticates with a personal access token (basic auth, empty user) and
//! follows `x-ms-continuationtoken` headers until a listing is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::DevOpsApi;
use crate::error::{ClientError, ClientResult};
use crate::model::{Build, ListResponse, Project, Release, ReleaseDefinition};

const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`AzureDevOpsClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Core API root, e.g. `https://dev.azure.com`.
    pub base_url: String,
    /// Release management API root, e.g. `https://vsrm.dev.azure.com`.
    pub release_url: String,
    pub organisation: String,
    pub access_token: String,
    pub api_version: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Page size for project listings.
    pub top_projects: usize,
    /// Page size for release definition listings.
    pub top_release_definitions: usize,
    /// Page size for release history listings.
    pub top_releases: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dev.azure.com".to_string(),
            release_url: "https://vsrm.dev.azure.com".to_string(),
            organisation: String::new(),
            access_token: String::new(),
            api_version: "5.1".to_string(),
            timeout: Duration::from_secs(30),
            top_projects: 100,
            top_release_definitions: 100,
            top_releases: 100,
        }
    }
}

/// Azure DevOps REST client.
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    http: Client,
    config: ClientConfig,
}

impl AzureDevOpsClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        if config.organisation.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "organisation must not be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("azdo-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn core_url(&self, path: &str) -> String {
        join_url(&self.config.base_url, &self.config.organisation, path)
    }

    fn release_url(&self, path: &str) -> String {
        join_url(&self.config.release_url, &self.config.organisation, path)
    }

    /// GET every page of a list endpoint.
    async fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> ClientResult<Vec<T>> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(url)
                .basic_auth("", Some(&self.config.access_token))
                .header("accept", "application/json")
                .query(&[("api-version", self.config.api_version.as_str())])
                .query(query);
            if let Some(token) = &continuation {
                request = request.query(&[("continuationToken", token.as_str())]);
            }

            let response = request.send().await.map_err(|source| ClientError::Http {
                url: url.to_string(),
                source,
            })?;

            let status = response.status();
            if !status.is_success() {
                let mut body = response.text().await.unwrap_or_default();
                body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
                warn!(%status, %url, "Azure DevOps API error");
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                });
            }

            let next = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let bytes = response.bytes().await.map_err(|source| ClientError::Http {
                url: url.to_string(),
                source,
            })?;
            let page: ListResponse<T> =
                serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
                    url: url.to_string(),
                    source,
                })?;

            debug!(%url, items = page.value.len(), more = next.is_some(), "fetched page");
            items.extend(page.value);

            match next {
                // A repeated token would loop forever.
                Some(token) if continuation.as_deref() != Some(token.as_str()) => {
                    continuation = Some(token);
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl DevOpsApi for AzureDevOpsClient {
    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        let url = self.core_url("_apis/projects");
        self.get_list(&url, &[("$top", self.config.top_projects.to_string())])
            .await
    }

    async fn list_latest_builds(&self, project_id: &str) -> ClientResult<Vec<Build>> {
        let url = self.core_url(&format!("{project_id}/_apis/build/builds"));
        self.get_list(
            &url,
            &[
                ("maxBuildsPerDefinition", "1".to_string()),
                ("deletedFilter", "excludeDeleted".to_string()),
            ],
        )
        .await
    }

    async fn list_release_definitions(
        &self,
        project_id: &str,
    ) -> ClientResult<Vec<ReleaseDefinition>> {
        let url = self.release_url(&format!("{project_id}/_apis/release/definitions"));
        self.get_list(
            &url,
            &[
                ("$expand", "environments".to_string()),
                ("$top", self.config.top_release_definitions.to_string()),
            ],
        )
        .await
    }

    async fn list_release_history(
        &self,
        project_id: &str,
        min_created: DateTime<Utc>,
    ) -> ClientResult<Vec<Release>> {
        let url = self.release_url(&format!("{project_id}/_apis/release/releases"));
        self.get_list(
            &url,
            &[
                (
                    "minCreatedTime",
                    min_created.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("$expand", "environments,artifacts,approvals".to_string()),
                ("$top", self.config.top_releases.to_string()),
            ],
        )
        .await
    }
}

fn join_url(root: &str, organisation: &str, path: &str) -> String {
    format!(
        "{}/{}/{}",
        root.trim_end_matches('/'),
        organisation.trim_matches('/'),
        path.trim_start_matches('/')
    )
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
