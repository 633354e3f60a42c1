//! Resource records returned by the Azure DevOps REST API.
//!
//! Only the fields the exporter publishes are modelled; everything else in
//! the payloads is ignored. Upstream sends `null` for many optional objects
//! and strings, so those fields fall back to their defaults instead of
//! failing the whole response.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Envelope of every list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

// ── Shared references ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRef {
    #[serde(deserialize_with = "nullable")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Link {
    #[serde(deserialize_with = "nullable")]
    pub href: String,
}

/// The `_links` object; only the web UI link is published.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Links {
    #[serde(deserialize_with = "nullable")]
    pub web: Link,
}

/// A `{ "id": ..., "name": ... }` reference where only the name matters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

// ── Projects ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

// ── Builds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildDefinitionRef {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentPoolRef {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentQueueRef {
    #[serde(deserialize_with = "nullable")]
    pub pool: AgentPoolRef,
}

/// A build, as returned by `_apis/build/builds`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Build {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub build_number: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    /// Empty while the build is still running.
    #[serde(deserialize_with = "nullable")]
    pub result: String,
    #[serde(deserialize_with = "nullable")]
    pub reason: String,
    #[serde(deserialize_with = "nullable")]
    pub source_branch: String,
    #[serde(deserialize_with = "nullable")]
    pub source_version: String,
    #[serde(deserialize_with = "timestamp")]
    pub queue_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub definition: BuildDefinitionRef,
    #[serde(deserialize_with = "nullable")]
    pub queue: AgentQueueRef,
    #[serde(deserialize_with = "nullable")]
    pub requested_by: IdentityRef,
    #[serde(rename = "_links", deserialize_with = "nullable")]
    pub links: Links,
}

// ── Release definitions ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReleaseRef {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseDefinitionEnvironment {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub rank: i64,
    #[serde(deserialize_with = "nullable")]
    pub owner: IdentityRef,
    /// The release currently deployed to this stage; id 0 when none.
    #[serde(deserialize_with = "nullable")]
    pub current_release: ReleaseRef,
    #[serde(deserialize_with = "nullable")]
    pub badge_url: String,
}

/// A release pipeline definition with its stages embedded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseDefinition {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub path: String,
    #[serde(deserialize_with = "nullable")]
    pub release_name_format: String,
    #[serde(rename = "_links", deserialize_with = "nullable")]
    pub links: Links,
    #[serde(deserialize_with = "nullable")]
    pub environments: Vec<ReleaseDefinitionEnvironment>,
}

// ── Releases ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReleaseDefinitionRef {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArtifactDefinitionReference {
    #[serde(deserialize_with = "nullable")]
    pub repository: NamedRef,
    #[serde(deserialize_with = "nullable")]
    pub branch: NamedRef,
    #[serde(deserialize_with = "nullable")]
    pub version: NamedRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseArtifact {
    #[serde(deserialize_with = "nullable")]
    pub source_id: String,
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub alias: String,
    #[serde(deserialize_with = "nullable")]
    pub definition_reference: ArtifactDefinitionReference,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Approval {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub approval_type: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub is_automated: bool,
    #[serde(deserialize_with = "nullable")]
    pub trial_number: i64,
    #[serde(deserialize_with = "nullable")]
    pub attempt: i64,
    #[serde(deserialize_with = "nullable")]
    pub rank: i64,
    #[serde(deserialize_with = "nullable")]
    pub approver: IdentityRef,
    #[serde(deserialize_with = "nullable")]
    pub approved_by: IdentityRef,
    #[serde(deserialize_with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseEnvironment {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub definition_environment_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub trigger_reason: String,
    #[serde(deserialize_with = "nullable")]
    pub rank: i64,
    #[serde(deserialize_with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    /// Minutes; zero when the stage was never deployed.
    #[serde(deserialize_with = "nullable")]
    pub time_to_deploy: f64,
    #[serde(deserialize_with = "nullable")]
    pub pre_deploy_approvals: Vec<Approval>,
    #[serde(deserialize_with = "nullable")]
    pub post_deploy_approvals: Vec<Approval>,
}

/// A release with environments, artifacts and approvals expanded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Release {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub reason: String,
    #[serde(deserialize_with = "nullable")]
    pub result: bool,
    #[serde(deserialize_with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(rename = "releaseDefinition", alias = "definition", deserialize_with = "nullable")]
    pub definition: ReleaseDefinitionRef,
    #[serde(deserialize_with = "nullable")]
    pub requested_by: IdentityRef,
    #[serde(rename = "_links", deserialize_with = "nullable")]
    pub links: Links,
    #[serde(deserialize_with = "nullable")]
    pub environments: Vec<ReleaseEnvironment>,
    #[serde(deserialize_with = "nullable")]
    pub artifacts: Vec<ReleaseArtifact>,
}

// ── Deserialization helpers ────────────────────────────────────────

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an upstream timestamp, mapping the unset sentinel to `None`.
fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Parse an Azure DevOps timestamp.
///
/// Accepts RFC 3339 and the offset-less form upstream uses for its zero
/// value (`0001-01-01T00:00:00`). Anything at or before the Unix epoch, or
/// anything unparseable, counts as unset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .ok()?;
    (parsed.timestamp() > 0).then_some(parsed)
}
