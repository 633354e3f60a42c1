//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use azdo_client::ClientConfig;
use azdo_collector::ProjectFilter;

#[derive(Debug, Parser)]
#[command(name = "azdo-exporterd", about = "Azure DevOps Prometheus exporter", version)]
pub struct Cli {
    /// Address the metrics server listens on.
    #[arg(long, env = "SERVER_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Azure DevOps core API root.
    #[arg(long = "azure-devops-url", env = "AZURE_DEVOPS_URL", default_value = "https://dev.azure.com")]
    pub url: String,

    /// Azure DevOps release management API root.
    #[arg(
        long = "azure-devops-release-url",
        env = "AZURE_DEVOPS_RELEASE_URL",
        default_value = "https://vsrm.dev.azure.com"
    )]
    pub release_url: String,

    #[arg(long = "azure-devops-organisation", env = "AZURE_DEVOPS_ORGANISATION")]
    pub organisation: String,

    /// Personal access token.
    #[arg(
        long = "azure-devops-access-token",
        env = "AZURE_DEVOPS_ACCESS_TOKEN",
        hide_env_values = true
    )]
    pub access_token: String,

    #[arg(long = "azure-devops-api-version", env = "AZURE_DEVOPS_API_VERSION", default_value = "5.1")]
    pub api_version: String,

    /// Timeout for a single upstream request.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// Default collection interval.
    #[arg(long, env = "SCRAPE_TIME", default_value = "30m", value_parser = parse_duration)]
    pub scrape_time: Duration,

    /// Collection interval for latest builds (defaults to --scrape-time).
    #[arg(long, env = "SCRAPE_TIME_BUILDS", value_parser = parse_duration)]
    pub scrape_time_builds: Option<Duration>,

    /// Collection interval for releases (defaults to --scrape-time).
    #[arg(long, env = "SCRAPE_TIME_RELEASES", value_parser = parse_duration)]
    pub scrape_time_releases: Option<Duration>,

    /// How far back the release history reaches.
    #[arg(
        long = "limit-release-history-duration",
        env = "LIMIT_RELEASE_HISTORY_DURATION",
        default_value = "48h",
        value_parser = parse_duration
    )]
    pub release_history: Duration,

    /// Page size for release definition listings.
    #[arg(long = "limit-release-definitions", env = "LIMIT_RELEASE_DEFINITION_PER_PROJECT", default_value = "100")]
    pub top_release_definitions: usize,

    /// Page size for release history listings.
    #[arg(long = "limit-releases", env = "LIMIT_RELEASES_PER_PROJECT", default_value = "100")]
    pub top_releases: usize,

    /// Only collect these projects (ID or name).
    #[arg(long, env = "AZURE_DEVOPS_FILTER_PROJECTS", value_delimiter = ' ')]
    pub project_filter: Vec<String>,

    /// Never collect these projects (ID or name).
    #[arg(long, env = "AZURE_DEVOPS_BLACKLIST_PROJECTS", value_delimiter = ' ')]
    pub project_blacklist: Vec<String>,

    /// Capacity of the commit queue.
    #[arg(long, env = "COMMIT_QUEUE", default_value = "64")]
    pub commit_queue: usize,

    /// Emit logs as JSON.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            release_url: self.release_url.clone(),
            organisation: self.organisation.clone(),
            access_token: self.access_token.clone(),
            api_version: self.api_version.clone(),
            timeout: self.request_timeout,
            top_release_definitions: self.top_release_definitions,
            top_releases: self.top_releases,
            ..ClientConfig::default()
        }
    }

    pub fn project_filter(&self) -> ProjectFilter {
        ProjectFilter {
            include: non_empty(&self.project_filter),
            exclude: non_empty(&self.project_blacklist),
        }
    }

    pub fn builds_interval(&self) -> Duration {
        self.scrape_time_builds.unwrap_or(self.scrape_time)
    }

    pub fn releases_interval(&self) -> Duration {
        self.scrape_time_releases.unwrap_or(self.scrape_time)
    }
}

fn non_empty(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a duration string like "30s", "500ms", "5m", "2h", "1d" or plain
/// seconds. Zero is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>().ok().map(|d| Duration::from_secs(d * 86_400))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };

    parsed
        .filter(|d| !d.is_zero())
        .ok_or_else(|| format!("invalid duration: {s:?}"))
}
