//! azdo-exporterd — exports Azure DevOps build and release state as
//! Prometheus gauges.
//!
//! # Usage
//!
//! ```text
//! AZURE_DEVOPS_ACCESS_TOKEN=... azdo-exporterd \
//!     --azure-devops-organisation contoso --scrape-time 5m
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use azdo_client::{AzureDevOpsClient, DevOpsApi};
use azdo_collector::{BuildCollector, ReleaseCollector, Scheduler};
use azdo_exporterd::{Cli, build_router};
use azdo_metrics::{Registry, commit_queue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run(cli).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,azdo_exporterd=debug,azdo_collector=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(organisation = %cli.organisation, "azdo-exporter starting");

    // ── Upstream client ────────────────────────────────────────

    let api: Arc<dyn DevOpsApi> = Arc::new(AzureDevOpsClient::new(cli.client_config())?);

    // ── Registry and collectors ────────────────────────────────

    let registry = Arc::new(Registry::new());
    let builds = Arc::new(BuildCollector::setup(&registry, api.clone())?);
    let releases = Arc::new(ReleaseCollector::setup(
        &registry,
        api.clone(),
        cli.release_history,
    )?);
    info!(families = registry.families().len(), "metric families registered");

    let (commits, committer) = commit_queue(cli.commit_queue);

    let mut scheduler = Scheduler::new(api, commits, cli.project_filter());
    scheduler.add_collector(builds, cli.builds_interval());
    scheduler.add_collector(releases, cli.releases_interval());

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let committer_handle = tokio::spawn(committer.run());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // ── Scrape endpoint ────────────────────────────────────────

    let router = build_router(registry);
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(addr = %cli.bind, "metrics server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for CTRL+C, shutting down");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // The scheduler drops the last commit sender on return, which lets the
    // committer drain and stop.
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task panicked");
    }
    if let Err(e) = committer_handle.await {
        error!(error = %e, "committer task panicked");
    }

    info!("azdo-exporter stopped");
    Ok(())
}
