//! Scheduler that drives every collector on its own interval.
//!
//! Each collector gets a background loop. A round refreshes the project
//! list, runs one cycle per in-scope project concurrently and queues each
//! finished cycle for commit as soon as it completes. Projects that drop
//! out of scope get an empty commit queued behind their earlier ones, which
//! removes their series.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use azdo_client::{DevOpsApi, Project};
use azdo_metrics::{CommitSender, CommitTask, MetricSet};

use crate::collector::{Collector, run_cycle};

/// Which projects are in scope, matched by ID or name.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// When non-empty, only these projects are collected.
    pub include: Vec<String>,
    /// Never collected, even if listed in `include`.
    pub exclude: Vec<String>,
}

impl ProjectFilter {
    pub fn allows(&self, project: &Project) -> bool {
        let matches = |entry: &String| {
            entry.eq_ignore_ascii_case(&project.id) || entry.eq_ignore_ascii_case(&project.name)
        };

        if self.exclude.iter().any(matches) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(matches)
    }

    pub fn apply(&self, projects: Vec<Project>) -> Vec<Project> {
        projects.into_iter().filter(|p| self.allows(p)).collect()
    }
}

/// Outcome of one scheduling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub projects: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub forgotten: usize,
}

struct Job {
    collector: Arc<dyn Collector>,
    interval: Duration,
}

/// Runs collectors for every in-scope project until shutdown.
pub struct Scheduler {
    api: Arc<dyn DevOpsApi>,
    commits: CommitSender,
    filter: ProjectFilter,
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new(api: Arc<dyn DevOpsApi>, commits: CommitSender, filter: ProjectFilter) -> Self {
        Self {
            api,
            commits,
            filter,
            jobs: Vec::new(),
        }
    }

    /// Schedule a collector to run every `interval`.
    pub fn add_collector(&mut self, collector: Arc<dyn Collector>, interval: Duration) {
        self.jobs.push(Job {
            collector,
            interval,
        });
    }

    /// Run every collector loop until the shutdown signal fires.
    ///
    /// Consumes the scheduler so its commit sender is dropped on return,
    /// which lets the committer drain and stop.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(collectors = self.jobs.len(), "scheduler started");

        let mut loops = JoinSet::new();
        for job in self.jobs {
            let mut round = Round {
                collector: job.collector,
                api: self.api.clone(),
                filter: self.filter.clone(),
                commits: self.commits.clone(),
                known: HashSet::new(),
            };
            let interval = job.interval;
            let shutdown = shutdown.clone();
            loops.spawn(async move { round.run_loop(interval, shutdown).await });
        }
        drop(self.commits);

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "collector loop panicked");
            }
        }
        info!("scheduler stopped");
    }
}

/// Per-collector round state.
pub struct Round {
    collector: Arc<dyn Collector>,
    api: Arc<dyn DevOpsApi>,
    filter: ProjectFilter,
    commits: CommitSender,
    /// Projects collected in the previous round.
    known: HashSet<String>,
}

impl Round {
    pub fn new(
        collector: Arc<dyn Collector>,
        api: Arc<dyn DevOpsApi>,
        filter: ProjectFilter,
        commits: CommitSender,
    ) -> Self {
        Self {
            collector,
            api,
            filter,
            commits,
            known: HashSet::new(),
        }
    }

    async fn run_loop(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let name = self.collector.name();
        info!(collector = name, interval_secs = interval.as_secs(), "collector loop started");

        loop {
            // Dropping an in-flight round aborts its cycles; none of them
            // has queued anything yet.
            tokio::select! {
                summary = self.run_once() => {
                    debug!(collector = name, ?summary, "round finished");
                }
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(collector = name, "collector loop shutting down");
    }

    /// Discover projects and run one cycle for each of them.
    pub async fn run_once(&mut self) -> RoundSummary {
        let name = self.collector.name();
        let mut summary = RoundSummary::default();

        let projects = match self.api.list_projects().await {
            Ok(projects) => self.filter.apply(projects),
            Err(e) => {
                error!(collector = name, error = %e, "project discovery failed, skipping round");
                return summary;
            }
        };
        summary.projects = projects.len();

        let current: HashSet<String> = projects.iter().map(|p| p.id.clone()).collect();
        let departed: Vec<String> = self.known.difference(&current).cloned().collect();
        self.known = current;

        for gone in departed {
            info!(collector = name, project_id = %gone, "project left scope, removing its series");
            let task = CommitTask::new(gone, self.collector.families().to_vec(), MetricSet::new());
            match self.commits.submit(task).await {
                Ok(()) => summary.forgotten += 1,
                Err(e) => error!(collector = name, error = %e, "could not queue series removal"),
            }
        }

        let mut cycles = JoinSet::new();
        for project in projects {
            let collector = self.collector.clone();
            let commits = self.commits.clone();
            cycles.spawn(async move { run_cycle(collector.as_ref(), &project, &commits).await });
        }

        while let Some(result) = cycles.join_next().await {
            match result {
                Ok(Ok(_)) => summary.succeeded += 1,
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    warn!(collector = name, error = %e, "collection cycle panicked");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
