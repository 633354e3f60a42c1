//! Commit protocol: the single-writer handoff from cycles to the registry.
//!
//! Collection cycles build their [`MetricSet`] in private memory and queue
//! a [`CommitTask`]. One [`Committer`] drains the queue strictly in arrival
//! order, so no two commits ever run for the same family at once and a
//! cycle that never queues a task leaves the registry untouched.
//!
//! A task carries the generation of each family it owns, read when the
//! cycle started. Families reset since then ignore the task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CommitError;
use crate::metric_set::MetricSet;
use crate::registry::Family;

/// Generations of a cycle's families, taken before it starts fetching.
#[derive(Debug, Clone)]
pub struct Stamp(Vec<(Arc<Family>, u64)>);

impl Stamp {
    pub fn now(families: &[Arc<Family>]) -> Self {
        Self(
            families
                .iter()
                .map(|family| (family.clone(), family.generation()))
                .collect(),
        )
    }
}

/// The finished result of one cycle for one project.
#[derive(Debug)]
pub struct CommitTask {
    partition: String,
    stamp: Stamp,
    set: MetricSet,
}

impl CommitTask {
    /// `families` are every family the cycle owns, including ones it left
    /// empty: committing an empty family removes the partition's series.
    /// Generations are read now; use [`CommitTask::stamped`] to read them
    /// earlier.
    pub fn new(partition: impl Into<String>, families: Vec<Arc<Family>>, set: MetricSet) -> Self {
        Self::stamped(partition, Stamp::now(&families), set)
    }

    pub fn stamped(partition: impl Into<String>, stamp: Stamp, set: MetricSet) -> Self {
        Self {
            partition: partition.into(),
            stamp,
            set,
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Replace the partition in every owned family that has not been reset
    /// since the stamp. Returns the number of series published.
    pub fn apply(mut self) -> usize {
        let mut published = 0;
        for (family, generation) in &self.stamp.0 {
            let observations = self.set.take(family.name());
            published += family
                .replace_since(*generation, &self.partition, observations)
                .unwrap_or(0);
        }

        for orphan in self.set.family_names() {
            warn!(
                family = orphan,
                partition = %self.partition,
                "observations for a family the task does not own were discarded"
            );
        }
        published
    }
}

/// Producer side of the commit queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommitSender {
    tx: mpsc::Sender<CommitTask>,
}

impl CommitSender {
    /// Queue a task, waiting while the queue is full.
    pub async fn submit(&self, task: CommitTask) -> Result<(), CommitError> {
        self.tx.send(task).await.map_err(|_| CommitError::QueueClosed)
    }
}

/// The single consumer that applies commit tasks.
#[derive(Debug)]
pub struct Committer {
    rx: mpsc::Receiver<CommitTask>,
}

/// Create a bounded commit queue.
pub fn commit_queue(capacity: usize) -> (CommitSender, Committer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommitSender { tx }, Committer { rx })
}

impl Committer {
    /// Apply tasks until every sender has been dropped.
    pub async fn run(mut self) {
        info!("committer started");
        while let Some(task) = self.rx.recv().await {
            let partition = task.partition.clone();
            let published = task.apply();
            debug!(%partition, series = published, "commit applied");
        }
        info!("committer stopped");
    }

    /// Apply whatever is queued right now without waiting.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(task) = self.rx.try_recv() {
            task.apply();
            applied += 1;
        }
        applied
    }
}
