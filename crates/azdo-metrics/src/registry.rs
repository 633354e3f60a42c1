//! The externally visible store of gauge families.
//!
//! Families are registered once at startup and live for the whole process.
//! Each family's series are partitioned by the project that produced them,
//! so one project's commit never disturbs another project's series.
//!
//! All mutation goes through a family's write lock and is a single swap of
//! already-built state; a scrape holds the read lock while rendering, so it
//! sees either the previous cycle or the new one, never a mix.
//!
//! Every reset bumps the family's generation. A commit stamped with an older
//! generation is discarded, so work queued before a reset never reappears.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::flatten::Observation;
use crate::labels::{FamilySchema, LabelValues};
use crate::prometheus;

type Partition = BTreeMap<LabelValues, f64>;

/// One published series.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: LabelValues,
    pub value: f64,
}

#[derive(Debug, Default)]
struct FamilyState {
    generation: u64,
    /// partition key (project ID) → label values → value.
    partitions: BTreeMap<String, Partition>,
}

/// A registered gauge family.
#[derive(Debug)]
pub struct Family {
    schema: FamilySchema,
    state: RwLock<FamilyState>,
}

impl Family {
    fn new(schema: FamilySchema) -> Self {
        Self {
            schema,
            state: RwLock::new(FamilyState::default()),
        }
    }

    pub fn schema(&self) -> &FamilySchema {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Current generation; bumped by every [`Family::reset`].
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Replace every series of `partition` with `observations`.
    ///
    /// Series of the partition missing from `observations` are deleted.
    /// Duplicate label tuples resolve last-write-wins. Returns the number of
    /// series now published for the partition.
    pub fn replace(&self, partition: &str, observations: Vec<Observation>) -> usize {
        let next = self.build_partition(observations);
        let count = next.len();
        Self::install(&mut self.state.write(), partition, next);
        debug!(family = self.schema.name, %partition, series = count, "family committed");
        count
    }

    /// Like [`Family::replace`], but only if the family has not been reset
    /// since `generation` was read. Returns `None` when the commit is stale.
    pub fn replace_since(
        &self,
        generation: u64,
        partition: &str,
        observations: Vec<Observation>,
    ) -> Option<usize> {
        let next = self.build_partition(observations);
        let count = next.len();
        {
            let mut state = self.state.write();
            if state.generation != generation {
                debug!(
                    family = self.schema.name,
                    %partition,
                    stale = generation,
                    current = state.generation,
                    "discarding commit queued before a reset"
                );
                return None;
            }
            Self::install(&mut state, partition, next);
        }
        debug!(family = self.schema.name, %partition, series = count, "family committed");
        Some(count)
    }

    fn build_partition(&self, observations: Vec<Observation>) -> Partition {
        let mut next = Partition::new();
        for obs in observations {
            if obs.family != self.schema.name || obs.labels.len() != self.schema.labels.len() {
                warn!(
                    family = self.schema.name,
                    observed = obs.family,
                    labels = obs.labels.len(),
                    "dropping observation that does not match family schema"
                );
                continue;
            }
            next.insert(obs.labels, obs.value);
        }
        next
    }

    fn install(state: &mut FamilyState, partition: &str, next: Partition) {
        if next.is_empty() {
            state.partitions.remove(partition);
        } else {
            state.partitions.insert(partition.to_string(), next);
        }
    }

    /// Drop every series of the family and invalidate commits stamped
    /// before now.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.partitions.clear();
        state.generation += 1;
    }

    /// Current value of the series with exactly these label values.
    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let state = self.state.read();
        state.partitions.values().find_map(|partition| {
            partition
                .iter()
                .find(|(key, _)| key.iter().map(String::as_str).eq(labels.iter().copied()))
                .map(|(_, value)| *value)
        })
    }

    /// Snapshot of every published series, ordered by partition then labels.
    pub fn series(&self) -> Vec<Series> {
        let state = self.state.read();
        state
            .partitions
            .values()
            .flat_map(|partition| partition.iter())
            .map(|(labels, value)| Series {
                labels: labels.clone(),
                value: *value,
            })
            .collect()
    }

    /// Number of published series.
    pub fn len(&self) -> usize {
        self.state.read().partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append this family in text exposition format.
    pub fn render_into(&self, out: &mut String) {
        let state = self.state.read();
        let series = state.partitions.values().flat_map(|partition| partition.iter());
        prometheus::write_family(out, &self.schema, series);
    }
}

/// Process-wide store of gauge families.
///
/// Owned explicitly (usually behind an `Arc`) and handed to collectors and
/// the HTTP server.
#[derive(Debug, Default)]
pub struct Registry {
    families: RwLock<Vec<Arc<Family>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family. Names are unique across the registry.
    pub fn register(&self, schema: FamilySchema) -> Result<Arc<Family>, RegistryError> {
        schema.validate()?;

        let mut families = self.families.write();
        if families.iter().any(|f| f.name() == schema.name) {
            return Err(RegistryError::AlreadyRegistered(schema.name.to_string()));
        }

        let family = Arc::new(Family::new(schema));
        families.push(family.clone());
        debug!(family = schema.name, labels = schema.labels.len(), "family registered");
        Ok(family)
    }

    /// Look up a registered family by name.
    pub fn family(&self, name: &str) -> Option<Arc<Family>> {
        self.families.read().iter().find(|f| f.name() == name).cloned()
    }

    /// All families in registration order.
    pub fn families(&self) -> Vec<Arc<Family>> {
        self.families.read().clone()
    }

    /// Render every family in text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for family in self.families() {
            family.render_into(&mut out);
        }
        out
    }
}
