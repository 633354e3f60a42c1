//! Per-cycle observation buffer.
//!
//! A `MetricSet` is owned by exactly one collection cycle. Nothing in it is
//! visible to scrapes until it is committed into the registry.

use std::collections::HashMap;

use crate::flatten::Observation;

/// Observations of one cycle, grouped by family.
///
/// Label tuples are not checked for uniqueness here; duplicates survive
/// until commit, where the last one wins.
#[derive(Debug, Default)]
pub struct MetricSet {
    families: HashMap<&'static str, Vec<Observation>>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one observation.
    pub fn add(&mut self, observation: Observation) {
        self.families
            .entry(observation.family)
            .or_default()
            .push(observation);
    }

    /// Buffered observations for a family, in insertion order.
    pub fn observations(&self, family: &str) -> &[Observation] {
        self.families.get(family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove and return a family's observations.
    pub fn take(&mut self, family: &str) -> Vec<Observation> {
        self.families.remove(family).unwrap_or_default()
    }

    /// Families that still hold observations.
    pub fn family_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.families.keys().copied()
    }

    /// Total number of buffered observations.
    pub fn len(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.values().all(Vec::is_empty)
    }
}

impl Extend<Observation> for MetricSet {
    fn extend<I: IntoIterator<Item = Observation>>(&mut self, iter: I) {
        for observation in iter {
            self.add(observation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(family: &'static str, id: &str, value: f64) -> Observation {
        Observation {
            family,
            labels: vec![id.to_string()],
            value,
        }
    }

    #[test]
    fn groups_by_family() {
        let mut set = MetricSet::new();
        set.add(obs("a", "1", 1.0));
        set.add(obs("b", "1", 2.0));
        set.add(obs("a", "2", 3.0));

        assert_eq!(set.len(), 3);
        assert_eq!(set.observations("a").len(), 2);
        assert_eq!(set.observations("b").len(), 1);
        assert!(set.observations("c").is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        let mut set = MetricSet::new();
        set.add(obs("a", "1", 1.0));
        set.add(obs("a", "1", 2.0));
        assert_eq!(set.observations("a").len(), 2);
    }

    #[test]
    fn extend_skips_absent_options() {
        let mut set = MetricSet::new();
        set.extend(None::<Observation>);
        set.extend(Some(obs("a", "1", 1.0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn take_drains_family() {
        let mut set = MetricSet::new();
        set.add(obs("a", "1", 1.0));
        assert_eq!(set.take("a").len(), 1);
        assert!(set.is_empty());
        assert!(set.take("a").is_empty());
    }
}
