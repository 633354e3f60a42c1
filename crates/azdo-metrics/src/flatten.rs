//! Record flattening: pure mapping from records to observations.
//!
//! Every helper resolves the family schema against a [`LabelSource`] and
//! attaches one numeric value. Fields that are unset or not applicable
//! produce no observation at all rather than a misleading zero.

use chrono::{DateTime, Utc};

use crate::labels::{FamilySchema, LabelSource, LabelValues};

/// A candidate series produced during flattening, not yet published.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub family: &'static str,
    pub labels: LabelValues,
    pub value: f64,
}

/// Build an observation with an explicit value.
pub fn observe<S: LabelSource + ?Sized>(
    schema: &FamilySchema,
    source: &S,
    value: f64,
) -> Observation {
    Observation {
        family: schema.name,
        labels: schema.resolve(source),
        value,
    }
}

/// Descriptive series with value `1`.
pub fn info<S: LabelSource + ?Sized>(schema: &FamilySchema, source: &S) -> Observation {
    observe(schema, source, 1.0)
}

/// Seconds since the Unix epoch of `at`.
///
/// Unset timestamps and anything at or before the epoch yield nothing.
pub fn timestamp<S: LabelSource + ?Sized>(
    schema: &FamilySchema,
    source: &S,
    at: Option<DateTime<Utc>>,
) -> Option<Observation> {
    let secs = epoch_seconds(at?);
    (secs > 0.0).then(|| observe(schema, source, secs))
}

/// `end - start` in seconds, only when both ends are set.
///
/// The difference is never clamped: inconsistent upstream data yields a
/// negative duration.
pub fn duration<S: LabelSource + ?Sized>(
    schema: &FamilySchema,
    source: &S,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<Observation> {
    let start = epoch_seconds(start?);
    let end = epoch_seconds(end?);
    if start <= 0.0 || end <= 0.0 {
        return None;
    }
    Some(observe(schema, source, end - start))
}

/// `1` when the predicate holds, `0` otherwise.
pub fn boolean<S: LabelSource + ?Sized>(
    schema: &FamilySchema,
    source: &S,
    predicate: bool,
) -> Observation {
    observe(schema, source, if predicate { 1.0 } else { 0.0 })
}

/// Numeric series for fields where zero means "not applicable".
pub fn non_zero<S: LabelSource + ?Sized>(
    schema: &FamilySchema,
    source: &S,
    value: f64,
) -> Option<Observation> {
    (value != 0.0).then(|| observe(schema, source, value))
}

/// Fractional seconds since the Unix epoch.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Render a boolean the way label values expect it.
pub fn bool_label(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}
