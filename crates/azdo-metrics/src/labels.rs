//! Family schemas and label resolution.
//!
//! A [`FamilySchema`] lists a family's label names in wire order. Records
//! answer label lookups through [`LabelSource`]; sources compose through
//! tuples so nested elements carry their parents' identifying labels.

use crate::error::RegistryError;

/// Label values ordered exactly like the schema's label names.
pub type LabelValues = Vec<String>;

/// Declared shape of one published gauge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySchema {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl FamilySchema {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }

    /// Resolve the schema's labels against a source.
    ///
    /// Labels the source does not know render as the empty string.
    pub fn resolve<S: LabelSource + ?Sized>(&self, source: &S) -> LabelValues {
        self.labels
            .iter()
            .map(|name| source.label(name).unwrap_or_default())
            .collect()
    }

    /// Check the family and label names against the exposition grammar.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !is_metric_name(self.name) {
            return Err(RegistryError::InvalidName(self.name.to_string()));
        }

        for (i, label) in self.labels.iter().enumerate() {
            if !is_label_name(label) || self.labels[..i].contains(label) {
                return Err(RegistryError::InvalidLabel {
                    family: self.name.to_string(),
                    label: label.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Something that can answer label lookups by name.
pub trait LabelSource {
    fn label(&self, name: &str) -> Option<String>;
}

impl<T: LabelSource + ?Sized> LabelSource for &T {
    fn label(&self, name: &str) -> Option<String> {
        (**self).label(name)
    }
}

impl<A: LabelSource, B: LabelSource> LabelSource for (A, B) {
    fn label(&self, name: &str) -> Option<String> {
        self.0.label(name).or_else(|| self.1.label(name))
    }
}

impl<A: LabelSource, B: LabelSource, C: LabelSource> LabelSource for (A, B, C) {
    fn label(&self, name: &str) -> Option<String> {
        self.0
            .label(name)
            .or_else(|| self.1.label(name))
            .or_else(|| self.2.label(name))
    }
}

impl LabelSource for [(&str, &str)] {
    fn label(&self, name: &str) -> Option<String> {
        self.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

impl<const N: usize> LabelSource for [(&str, &str); N] {
    fn label(&self, name: &str) -> Option<String> {
        self.as_slice().label(name)
    }
}

/// Adds the `type` label that status families use to tell series apart.
#[derive(Debug, Clone, Copy)]
pub struct Typed<S> {
    pub inner: S,
    pub kind: &'static str,
}

impl<S> Typed<S> {
    pub fn new(inner: S, kind: &'static str) -> Self {
        Self { inner, kind }
    }
}

impl<S: LabelSource> LabelSource for Typed<S> {
    fn label(&self, name: &str) -> Option<String> {
        if name == "type" {
            Some(self.kind.to_string())
        } else {
            self.inner.label(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: FamilySchema =
        FamilySchema::new("test_status", "Test status", &["projectID", "buildID", "type"]);

    #[test]
    fn resolve_follows_schema_order() {
        let source = [("buildID", "42"), ("projectID", "p1")];
        let values = SCHEMA.resolve(&Typed::new(&source, "started"));
        assert_eq!(values, vec!["p1", "42", "started"]);
    }

    #[test]
    fn resolve_missing_label_is_empty() {
        let source = [("projectID", "p1")];
        let values = SCHEMA.resolve(&source);
        assert_eq!(values, vec!["p1", "", ""]);
    }

    #[test]
    fn tuple_sources_prefer_the_first() {
        let parent = [("projectID", "parent"), ("buildID", "1")];
        let child = [("projectID", "child")];
        let values = SCHEMA.resolve(&(&child, &parent));
        assert_eq!(values, vec!["child", "1", ""]);
    }

    #[test]
    fn validate_accepts_wire_names() {
        assert!(SCHEMA.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_family_name() {
        let schema = FamilySchema::new("9lives", "", &[]);
        assert_eq!(
            schema.validate(),
            Err(RegistryError::InvalidName("9lives".to_string()))
        );
    }

    #[test]
    fn validate_rejects_duplicate_label() {
        let schema = FamilySchema::new("dup", "", &["a", "a"]);
        assert!(matches!(
            schema.validate(),
            Err(RegistryError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn validate_rejects_reserved_label() {
        let schema = FamilySchema::new("reserved", "", &["__name__"]);
        assert!(schema.validate().is_err());
    }
}
