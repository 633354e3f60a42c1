//! Prometheus text exposition format.
//!
//! Renders registry families into the text format scraped by a Prometheus
//! server or compatible agent.

use std::fmt::Write;

use crate::labels::{FamilySchema, LabelValues};

/// Content type served alongside the rendered text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Append one gauge family: help + type declarations, then one line per series.
pub fn write_family<'a>(
    out: &mut String,
    schema: &FamilySchema,
    series: impl Iterator<Item = (&'a LabelValues, &'a f64)>,
) {
    let _ = writeln!(out, "# HELP {} {}", schema.name, escape_help(schema.help));
    let _ = writeln!(out, "# TYPE {} gauge", schema.name);

    for (labels, value) in series {
        out.push_str(schema.name);
        if !schema.labels.is_empty() {
            out.push('{');
            for (i, (name, value)) in schema.labels.iter().zip(labels).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
            }
            out.push('}');
        }
        let _ = writeln!(out, " {}", format_value(*value));
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}
