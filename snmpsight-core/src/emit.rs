//! Sample-to-family emission.
//!
//! The emitter groups samples into metric families in first-seen order
//! and enforces the exposition invariants: legal metric and label names,
//! unique label names within a sample. Violations drop the sample with a
//! warning rather than emitting a series Prometheus would reject.

use std::collections::HashMap;

use tracing::warn;

use snmpsight_common::{MetricFamily, Sample};

/// Accumulates one scrape's samples into families.
#[derive(Debug, Default)]
pub struct Emitter {
    families: Vec<MetricFamily>,
    by_name: HashMap<String, usize>,
    dropped: u64,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample to its family, creating the family on first sight.
    pub fn add(&mut self, sample: Sample, help: &str) {
        if !is_valid_metric_name(&sample.name) {
            warn!(metric = %sample.name, "illegal metric name, dropping sample");
            self.dropped += 1;
            return;
        }
        for (name, _) in &sample.labels {
            if !is_valid_label_name(name) {
                warn!(metric = %sample.name, label = %name, "illegal label name, dropping sample");
                self.dropped += 1;
                return;
            }
        }
        if has_duplicate_labels(&sample) {
            warn!(metric = %sample.name, "duplicate label name, dropping sample");
            self.dropped += 1;
            return;
        }

        let idx = match self.by_name.get(&sample.name) {
            Some(&idx) => idx,
            None => {
                self.families
                    .push(MetricFamily::new(sample.name.clone(), help, sample.kind));
                self.by_name
                    .insert(sample.name.clone(), self.families.len() - 1);
                self.families.len() - 1
            }
        };
        self.families[idx].samples.push(sample);
    }

    /// Finish the scrape: families in first-seen order plus the number of
    /// samples dropped by validation.
    pub fn finish(self) -> (Vec<MetricFamily>, u64) {
        (self.families, self.dropped)
    }
}

/// Prometheus metric names: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Prometheus label names: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn has_duplicate_labels(sample: &Sample) -> bool {
    for (i, (name, _)) in sample.labels.iter().enumerate() {
        if sample.labels[i + 1..].iter().any(|(other, _)| other == name) {
            return true;
        }
    }
    false
}
