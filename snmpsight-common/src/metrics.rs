use serde::{Deserialize, Serialize};

/// The exposition kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Value can go up or down.
    Gauge,
    /// Monotonically increasing value.
    Counter,
    /// No type information available.
    Untyped,
    /// Value is always 1.0; the information lives in a label.
    Info,
}

impl SampleKind {
    /// The TYPE comment string for the Prometheus text format.
    ///
    /// Info has no native text-format type and is exposed as a gauge.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Gauge => "gauge",
            SampleKind::Counter => "counter",
            SampleKind::Untyped => "untyped",
            SampleKind::Info => "gauge",
        }
    }
}

/// A single labelled measurement produced by one scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric name (family the sample belongs to).
    pub name: String,

    /// Label key-value pairs, in emission order.
    pub labels: Vec<(String, String)>,

    /// The measured value. Info samples carry 1.0.
    pub value: f64,

    /// Exposition kind.
    pub kind: SampleKind,
}

impl Sample {
    /// Create a sample with no labels.
    pub fn new(name: impl Into<String>, value: f64, kind: SampleKind) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            value,
            kind,
        }
    }

    /// Add a label to this sample.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Add multiple labels to this sample.
    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// A named group of samples sharing help text and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    /// Family name; every member sample carries the same name.
    pub name: String,

    /// Help text for the HELP comment. May be empty.
    pub help: String,

    /// Exposition kind shared by all samples.
    pub kind: SampleKind,

    /// Member samples in emission order.
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Create an empty family.
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: SampleKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            samples: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new("ifInOctets", 1234.0, SampleKind::Counter)
            .with_label("ifIndex", "1")
            .with_label("ifName", "eth0");

        assert_eq!(sample.name, "ifInOctets");
        assert_eq!(sample.value, 1234.0);
        assert_eq!(sample.labels.len(), 2);
        assert_eq!(sample.labels[0], ("ifIndex".to_string(), "1".to_string()));
    }

    #[test]
    fn test_sample_kind_strings() {
        assert_eq!(SampleKind::Gauge.as_str(), "gauge");
        assert_eq!(SampleKind::Counter.as_str(), "counter");
        assert_eq!(SampleKind::Untyped.as_str(), "untyped");
        // Info metrics are exposed as gauges in the text format.
        assert_eq!(SampleKind::Info.as_str(), "gauge");
    }
}
