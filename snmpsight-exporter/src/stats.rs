//! Cumulative process counters, the only state shared across scrapes.

use parking_lot::RwLock;

use snmpsight_common::{MetricFamily, Sample, SampleKind};
use snmpsight_core::ScrapeStats;

/// Totals since process start.
#[derive(Debug, Clone, Default)]
pub struct Totals {
    /// Scrapes served, successful or not.
    pub scrapes: u64,

    /// Scrapes that failed outright (tier-2 errors).
    pub scrape_failures: u64,

    /// Scrapes that returned a partial binding map.
    pub partial_scrapes: u64,

    /// Bindings skipped across all scrapes.
    pub bindings_dropped: u64,

    /// Samples rejected by emission validation across all scrapes.
    pub samples_dropped: u64,
}

/// Thread-safe exporter statistics.
#[derive(Debug, Default)]
pub struct ExporterStats {
    totals: RwLock<Totals>,
}

impl ExporterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed scrape.
    pub fn record_scrape(&self, stats: &ScrapeStats, up: bool) {
        let mut totals = self.totals.write();
        totals.scrapes += 1;
        if !up {
            totals.partial_scrapes += 1;
        }
        totals.bindings_dropped += stats.bindings_dropped;
        totals.samples_dropped += stats.samples_dropped;
    }

    /// Record a scrape that failed before producing bindings.
    pub fn record_failure(&self) {
        let mut totals = self.totals.write();
        totals.scrapes += 1;
        totals.scrape_failures += 1;
    }

    pub fn totals(&self) -> Totals {
        self.totals.read().clone()
    }

    /// The process self-metrics served at `/metrics`.
    pub fn families(&self) -> Vec<MetricFamily> {
        let totals = self.totals();
        vec![
            counter(
                "snmpsight_scrapes_total",
                "Scrapes served since process start.",
                totals.scrapes,
            ),
            counter(
                "snmpsight_scrape_failures_total",
                "Scrapes that failed before producing bindings.",
                totals.scrape_failures,
            ),
            counter(
                "snmpsight_partial_scrapes_total",
                "Scrapes that returned a partial binding map.",
                totals.partial_scrapes,
            ),
            counter(
                "snmpsight_bindings_dropped_total",
                "Bindings skipped with an attributed reason.",
                totals.bindings_dropped,
            ),
            counter(
                "snmpsight_samples_dropped_total",
                "Samples rejected by emission validation.",
                totals.samples_dropped,
            ),
        ]
    }
}

fn counter(name: &str, help: &str, value: u64) -> MetricFamily {
    let mut family = MetricFamily::new(name, help, SampleKind::Counter);
    family
        .samples
        .push(Sample::new(name, value as f64, SampleKind::Counter));
    family
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = ExporterStats::new();
        stats.record_scrape(
            &ScrapeStats {
                bindings_dropped: 2,
                samples_dropped: 1,
                ..ScrapeStats::default()
            },
            true,
        );
        stats.record_scrape(&ScrapeStats::default(), false);
        stats.record_failure();

        let totals = stats.totals();
        assert_eq!(totals.scrapes, 3);
        assert_eq!(totals.scrape_failures, 1);
        assert_eq!(totals.partial_scrapes, 1);
        assert_eq!(totals.bindings_dropped, 2);
        assert_eq!(totals.samples_dropped, 1);

        let families = stats.families();
        assert_eq!(families.len(), 5);
        assert_eq!(families[0].samples[0].value, 3.0);
    }
}
