//! Scrape orchestration: plan, walk, decode, render, join, emit.
//!
//! One call to [`collect`] is one scrape: it drives the transport until
//! the module's plan is exhausted, then turns the binding map into a
//! deterministic sample stream. Metrics are processed in module order and
//! bindings in ascending OID order, so two scrapes over the same binding
//! map emit identical streams apart from the duration self-metrics.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use snmpsight_common::{MetricFamily, Sample, SampleKind};

use crate::emit::Emitter;
use crate::error::ScrapeError;
use crate::index::{IndexContext, decode_indexes};
use crate::lookup::{apply_lookups, format_number};
use crate::module::{MetricSpec, Module};
use crate::render::{HINT_FROM_MIB, RenderContext, Rendered, render_value};
use crate::schema::SchemaRegistry;
use crate::walk::{PduTransport, WalkStats, walk_module};

/// Counters exposed by one scrape.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Transport counters from the walk phase.
    pub walk: WalkStats,

    /// Time spent in the walk phase.
    pub walk_duration: Duration,

    /// Total scrape wall time.
    pub duration: Duration,

    /// Bindings skipped with an attributed reason.
    pub bindings_dropped: u64,

    /// Samples rejected by emission validation.
    pub samples_dropped: u64,
}

/// The result of one successful (possibly partial) scrape.
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// Metric families in module order, self-metrics last.
    pub families: Vec<MetricFamily>,

    /// Per-scrape counters.
    pub stats: ScrapeStats,

    /// False when the walk returned a partial map.
    pub up: bool,
}

/// Perform one scrape of `target` with the given module and transport.
pub async fn collect<T: PduTransport>(
    module: &Module,
    target: &str,
    transport: &mut T,
    registry: &SchemaRegistry,
) -> Result<ScrapeOutcome, ScrapeError> {
    let start = Instant::now();
    let ctx = RenderContext {
        registry,
        scrape_start_unix: Utc::now().timestamp(),
    };

    let walk = walk_module(module, transport).await?;
    let walk_duration = start.elapsed();

    let mut emitter = Emitter::new();
    let mut bindings_dropped = 0u64;

    for metric in &module.metrics {
        emit_metric(metric, &walk.binds, registry, &ctx, &mut emitter, &mut bindings_dropped);
    }

    let (mut families, samples_dropped) = emitter.finish();
    let duration = start.elapsed();

    append_self_metrics(
        &mut families,
        target,
        walk.healthy,
        &walk.stats,
        walk_duration,
        duration,
    );

    Ok(ScrapeOutcome {
        families,
        up: walk.healthy,
        stats: ScrapeStats {
            walk: walk.stats,
            walk_duration,
            duration,
            bindings_dropped,
            samples_dropped,
        },
    })
}

/// Families for a scrape that failed before producing bindings: the
/// operational self-metrics plus `up=0`.
pub fn failure_families(target: &str, duration: Duration) -> Vec<MetricFamily> {
    let mut families = Vec::with_capacity(2);
    families.push(self_metric(
        "snmp_scrape_duration_seconds",
        "Total SNMP time scrape took (walk and processing).",
        duration.as_secs_f64(),
    ));
    families.push(up_family(target, false));
    families
}

fn emit_metric(
    metric: &MetricSpec,
    binds: &std::collections::BTreeMap<crate::oid::Oid, crate::value::VarBind>,
    registry: &SchemaRegistry,
    ctx: &RenderContext<'_>,
    emitter: &mut Emitter,
    bindings_dropped: &mut u64,
) {
    // The hint and enum table resolved once per metric; octet-string
    // indexes render with the same hint as the value.
    let hint = match metric.display_hint.as_deref() {
        Some(declared) if declared == HINT_FROM_MIB => registry.resolve_hint(&metric.oid),
        other => other,
    };
    let enum_values = if metric.enum_values.is_empty() {
        registry.enum_values(&metric.oid)
    } else {
        Some(&metric.enum_values)
    };
    let index_ctx = IndexContext { hint, enum_values };

    for (oid, vb) in binds.range(metric.oid.clone()..) {
        if !oid.starts_with(&metric.oid) {
            break;
        }

        let (_, suffix) = oid.split(metric.oid.len());

        let decoded = match decode_indexes(&suffix, &metric.indexes, index_ctx) {
            Ok(decoded) => decoded,
            Err(e) => {
                *bindings_dropped += 1;
                warn!(metric = %metric.name, oid = %oid, error = %e, "undecodable index, dropping binding");
                continue;
            }
        };

        let rendered = match render_value(&metric.render_spec(), &vb.value, ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                *bindings_dropped += 1;
                warn!(metric = %metric.name, oid = %oid, error = %e, "unrenderable value, dropping binding");
                continue;
            }
        };

        let mut labels: Vec<(String, String)> = decoded
            .iter()
            .map(|d| (d.name.clone(), d.label.clone()))
            .collect();
        apply_lookups(metric, &decoded, &mut labels, binds, ctx);

        if !metric.regex_extracts.is_empty() {
            emit_regex_extracts(metric, &rendered, &labels, emitter, bindings_dropped);
            continue;
        }

        match rendered {
            Rendered::Number { value, kind } => {
                emitter.add(
                    Sample::new(metric.name.clone(), value, kind).with_labels(labels),
                    &metric.help,
                );
            }
            Rendered::Text(text) => {
                // The rendered string becomes a label named after the
                // metric on a constant-1 info sample.
                emitter.add(
                    Sample::new(metric.name.clone(), 1.0, SampleKind::Info)
                        .with_labels(labels)
                        .with_label(metric.name.clone(), text),
                    &metric.help,
                );
            }
            Rendered::States(states) => {
                for (state, active) in states {
                    emitter.add(
                        Sample::new(
                            metric.name.clone(),
                            if active { 1.0 } else { 0.0 },
                            SampleKind::Gauge,
                        )
                        .with_labels(labels.clone())
                        .with_label(metric.name.clone(), state),
                        &metric.help,
                    );
                }
            }
        }
    }
}

/// The regex-extract path: the rendered value is matched as text and each
/// suffix key that matches yields one derived gauge, replacing the base
/// sample entirely.
fn emit_regex_extracts(
    metric: &MetricSpec,
    rendered: &Rendered,
    labels: &[(String, String)],
    emitter: &mut Emitter,
    bindings_dropped: &mut u64,
) {
    let text = match rendered {
        Rendered::Text(text) => text.clone(),
        Rendered::Number { value, .. } => format_number(*value),
        Rendered::States(_) => {
            *bindings_dropped += 1;
            warn!(metric = %metric.name, "regex extract on a state set, dropping binding");
            return;
        }
    };

    // Suffix keys sorted for a deterministic sample stream.
    let mut suffixes: Vec<&String> = metric.regex_extracts.keys().collect();
    suffixes.sort();

    for suffix in suffixes {
        let mut matched = false;
        for rule in &metric.regex_extracts[suffix] {
            let Some(caps) = rule.regex.captures(&text) else {
                continue;
            };
            matched = true;

            let mut expanded = String::new();
            caps.expand(&rule.value, &mut expanded);

            match expanded.parse::<f64>() {
                Ok(value) => {
                    emitter.add(
                        Sample::new(format!("{}{}", metric.name, suffix), value, SampleKind::Gauge)
                            .with_labels(labels.to_vec()),
                        &metric.help,
                    );
                }
                Err(_) => {
                    *bindings_dropped += 1;
                    warn!(
                        metric = %metric.name,
                        suffix = %suffix,
                        value = %expanded,
                        "regex extract expanded to a non-number, dropping sample"
                    );
                }
            }
            // First matching rule wins for this suffix.
            break;
        }
        if !matched {
            *bindings_dropped += 1;
            debug!(metric = %metric.name, suffix = %suffix, value = %text, "no regex matched, no sample");
        }
    }
}

fn append_self_metrics(
    families: &mut Vec<MetricFamily>,
    target: &str,
    healthy: bool,
    stats: &WalkStats,
    walk_duration: Duration,
    duration: Duration,
) {
    families.push(self_metric(
        "snmp_collection_duration_seconds",
        "Time SNMP collection (the walk phase) took.",
        walk_duration.as_secs_f64(),
    ));
    families.push(self_metric(
        "snmp_scrape_packets_sent",
        "Request packets sent, retries included.",
        stats.packets_sent as f64,
    ));
    families.push(self_metric(
        "snmp_scrape_pdus_sent",
        "Logical PDU exchanges issued.",
        stats.pdus_sent as f64,
    ));
    families.push(self_metric(
        "snmp_scrape_duration_seconds",
        "Total SNMP time scrape took (walk and processing).",
        duration.as_secs_f64(),
    ));
    families.push(up_family(target, healthy));
}

fn self_metric(name: &str, help: &str, value: f64) -> MetricFamily {
    let mut family = MetricFamily::new(name, help, SampleKind::Gauge);
    family.samples.push(Sample::new(name, value, SampleKind::Gauge));
    family
}

fn up_family(target: &str, healthy: bool) -> MetricFamily {
    let mut family = MetricFamily::new("up", "Whether the SNMP scrape succeeded.", SampleKind::Gauge);
    family.samples.push(
        Sample::new("up", if healthy { 1.0 } else { 0.0 }, SampleKind::Gauge)
            .with_label("target", target),
    );
    family
}
