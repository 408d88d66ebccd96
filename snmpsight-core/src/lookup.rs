//! Label synthesis: joining a metric's decoded index tuple against other
//! columns in the same binding map.
//!
//! A lookup re-encodes the referenced index values into an OID suffix and
//! probes each declared source root for `root ++ suffix`. The first
//! source that answers has its value rendered through the usual pipeline
//! (with the lookup's own type and hint overrides) and attached as a
//! label; the index labels that formed the key are then dropped unless
//! the lookup asks to keep them.

use std::collections::BTreeMap;

use tracing::warn;

use crate::index::{DecodedIndex, IndexValue, encode_indexes};
use crate::module::{IndexSpec, LookupSpec, MetricSpec};
use crate::render::{RenderContext, Rendered, render_value};
use crate::value::VarBind;

/// Apply all lookups of a metric to one sample's label set.
///
/// Returns the number of lookups that fired.
pub fn apply_lookups(
    metric: &MetricSpec,
    decoded: &[DecodedIndex],
    labels: &mut Vec<(String, String)>,
    binds: &BTreeMap<crate::oid::Oid, VarBind>,
    ctx: &RenderContext<'_>,
) -> u64 {
    let mut fired = 0;

    for lookup in &metric.lookups {
        let Some(pairs) = key_tuple(metric, decoded, lookup) else {
            continue;
        };
        let suffix = encode_indexes(pairs);

        let mut resolved = None;
        for source in &lookup.oids {
            let key = source.join(&suffix);
            let Some(vb) = binds.get(&key) else {
                continue;
            };

            match render_value(&lookup.render_spec(source), &vb.value, ctx) {
                Ok(Rendered::Text(text)) => {
                    resolved = Some(text);
                }
                Ok(Rendered::Number { value, .. }) => {
                    resolved = Some(format_number(value));
                }
                Ok(Rendered::States(_)) => {
                    warn!(
                        metric = %metric.name,
                        labelname = %lookup.labelname,
                        source = %source,
                        "lookup source rendered to a state set, skipping"
                    );
                }
                Err(e) => {
                    warn!(
                        metric = %metric.name,
                        labelname = %lookup.labelname,
                        source = %source,
                        error = %e,
                        "lookup source failed to render, skipping"
                    );
                }
            }
            if resolved.is_some() {
                break;
            }
        }

        let Some(value) = resolved else {
            continue;
        };

        if !lookup.keep_source_indexes {
            labels.retain(|(name, _)| !lookup.labels.contains(name));
        }
        labels.push((lookup.labelname.clone(), value));
        fired += 1;
    }

    fired
}

/// Gather the `(spec, value)` pairs for the lookup's referenced indexes,
/// in the order the lookup names them.
fn key_tuple<'a>(
    metric: &'a MetricSpec,
    decoded: &'a [DecodedIndex],
    lookup: &LookupSpec,
) -> Option<Vec<(&'a IndexSpec, &'a IndexValue)>> {
    let mut pairs = Vec::with_capacity(lookup.labels.len());
    for label in &lookup.labels {
        let spec = metric.indexes.iter().find(|i| &i.labelname == label)?;
        let value = decoded.iter().find(|d| &d.name == label).map(|d| &d.value)?;
        pairs.push((spec, value));
    }
    Some(pairs)
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexContext, decode_indexes};
    use crate::oid::Oid;
    use crate::schema::SchemaRegistry;
    use crate::value::SnmpValue;
    use snmpsight_common::parse_config;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn metric_with_lookup() -> MetricSpec {
        parse_config(
            r#"{
                name: "ifInOctets",
                oid: "1.3.6.1.2.1.2.2.1.10",
                type: "counter",
                indexes: [{ labelname: "ifIndex", type: "gauge" }],
                lookups: [
                    {
                        labels: ["ifIndex"],
                        labelname: "ifName",
                        oid: "1.3.6.1.2.1.31.1.1.1.1",
                        type: "DisplayString",
                    },
                ],
            }"#,
        )
        .unwrap()
    }

    fn binds_with_name(name: &[u8]) -> BTreeMap<Oid, VarBind> {
        let mut binds = BTreeMap::new();
        binds.insert(
            oid("1.3.6.1.2.1.31.1.1.1.1.3"),
            VarBind::new(
                oid("1.3.6.1.2.1.31.1.1.1.1.3"),
                SnmpValue::OctetString(name.to_vec()),
            ),
        );
        binds
    }

    #[test]
    fn test_lookup_replaces_index_label() {
        let registry = SchemaRegistry::new();
        let ctx = RenderContext {
            registry: &registry,
            scrape_start_unix: 0,
        };
        let metric = metric_with_lookup();
        let binds = binds_with_name(b"eth0");

        let decoded = decode_indexes(
            &Oid::from_subids(vec![3]),
            &metric.indexes,
            IndexContext::default(),
        )
        .unwrap();
        let mut labels = vec![("ifIndex".to_string(), "3".to_string())];

        let fired = apply_lookups(&metric, &decoded, &mut labels, &binds, &ctx);

        assert_eq!(fired, 1);
        // The source index label is dropped, the looked-up one attached.
        assert_eq!(labels, vec![("ifName".to_string(), "eth0".to_string())]);
    }

    #[test]
    fn test_lookup_missing_source_skips() {
        let registry = SchemaRegistry::new();
        let ctx = RenderContext {
            registry: &registry,
            scrape_start_unix: 0,
        };
        let metric = metric_with_lookup();
        let binds = BTreeMap::new();

        let decoded = decode_indexes(
            &Oid::from_subids(vec![3]),
            &metric.indexes,
            IndexContext::default(),
        )
        .unwrap();
        let mut labels = vec![("ifIndex".to_string(), "3".to_string())];

        let fired = apply_lookups(&metric, &decoded, &mut labels, &binds, &ctx);

        assert_eq!(fired, 0);
        // Nothing fired, so the index label survives.
        assert_eq!(labels, vec![("ifIndex".to_string(), "3".to_string())]);
    }

    #[test]
    fn test_lookup_keep_source_indexes() {
        let registry = SchemaRegistry::new();
        let ctx = RenderContext {
            registry: &registry,
            scrape_start_unix: 0,
        };
        let mut metric = metric_with_lookup();
        metric.lookups[0].keep_source_indexes = true;
        let binds = binds_with_name(b"eth0");

        let decoded = decode_indexes(
            &Oid::from_subids(vec![3]),
            &metric.indexes,
            IndexContext::default(),
        )
        .unwrap();
        let mut labels = vec![("ifIndex".to_string(), "3".to_string())];

        apply_lookups(&metric, &decoded, &mut labels, &binds, &ctx);

        assert_eq!(
            labels,
            vec![
                ("ifIndex".to_string(), "3".to_string()),
                ("ifName".to_string(), "eth0".to_string()),
            ]
        );
    }

    #[test]
    fn test_lookup_tries_sources_in_order() {
        let registry = SchemaRegistry::new();
        let ctx = RenderContext {
            registry: &registry,
            scrape_start_unix: 0,
        };
        let mut metric = metric_with_lookup();
        metric.lookups[0].oids = vec![
            oid("1.3.6.1.2.1.31.1.1.1.18"), // absent
            oid("1.3.6.1.2.1.31.1.1.1.1"),  // present
        ];
        let binds = binds_with_name(b"eth0");

        let decoded = decode_indexes(
            &Oid::from_subids(vec![3]),
            &metric.indexes,
            IndexContext::default(),
        )
        .unwrap();
        let mut labels = vec![("ifIndex".to_string(), "3".to_string())];

        let fired = apply_lookups(&metric, &decoded, &mut labels, &binds, &ctx);

        assert_eq!(fired, 1);
        assert!(labels.iter().any(|(k, v)| k == "ifName" && v == "eth0"));
    }

    #[test]
    fn test_lookup_numeric_source_formats_as_integer() {
        let registry = SchemaRegistry::new();
        let ctx = RenderContext {
            registry: &registry,
            scrape_start_unix: 0,
        };
        let mut metric = metric_with_lookup();
        metric.lookups[0].lookup_type = None;
        let mut binds = BTreeMap::new();
        binds.insert(
            oid("1.3.6.1.2.1.31.1.1.1.1.3"),
            VarBind::new(
                oid("1.3.6.1.2.1.31.1.1.1.1.3"),
                SnmpValue::Gauge32(1000),
            ),
        );

        let decoded = decode_indexes(
            &Oid::from_subids(vec![3]),
            &metric.indexes,
            IndexContext::default(),
        )
        .unwrap();
        let mut labels = vec![("ifIndex".to_string(), "3".to_string())];

        apply_lookups(&metric, &decoded, &mut labels, &binds, &ctx);

        assert!(labels.iter().any(|(k, v)| k == "ifName" && v == "1000"));
    }
}
