//! Module definitions: named scrape profiles bundling walk roots,
//! authentication and metric specs.
//!
//! Modules are deserialized from JSON5 and immutable for the lifetime of
//! a scrape. Regexes compile during deserialization so a bad pattern is a
//! load-time configuration error, not a per-scrape surprise.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ModuleError;
use crate::oid::Oid;

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "1", alias = "v1")]
    V1,
    #[default]
    #[serde(rename = "2c", alias = "v2c")]
    V2c,
    #[serde(rename = "3", alias = "v3")]
    V3,
}

/// SNMPv3 authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthProtocol {
    /// No authentication (noAuthNoPriv).
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA")]
    Sha1,
    #[serde(rename = "SHA224")]
    Sha224,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA384")]
    Sha384,
    #[serde(rename = "SHA512")]
    Sha512,
}

/// SNMPv3 privacy/encryption protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrivProtocol {
    /// No encryption (noPriv).
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "DES")]
    Des,
    #[serde(rename = "AES")]
    Aes128,
    #[serde(rename = "AES192")]
    Aes192,
    #[serde(rename = "AES256")]
    Aes256,
}

/// SNMPv3 security configuration (USM - User Security Model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpV3Security {
    /// SNMPv3 username.
    pub username: String,

    /// Authentication protocol.
    #[serde(default)]
    pub auth_protocol: AuthProtocol,

    /// Authentication password (required if auth_protocol is not None).
    #[serde(default)]
    pub auth_password: Option<String>,

    /// Privacy/encryption protocol.
    #[serde(default)]
    pub priv_protocol: PrivProtocol,

    /// Privacy password (required if priv_protocol is not None).
    #[serde(default)]
    pub priv_password: Option<String>,
}

/// Credentials for a scrape session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Community string (for v1/v2c).
    #[serde(default = "default_community")]
    pub community: String,

    /// SNMPv3 security settings (required if version is "3").
    #[serde(default)]
    pub security: Option<SnmpV3Security>,
}

fn default_community() -> String {
    "public".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            community: default_community(),
            security: None,
        }
    }
}

/// Per-scrape transport parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkParams {
    /// SNMP version ("1", "2c", or "3").
    #[serde(default)]
    pub version: SnmpVersion,

    /// Attempts per PDU exchange; timeouts retry up to `retries - 1` times.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-PDU timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max repetitions per GETBULK (v2c/v3).
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: u32,

    /// Authentication credentials.
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_repetitions() -> u32 {
    25
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            version: SnmpVersion::default(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            max_repetitions: default_max_repetitions(),
            auth: AuthConfig::default(),
        }
    }
}

impl WalkParams {
    /// The per-PDU deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Metric and index type selector.
///
/// Covers both SNMP base types as declared in a compiled schema and the
/// user override types that change rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "INTEGER", alias = "Integer32")]
    Integer,
    #[serde(rename = "gauge", alias = "Gauge32")]
    Gauge,
    #[serde(rename = "counter", alias = "Counter32", alias = "Counter64")]
    Counter,
    #[serde(rename = "OID")]
    ObjectIdentifier,
    #[serde(rename = "OctetString")]
    OctetString,
    #[serde(rename = "DisplayString", alias = "SnmpAdminString")]
    DisplayString,
    #[serde(rename = "PhysAddress48", alias = "MacAddress")]
    PhysAddress48,
    #[serde(rename = "InetAddress")]
    InetAddress,
    #[serde(rename = "InetAddressIPv4")]
    InetAddressIPv4,
    #[serde(rename = "InetAddressIPv6")]
    InetAddressIPv6,
    #[serde(rename = "InetAddressMissingSize")]
    InetAddressMissingSize,
    #[serde(rename = "EnumAsInfo")]
    EnumAsInfo,
    #[serde(rename = "EnumAsStateSet")]
    EnumAsStateSet,
    #[serde(rename = "Bits")]
    Bits,
    #[serde(rename = "ParseDateAndTime", alias = "DateAndTime")]
    ParseDateAndTime,
    #[serde(rename = "uptime")]
    Uptime,
}

impl MetricType {
    /// Index peel rule: a single sub-identifier holding an integer.
    pub fn is_integer_index(&self) -> bool {
        matches!(
            self,
            MetricType::Integer
                | MetricType::Gauge
                | MetricType::Counter
                | MetricType::Uptime
                | MetricType::EnumAsInfo
                | MetricType::EnumAsStateSet
        )
    }

    /// Index peel rule: a run of sub-identifiers holding bytes.
    pub fn is_octet_index(&self) -> bool {
        matches!(
            self,
            MetricType::OctetString
                | MetricType::DisplayString
                | MetricType::PhysAddress48
                | MetricType::Bits
                | MetricType::ParseDateAndTime
        )
    }
}

/// One index position of a table metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Label the decoded index value is attached under.
    pub labelname: String,

    /// How the sub-identifiers are peeled and rendered.
    #[serde(rename = "type")]
    pub index_type: MetricType,

    /// Fixed byte size for octet-string indexes (0 = variable).
    #[serde(default)]
    pub fixed_size: u32,

    /// The index has no length prefix and consumes the remaining
    /// sub-identifiers. Only valid on the last index.
    #[serde(default)]
    pub implied: bool,
}

/// A declared join from index labels to another column's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSpec {
    /// Index labels of the owning metric whose values form the join key.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Name of the label the looked-up value is attached under.
    pub labelname: String,

    /// Source OID roots probed with the re-encoded key, in order.
    #[serde(rename = "oid", deserialize_with = "one_or_many_oids")]
    pub oids: Vec<Oid>,

    /// Rendering override for the source value.
    #[serde(rename = "type", default)]
    pub lookup_type: Option<MetricType>,

    /// DISPLAY-HINT override for the source value.
    #[serde(default)]
    pub display_hint: Option<String>,

    /// Keep the index labels referenced by `labels` on the sample instead
    /// of dropping them.
    #[serde(default)]
    pub keep_source_indexes: bool,

    /// Enum labels for rendering the source value.
    #[serde(default, deserialize_with = "int_keyed_map")]
    pub enum_values: HashMap<i64, String>,
}

/// One regex extraction rule: the first matching rule's expanded value
/// becomes the sample value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexExtract {
    /// Pattern matched against the rendered string value.
    #[serde(with = "serde_regex")]
    pub regex: Regex,

    /// Template expanded with capture groups; must expand to a float.
    #[serde(default = "default_extract_value")]
    pub value: String,
}

fn default_extract_value() -> String {
    "$1".to_string()
}

/// One metric entry of a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric family name.
    pub name: String,

    /// Root OID of the column or scalar.
    pub oid: Oid,

    /// Declared or override type; `None` falls back to the value kind.
    #[serde(rename = "type", default)]
    pub metric_type: Option<MetricType>,

    /// Help text for the exposition.
    #[serde(default)]
    pub help: String,

    /// Literal DISPLAY-HINT, or "@mib" to resolve through the schema.
    #[serde(default)]
    pub display_hint: Option<String>,

    /// Fixed byte size of the value (0 = variable).
    #[serde(default)]
    pub fixed_size: u32,

    /// Ordered index schema for the OID suffix.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,

    /// Joins attaching additional labels.
    #[serde(default)]
    pub lookups: Vec<LookupSpec>,

    /// Regex extraction rules keyed by metric name suffix.
    #[serde(default)]
    pub regex_extracts: HashMap<String, Vec<RegexExtract>>,

    /// Enum labels for integer values.
    #[serde(default, deserialize_with = "int_keyed_map")]
    pub enum_values: HashMap<i64, String>,
}

/// A named scrape profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// OID subtree roots retrieved with GETBULK/GETNEXT.
    #[serde(default)]
    pub walk: Vec<Oid>,

    /// Exact OIDs retrieved with GET.
    #[serde(default)]
    pub get: Vec<Oid>,

    /// Transport parameters.
    #[serde(flatten)]
    pub walk_params: WalkParams,

    /// Metric entries, in emission order.
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl Module {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.walk.is_empty() && self.get.is_empty() {
            return Err(ModuleError::EmptyPlan);
        }

        for metric in &self.metrics {
            for (i, index) in metric.indexes.iter().enumerate() {
                if index.implied && i != metric.indexes.len() - 1 {
                    return Err(ModuleError::ImpliedNotLast {
                        metric: metric.name.clone(),
                        index: index.labelname.clone(),
                    });
                }
            }

            for lookup in &metric.lookups {
                for label in &lookup.labels {
                    if !metric.indexes.iter().any(|i| &i.labelname == label) {
                        return Err(ModuleError::UnknownLookupLabel {
                            metric: metric.name.clone(),
                            label: label.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Serde adapter compiling regexes at load time.
mod serde_regex {
    use super::*;

    pub fn serialize<S: Serializer>(regex: &Regex, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(regex.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Regex, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Regex::new(&pattern).map_err(de::Error::custom)
    }
}

/// Deserialize a map with stringified integer keys (JSON5 object keys are
/// always strings).
pub(crate) fn int_keyed_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<i64, String>, D::Error> {
    let raw = HashMap::<String, String>::deserialize(deserializer)?;
    let mut map = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let key = key
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("invalid enum value key '{}'", key)))?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Accept a single OID string or a list of them.
fn one_or_many_oids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Oid>, D::Error> {
    struct OneOrMany;

    impl<'de> Visitor<'de> for OneOrMany {
        type Value = Vec<Oid>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an OID string or a list of OID strings")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            value.parse::<Oid>().map(|oid| vec![oid]).map_err(E::custom)
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut oids = Vec::new();
            while let Some(oid) = seq.next_element::<Oid>()? {
                oids.push(oid);
            }
            Ok(oids)
        }
    }

    deserializer.deserialize_any(OneOrMany)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snmpsight_common::parse_config;

    #[test]
    fn test_parse_module() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.2.1.2.2.1"],
            get: ["1.3.6.1.2.1.1.3.0"],
            version: "2c",
            retries: 2,
            timeout_secs: 3,
            max_repetitions: 10,
            auth: { community: "public" },
            metrics: [
                {
                    name: "ifInOctets",
                    oid: "1.3.6.1.2.1.2.2.1.10",
                    type: "counter",
                    help: "Bytes received",
                    indexes: [{ labelname: "ifIndex", type: "gauge" }],
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        module.validate().unwrap();

        assert_eq!(module.walk.len(), 1);
        assert_eq!(module.get.len(), 1);
        assert_eq!(module.walk_params.version, SnmpVersion::V2c);
        assert_eq!(module.walk_params.retries, 2);
        assert_eq!(module.walk_params.max_repetitions, 10);
        assert_eq!(module.metrics.len(), 1);
        assert_eq!(module.metrics[0].metric_type, Some(MetricType::Counter));
        assert_eq!(module.metrics[0].indexes[0].labelname, "ifIndex");
    }

    #[test]
    fn test_defaults() {
        let module: Module = parse_config(r#"{ walk: ["1.3.6.1.2.1.2"] }"#).unwrap();

        assert_eq!(module.walk_params.version, SnmpVersion::V2c);
        assert_eq!(module.walk_params.retries, 3);
        assert_eq!(module.walk_params.timeout_secs, 5);
        assert_eq!(module.walk_params.max_repetitions, 25);
        assert_eq!(module.walk_params.auth.community, "public");
    }

    #[test]
    fn test_lookup_single_and_many_oids() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.2.1.2.2.1"],
            metrics: [
                {
                    name: "ifInOctets",
                    oid: "1.3.6.1.2.1.2.2.1.10",
                    type: "counter",
                    indexes: [{ labelname: "ifIndex", type: "gauge" }],
                    lookups: [
                        {
                            labels: ["ifIndex"],
                            labelname: "ifName",
                            oid: "1.3.6.1.2.1.31.1.1.1.1",
                        },
                        {
                            labels: ["ifIndex"],
                            labelname: "ifDescr",
                            oid: ["1.3.6.1.2.1.31.1.1.1.18", "1.3.6.1.2.1.2.2.1.2"],
                        },
                    ],
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        module.validate().unwrap();

        let lookups = &module.metrics[0].lookups;
        assert_eq!(lookups[0].oids.len(), 1);
        assert_eq!(lookups[1].oids.len(), 2);
    }

    #[test]
    fn test_enum_values_integer_keys() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.2.1.2.2.1"],
            metrics: [
                {
                    name: "ifOperStatus",
                    oid: "1.3.6.1.2.1.2.2.1.8",
                    type: "EnumAsStateSet",
                    indexes: [{ labelname: "ifIndex", type: "gauge" }],
                    enum_values: { "1": "up", "2": "down", "3": "testing" },
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        let enums = &module.metrics[0].enum_values;
        assert_eq!(enums.get(&1).map(String::as_str), Some("up"));
        assert_eq!(enums.get(&3).map(String::as_str), Some("testing"));
    }

    #[test]
    fn test_implied_must_be_last() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.4.1.1"],
            metrics: [
                {
                    name: "bad",
                    oid: "1.3.6.1.4.1.1.1",
                    indexes: [
                        { labelname: "name", type: "OctetString", implied: true },
                        { labelname: "slot", type: "gauge" },
                    ],
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        assert_eq!(
            module.validate(),
            Err(ModuleError::ImpliedNotLast {
                metric: "bad".to_string(),
                index: "name".to_string(),
            })
        );
    }

    #[test]
    fn test_lookup_label_must_exist() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.4.1.1"],
            metrics: [
                {
                    name: "bad",
                    oid: "1.3.6.1.4.1.1.1",
                    indexes: [{ labelname: "ifIndex", type: "gauge" }],
                    lookups: [
                        { labels: ["nope"], labelname: "x", oid: "1.3.6.1.4.1.1.2" },
                    ],
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        assert!(matches!(
            module.validate(),
            Err(ModuleError::UnknownLookupLabel { .. })
        ));
    }

    #[test]
    fn test_empty_plan_rejected() {
        let module: Module = parse_config("{}").unwrap();
        assert_eq!(module.validate(), Err(ModuleError::EmptyPlan));
    }

    #[test]
    fn test_regex_extract_compiles_at_load() {
        let json5 = r#"
        {
            walk: ["1.3.6.1.4.1.1"],
            metrics: [
                {
                    name: "powerStatus",
                    oid: "1.3.6.1.4.1.1.1",
                    type: "DisplayString",
                    regex_extracts: {
                        Watts: [{ regex: "([0-9]+)W", value: "$1" }],
                    },
                },
            ],
        }
        "#;

        let module: Module = parse_config(json5).unwrap();
        let rules = &module.metrics[0].regex_extracts["Watts"];
        assert!(rules[0].regex.is_match("230W"));

        let bad = r#"
        {
            walk: ["1.3.6.1.4.1.1"],
            metrics: [
                {
                    name: "bad",
                    oid: "1.3.6.1.4.1.1.1",
                    regex_extracts: { X: [{ regex: "([unclosed" }] },
                },
            ],
        }
        "#;
        assert!(parse_config::<Module>(bad).is_err());
    }
}
