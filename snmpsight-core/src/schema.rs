//! The compiled MIB-derived schema consumed by the scrape pipeline.
//!
//! A [`SchemaRegistry`] is built once at process start (from a JSON file
//! produced by the generate step, or programmatically in tests) and shared
//! read-only by all concurrent scrapes. It answers two questions: what
//! DISPLAY-HINT applies to an object, and what enum labels an integer
//! object carries.
//!
//! Textual conventions may name other conventions; the declared hierarchy
//! is a DAG in well-formed MIBs but is treated as potentially cyclic, so
//! hint resolution is bounded by a fixed depth.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use snmpsight_common::{Error, Result};

use crate::module::int_keyed_map;
use crate::oid::Oid;

/// Maximum textual-convention hops walked during hint resolution.
const HINT_RESOLUTION_DEPTH: usize = 32;

/// Schema facts about one object OID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// DISPLAY-HINT attached directly to the object.
    #[serde(default)]
    pub display_hint: Option<String>,

    /// Name of the textual convention the object's type resolves to.
    #[serde(default)]
    pub textual_convention: Option<String>,

    /// Enum labels for integer-valued objects.
    #[serde(default, deserialize_with = "int_keyed_map")]
    pub enum_values: HashMap<i64, String>,
}

/// A named textual convention with optional single-parent inheritance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextualConvention {
    /// DISPLAY-HINT declared on this convention.
    #[serde(default)]
    pub display_hint: Option<String>,

    /// Convention this one is declared in terms of.
    #[serde(default)]
    pub inherits: Option<String>,
}

/// A schema definition file: object facts plus the convention table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// OID string to entry.
    #[serde(default)]
    pub objects: HashMap<String, SchemaEntry>,

    /// Convention name to declaration.
    #[serde(default)]
    pub textual_conventions: HashMap<String, TextualConvention>,
}

/// Read-only registry of schema entries and textual conventions.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    objects: BTreeMap<Oid, SchemaEntry>,
    conventions: HashMap<String, TextualConvention>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema definition from a JSON file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read schema file '{}': {}", path.display(), e))
        })?;

        self.load_json(&content)
            .map_err(|e| Error::Config(format!("Failed to parse schema file '{}': {}", path.display(), e)))
    }

    /// Load a schema definition from a JSON or JSON5 string.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let def: SchemaDefinition = serde_json::from_str(json)
            .or_else(|_| json5::from_str(json))
            .map_err(|e| Error::Config(format!("Failed to parse schema JSON: {}", e)))?;

        self.load_definition(def)
    }

    /// Merge a schema definition into the registry.
    pub fn load_definition(&mut self, def: SchemaDefinition) -> Result<()> {
        for (oid, entry) in def.objects {
            let oid = oid
                .parse::<Oid>()
                .map_err(|e| Error::Config(format!("Bad schema object OID: {}", e)))?;
            self.objects.insert(oid, entry);
        }
        self.conventions.extend(def.textual_conventions);
        Ok(())
    }

    /// Register a single object entry (test and builder use).
    pub fn add_object(&mut self, oid: Oid, entry: SchemaEntry) {
        self.objects.insert(oid, entry);
    }

    /// Register a single textual convention (test and builder use).
    pub fn add_convention(&mut self, name: impl Into<String>, tc: TextualConvention) {
        self.conventions.insert(name.into(), tc);
    }

    /// Exact-match entry for an object OID.
    pub fn entry(&self, oid: &Oid) -> Option<&SchemaEntry> {
        self.objects.get(oid)
    }

    /// Enum labels for an object, if any are known.
    pub fn enum_values(&self, oid: &Oid) -> Option<&HashMap<i64, String>> {
        self.objects
            .get(oid)
            .filter(|e| !e.enum_values.is_empty())
            .map(|e| &e.enum_values)
    }

    /// Resolve the effective DISPLAY-HINT for an object.
    ///
    /// The object's own hint wins; otherwise the textual-convention chain
    /// is walked until a convention carries a hint. The walk stops after
    /// [`HINT_RESOLUTION_DEPTH`] hops, so a cyclic declaration degrades to
    /// "no hint" instead of spinning.
    pub fn resolve_hint(&self, oid: &Oid) -> Option<&str> {
        let entry = self.objects.get(oid)?;
        if let Some(hint) = &entry.display_hint {
            return Some(hint);
        }

        let mut name = entry.textual_convention.as_deref()?;
        for _ in 0..HINT_RESOLUTION_DEPTH {
            let tc = self.conventions.get(name)?;
            if let Some(hint) = &tc.display_hint {
                return Some(hint);
            }
            name = tc.inherits.as_deref()?;
        }

        None
    }

    /// Number of object entries loaded.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_json() {
        let mut registry = SchemaRegistry::new();
        registry
            .load_json(
                r#"{
                    "objects": {
                        "1.3.6.1.2.1.2.2.1.6": {
                            "textual_convention": "PhysAddress"
                        },
                        "1.3.6.1.2.1.2.2.1.8": {
                            "enum_values": { "1": "up", "2": "down" }
                        }
                    },
                    "textual_conventions": {
                        "PhysAddress": { "display_hint": "1x:" }
                    }
                }"#,
            )
            .unwrap();

        assert_eq!(registry.object_count(), 2);
        assert_eq!(registry.resolve_hint(&oid("1.3.6.1.2.1.2.2.1.6")), Some("1x:"));
        assert_eq!(
            registry
                .enum_values(&oid("1.3.6.1.2.1.2.2.1.8"))
                .and_then(|e| e.get(&1))
                .map(String::as_str),
            Some("up")
        );
    }

    #[test]
    fn test_direct_hint_wins_over_convention() {
        let mut registry = SchemaRegistry::new();
        registry.add_convention(
            "DateAndTime",
            TextualConvention {
                display_hint: Some("2d-1d-1d,1d:1d:1d.1d".to_string()),
                inherits: None,
            },
        );
        registry.add_object(
            oid("1.3.6.1.4.1.1"),
            SchemaEntry {
                display_hint: Some("255a".to_string()),
                textual_convention: Some("DateAndTime".to_string()),
                enum_values: HashMap::new(),
            },
        );

        assert_eq!(registry.resolve_hint(&oid("1.3.6.1.4.1.1")), Some("255a"));
    }

    #[test]
    fn test_hint_inherited_through_convention_chain() {
        let mut registry = SchemaRegistry::new();
        registry.add_convention(
            "VendorName",
            TextualConvention {
                display_hint: None,
                inherits: Some("SnmpAdminString".to_string()),
            },
        );
        registry.add_convention(
            "SnmpAdminString",
            TextualConvention {
                display_hint: Some("255t".to_string()),
                inherits: None,
            },
        );
        registry.add_object(
            oid("1.3.6.1.4.1.2"),
            SchemaEntry {
                display_hint: None,
                textual_convention: Some("VendorName".to_string()),
                enum_values: HashMap::new(),
            },
        );

        assert_eq!(registry.resolve_hint(&oid("1.3.6.1.4.1.2")), Some("255t"));
    }

    #[test]
    fn test_cyclic_conventions_bounded() {
        let mut registry = SchemaRegistry::new();
        registry.add_convention(
            "A",
            TextualConvention {
                display_hint: None,
                inherits: Some("B".to_string()),
            },
        );
        registry.add_convention(
            "B",
            TextualConvention {
                display_hint: None,
                inherits: Some("A".to_string()),
            },
        );
        registry.add_object(
            oid("1.3.6.1.4.1.3"),
            SchemaEntry {
                display_hint: None,
                textual_convention: Some("A".to_string()),
                enum_values: HashMap::new(),
            },
        );

        assert_eq!(registry.resolve_hint(&oid("1.3.6.1.4.1.3")), None);
    }

    #[test]
    fn test_unknown_oid_has_no_hint() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.resolve_hint(&oid("1.3.6.1.4.1.9")), None);
        assert!(registry.entry(&oid("1.3.6.1.4.1.9")).is_none());
    }
}
