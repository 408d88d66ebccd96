//! Exporter configuration.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use snmpsight_common::{Error, LoggingConfig, Result, load_config};
use snmpsight_core::Module;

/// Root configuration for the exporter binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Address to serve HTTP on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path to the modules file (JSON5).
    pub modules_file: String,

    /// Optional path to the compiled schema file (JSON).
    #[serde(default)]
    pub schema_file: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:9116".to_string()
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path)
    }
}

/// The modules file: named scrape profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub modules: HashMap<String, Module>,
}

impl ModulesConfig {
    /// Load and validate all modules.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_config(path)?;
        for (name, module) in &config.modules {
            module
                .validate()
                .map_err(|e| Error::Config(format!("module '{}': {}", name, e)))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snmpsight_common::parse_config;

    #[test]
    fn test_exporter_config_defaults() {
        let config: ExporterConfig =
            parse_config(r#"{ modules_file: "modules.json5" }"#).unwrap();

        assert_eq!(config.listen, "0.0.0.0:9116");
        assert_eq!(config.modules_file, "modules.json5");
        assert!(config.schema_file.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_modules_config_parses() {
        let config: ModulesConfig = parse_config(
            r#"{
                modules: {
                    if_mib: {
                        walk: ["1.3.6.1.2.1.2.2.1"],
                        metrics: [
                            {
                                name: "ifInOctets",
                                oid: "1.3.6.1.2.1.2.2.1.10",
                                type: "counter",
                                indexes: [{ labelname: "ifIndex", type: "gauge" }],
                            },
                        ],
                    },
                },
            }"#,
        )
        .unwrap();

        assert!(config.modules.contains_key("if_mib"));
    }
}
