//! snmpsight exporter binary support.
//!
//! The outer shell around the scrape core: configuration, the snmp2
//! transport, the HTTP surface and the text exposition writer.

pub mod config;
pub mod exposition;
pub mod http;
pub mod stats;
pub mod transport;

pub use config::{ExporterConfig, ModulesConfig};
pub use http::{AppState, create_router, serve};
pub use stats::ExporterStats;
pub use transport::{SnmpTransport, normalize_target};
