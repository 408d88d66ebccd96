//! snmpsight scrape core.
//!
//! Everything between a `(module, target)` pair arriving from the HTTP
//! layer and a stream of metric families leaving for the exposition
//! writer:
//!
//! - [`oid`] - dotted-decimal parsing, subtree containment, padded splits
//! - [`hints`] - RFC 2579 DISPLAY-HINT formatting
//! - [`index`] - table index suffix decoding and re-encoding
//! - [`schema`] - the read-only MIB-derived registry and textual-convention
//!   hint resolution
//! - [`module`] - scrape profile definitions (walk roots, auth, metrics)
//! - [`value`] - the varbind value model
//! - [`walk`] - PDU planning and execution over an abstract transport
//! - [`render`] - native / override / hint value rendering
//! - [`lookup`] - index-tuple joins attaching labels
//! - [`emit`] - family grouping and exposition-invariant enforcement
//! - [`collector`] - one-scrape orchestration
//! - [`mock`] - a scripted transport for tests
//!
//! The core holds no mutable state across scrapes; the registry and
//! module table are shared by reference between concurrent scrapes.

pub mod collector;
pub mod emit;
pub mod error;
pub mod hints;
pub mod index;
pub mod lookup;
pub mod mock;
pub mod module;
pub mod oid;
pub mod render;
pub mod schema;
pub mod value;
pub mod walk;

pub use collector::{ScrapeOutcome, ScrapeStats, collect, failure_families};
pub use error::{ModuleError, ScrapeError, TransportError};
pub use module::{Module, SnmpVersion, WalkParams};
pub use oid::Oid;
pub use schema::SchemaRegistry;
pub use value::{SnmpValue, VarBind};
pub use walk::{PduTransport, WalkOutcome, WalkStats};
