//! Error types for the scrape core.
//!
//! The tiers map onto the pipeline: configuration problems surface before
//! any PDU is sent, transport problems either retry (timeout) or abort the
//! scrape (fatal), and per-binding problems never abort anything - they
//! are counted and logged where they occur.

use thiserror::Error;

/// Failure to parse a dotted-decimal OID string.
#[derive(Debug, Clone, Error)]
#[error("invalid OID '{oid}': bad segment '{segment}'")]
pub struct OidParseError {
    oid: String,
    segment: String,
}

impl OidParseError {
    pub(crate) fn new(oid: &str, segment: &str) -> Self {
        Self {
            oid: oid.to_string(),
            segment: segment.to_string(),
        }
    }
}

/// Module definition problems, reported synchronously at load time.
///
/// Malformed OIDs, regexes and enum keys are rejected earlier, during
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("metric '{metric}': implied index '{index}' must be last")]
    ImpliedNotLast { metric: String, index: String },

    #[error("metric '{metric}': lookup references unknown index label '{label}'")]
    UnknownLookupLabel { metric: String, label: String },

    #[error("module has no walk roots and no get OIDs")]
    EmptyPlan,
}

/// Failure to decode an index suffix against its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index '{0}': suffix exhausted")]
    ShortSuffix(String),

    #[error("index '{0}': sub-identifier {1} is not a byte")]
    ByteOutOfRange(String, u32),

    #[error("index '{0}': no preceding address-type index")]
    MissingAddressType(String),

    #[error("index '{0}': unknown address family {1}")]
    UnknownAddressFamily(String, i64),

    #[error("index '{0}': declared length {1} exceeds suffix")]
    BadLength(String, u32),
}

/// Failure to render a varbind value into a sample.
///
/// Always a per-binding drop, never a scrape failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("value has no numeric form")]
    NotNumeric,

    #[error("value kind cannot produce a sample")]
    Unrenderable,

    #[error("invalid DateAndTime octets")]
    BadDateAndTime,
}

/// Transport-level failure of one PDU exchange.
///
/// Timeouts are retryable; everything else aborts the scrape.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("SNMP protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the walk executor may retry this exchange.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Io(_))
    }
}

/// A scrape-fatal failure: the response carries `up=0` and no samples
/// beyond the operational self-metrics.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}
