//! Value rendering: native SNMP type handlers, user override types and
//! DISPLAY-HINT formatting.
//!
//! Precedence per varbind: enum and bit-field overrides first, then a
//! declared hint (literal or `@mib` resolved through the schema's
//! textual-convention hierarchy), then the type default keyed on the
//! override type and finally on the wire kind.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};

use snmpsight_common::SampleKind;

use crate::error::RenderError;
use crate::hints::apply_display_hint;
use crate::module::{LookupSpec, MetricSpec, MetricType};
use crate::oid::Oid;
use crate::schema::SchemaRegistry;
use crate::value::SnmpValue;

/// Sentinel selecting the schema-carried hint for the metric's OID.
pub const HINT_FROM_MIB: &str = "@mib";

/// The outcome of rendering one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// A numeric sample.
    Number { value: f64, kind: SampleKind },

    /// A string; the collector synthesizes an info sample from it.
    Text(String),

    /// One boolean sample per state (EnumAsStateSet, Bits).
    States(Vec<(String, bool)>),
}

/// Rendering context fixed for the duration of one scrape.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub registry: &'a SchemaRegistry,

    /// Wall clock at scrape entry, Unix seconds.
    pub scrape_start_unix: i64,
}

/// The subset of a metric or lookup spec the renderer consumes.
#[derive(Debug, Clone, Copy)]
pub struct RenderSpec<'a> {
    /// Object root, used for `@mib` hint and schema enum resolution.
    pub oid: &'a Oid,
    pub metric_type: Option<MetricType>,
    pub display_hint: Option<&'a str>,
    pub enum_values: &'a HashMap<i64, String>,
}

impl MetricSpec {
    /// Renderer view of this metric.
    pub fn render_spec(&self) -> RenderSpec<'_> {
        RenderSpec {
            oid: &self.oid,
            metric_type: self.metric_type,
            display_hint: self.display_hint.as_deref(),
            enum_values: &self.enum_values,
        }
    }
}

impl LookupSpec {
    /// Renderer view of one source root of this lookup.
    pub fn render_spec<'a>(&'a self, source: &'a Oid) -> RenderSpec<'a> {
        RenderSpec {
            oid: source,
            metric_type: self.lookup_type,
            display_hint: self.display_hint.as_deref(),
            enum_values: &self.enum_values,
        }
    }
}

/// Render one varbind value.
pub fn render_value(
    spec: &RenderSpec<'_>,
    value: &SnmpValue,
    ctx: &RenderContext<'_>,
) -> Result<Rendered, RenderError> {
    // (1) Enum and bit-field overrides short-circuit everything else.
    match spec.metric_type {
        Some(MetricType::EnumAsInfo) => return render_enum_info(spec, value, ctx),
        Some(MetricType::EnumAsStateSet) => return render_enum_state_set(spec, value, ctx),
        Some(MetricType::Bits) => return render_bits(spec, value, ctx),
        _ => {}
    }

    // (2) A declared hint formats octet values; failure falls through.
    if let Some(declared) = spec.display_hint
        && let Some(bytes) = value.as_bytes()
    {
        let hint = if declared == HINT_FROM_MIB {
            ctx.registry.resolve_hint(spec.oid)
        } else {
            Some(declared)
        };
        if let Some(hint) = hint
            && let Some(text) = apply_display_hint(hint, bytes)
        {
            return Ok(Rendered::Text(text));
        }
    }

    // (3) Type defaults, override type first, wire kind second.
    match spec.metric_type {
        Some(MetricType::DisplayString) => {
            let bytes = value.as_bytes().ok_or(RenderError::Unrenderable)?;
            Ok(Rendered::Text(display_string(bytes)))
        }
        Some(MetricType::PhysAddress48) => {
            let bytes = value.as_bytes().ok_or(RenderError::Unrenderable)?;
            Ok(Rendered::Text(mac_text(bytes)))
        }
        Some(MetricType::OctetString) => {
            let bytes = value.as_bytes().ok_or(RenderError::Unrenderable)?;
            Ok(Rendered::Text(hex_text(bytes)))
        }
        Some(
            MetricType::InetAddress
            | MetricType::InetAddressIPv4
            | MetricType::InetAddressIPv6
            | MetricType::InetAddressMissingSize,
        ) => {
            let bytes = value.as_bytes().ok_or(RenderError::Unrenderable)?;
            Ok(Rendered::Text(inet_text(bytes)))
        }
        Some(MetricType::ObjectIdentifier) => match value {
            SnmpValue::ObjectIdentifier(oid) => Ok(Rendered::Text(oid.to_string())),
            _ => Err(RenderError::Unrenderable),
        },
        Some(MetricType::ParseDateAndTime) => {
            let bytes = value.as_bytes().ok_or(RenderError::BadDateAndTime)?;
            let unix = parse_date_and_time(bytes)?;
            Ok(Rendered::Number {
                value: unix as f64,
                kind: SampleKind::Gauge,
            })
        }
        Some(MetricType::Uptime) => {
            let ticks = value.as_f64().ok_or(RenderError::NotNumeric)?;
            Ok(Rendered::Number {
                value: ctx.scrape_start_unix as f64 - ticks / 100.0,
                kind: SampleKind::Gauge,
            })
        }
        Some(MetricType::Counter) => Ok(Rendered::Number {
            value: value.as_f64().ok_or(RenderError::NotNumeric)?,
            kind: SampleKind::Counter,
        }),
        Some(MetricType::Gauge) | Some(MetricType::Integer) => Ok(Rendered::Number {
            value: value.as_f64().ok_or(RenderError::NotNumeric)?,
            kind: SampleKind::Gauge,
        }),
        // No override: follow the wire kind.
        _ => render_native(value),
    }
}

fn render_native(value: &SnmpValue) -> Result<Rendered, RenderError> {
    match value {
        SnmpValue::Integer(v) => Ok(Rendered::Number {
            value: *v as f64,
            kind: SampleKind::Gauge,
        }),
        SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => Ok(Rendered::Number {
            value: f64::from(*v),
            kind: SampleKind::Gauge,
        }),
        SnmpValue::Counter32(v) => Ok(Rendered::Number {
            value: f64::from(*v),
            kind: SampleKind::Counter,
        }),
        SnmpValue::Counter64(v) => Ok(Rendered::Number {
            value: *v as f64,
            kind: SampleKind::Counter,
        }),
        SnmpValue::OctetString(bytes) => {
            // Printable UTF-8 passes through as text, anything else is
            // exposed as hex.
            match std::str::from_utf8(bytes) {
                Ok(text)
                    if text
                        .chars()
                        .all(|c| !c.is_control() || c == '\n' || c == '\t') =>
                {
                    Ok(Rendered::Text(text.to_string()))
                }
                _ => Ok(Rendered::Text(hex_text(bytes))),
            }
        }
        SnmpValue::ObjectIdentifier(oid) => Ok(Rendered::Text(oid.to_string())),
        SnmpValue::IpAddress(octets) => Ok(Rendered::Text(inet_text(octets))),
        SnmpValue::Opaque(bytes) => Ok(Rendered::Text(hex_text(bytes))),
        SnmpValue::Null
        | SnmpValue::NoSuchObject
        | SnmpValue::NoSuchInstance
        | SnmpValue::EndOfMibView => Err(RenderError::Unrenderable),
    }
}

fn render_enum_info(
    spec: &RenderSpec<'_>,
    value: &SnmpValue,
    ctx: &RenderContext<'_>,
) -> Result<Rendered, RenderError> {
    let v = integer_value(value)?;
    let label = enum_label(spec, ctx, v).unwrap_or_else(|| v.to_string());
    Ok(Rendered::Text(label))
}

fn render_enum_state_set(
    spec: &RenderSpec<'_>,
    value: &SnmpValue,
    ctx: &RenderContext<'_>,
) -> Result<Rendered, RenderError> {
    let v = integer_value(value)?;
    let enums = effective_enums(spec, ctx);

    let mut states: Vec<(String, bool)> = Vec::with_capacity(enums.len() + 1);
    let mut keys: Vec<&i64> = enums.keys().collect();
    keys.sort_unstable();
    let mut matched = false;
    for key in keys {
        let active = *key == v;
        matched |= active;
        states.push((enums[key].clone(), active));
    }
    if !matched {
        // Unknown discriminant still produces exactly one active state.
        states.push((v.to_string(), true));
    }

    Ok(Rendered::States(states))
}

fn render_bits(
    spec: &RenderSpec<'_>,
    value: &SnmpValue,
    ctx: &RenderContext<'_>,
) -> Result<Rendered, RenderError> {
    let bytes = value.as_bytes().ok_or(RenderError::Unrenderable)?;
    let enums = effective_enums(spec, ctx);

    let mut states: Vec<(String, bool)> = Vec::new();
    let mut keys: Vec<&i64> = enums.keys().collect();
    keys.sort_unstable();
    for key in keys {
        states.push((enums[key].clone(), bit_is_set(bytes, *key)));
    }
    // Set bits without a name are still reported.
    for (i, byte) in bytes.iter().enumerate() {
        for bit in 0..8 {
            let pos = (i * 8 + bit) as i64;
            if byte & (0x80 >> bit) != 0 && !enums.contains_key(&pos) {
                states.push((format!("unknown_{}", pos), true));
            }
        }
    }

    Ok(Rendered::States(states))
}

fn bit_is_set(bytes: &[u8], pos: i64) -> bool {
    if pos < 0 {
        return false;
    }
    let byte = (pos / 8) as usize;
    let bit = (pos % 8) as u32;
    byte < bytes.len() && bytes[byte] & (0x80u8 >> bit) != 0
}

fn integer_value(value: &SnmpValue) -> Result<i64, RenderError> {
    match value {
        SnmpValue::Integer(v) => Ok(*v),
        SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
            Ok(i64::from(*v))
        }
        _ => Err(RenderError::NotNumeric),
    }
}

fn enum_label(spec: &RenderSpec<'_>, ctx: &RenderContext<'_>, v: i64) -> Option<String> {
    if let Some(label) = spec.enum_values.get(&v) {
        return Some(label.clone());
    }
    ctx.registry
        .enum_values(spec.oid)
        .and_then(|enums| enums.get(&v))
        .cloned()
}

fn effective_enums<'a>(
    spec: &RenderSpec<'a>,
    ctx: &'a RenderContext<'_>,
) -> &'a HashMap<i64, String> {
    if !spec.enum_values.is_empty() {
        return spec.enum_values;
    }
    static EMPTY: std::sync::LazyLock<HashMap<i64, String>> =
        std::sync::LazyLock::new(HashMap::new);
    ctx.registry.enum_values(spec.oid).unwrap_or(&EMPTY)
}

/// UTF-8 text with everything from the first NUL onward trimmed.
pub(crate) fn display_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Colon-separated uppercase hex pairs.
pub(crate) fn mac_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// `0x` followed by uppercase hex.
pub(crate) fn hex_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// Canonical address text for 4- or 16-byte addresses; other widths are
/// exposed as hex.
pub(crate) fn inet_text(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().unwrap_or_default();
            std::net::Ipv4Addr::from(octets).to_string()
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().unwrap_or_default();
            std::net::Ipv6Addr::from(octets).to_string()
        }
        _ => hex_text(bytes),
    }
}

/// Type-default text for an octet-string index value.
pub(crate) fn default_octet_text(index_type: MetricType, bytes: &[u8]) -> String {
    match index_type {
        MetricType::DisplayString => display_string(bytes),
        MetricType::PhysAddress48 => mac_text(bytes),
        _ => hex_text(bytes),
    }
}

/// RFC 2579 DateAndTime octets to Unix seconds.
///
/// 8 octets are local/unspecified time treated as UTC; 11 octets carry an
/// explicit UTC offset.
fn parse_date_and_time(bytes: &[u8]) -> Result<i64, RenderError> {
    if bytes.len() != 8 && bytes.len() != 11 {
        return Err(RenderError::BadDateAndTime);
    }

    let year = i32::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let month = u32::from(bytes[2]);
    let day = u32::from(bytes[3]);
    let hour = u32::from(bytes[4]);
    let minute = u32::from(bytes[5]);
    let second = u32::from(bytes[6]);

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or(RenderError::BadDateAndTime)?;

    let mut unix = Utc.from_utc_datetime(&naive).timestamp();

    if bytes.len() == 11 {
        let offset = i64::from(bytes[9]) * 3600 + i64::from(bytes[10]) * 60;
        match bytes[8] {
            b'+' => unix -= offset,
            b'-' => unix += offset,
            _ => return Err(RenderError::BadDateAndTime),
        }
    }

    Ok(unix)
}
