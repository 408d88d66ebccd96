//! Decoding and re-encoding of table index suffixes.
//!
//! A returned OID is split into `(object prefix, index suffix)`; the
//! suffix is then peeled front to back, one typed index per schema entry.
//! The decoded values double as join keys: the lookup engine re-encodes
//! them with [`encode_indexes`], which is the exact inverse of
//! [`decode_indexes`] for in-range values.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::IndexError;
use crate::hints::apply_display_hint;
use crate::module::{IndexSpec, MetricType};
use crate::oid::Oid;
use crate::render::default_octet_text;

/// INET address family sub-identifiers from the InetAddressType enum.
const ADDRESS_FAMILY_IPV4: i64 = 1;
const ADDRESS_FAMILY_IPV6: i64 = 2;

/// A typed index value peeled off a suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    Integer(u32),
    Bytes(Vec<u8>),
    Oid(Oid),
    IpV4(Ipv4Addr),
    IpV6(Ipv6Addr),
}

/// One decoded index: its label name, typed value and rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIndex {
    pub name: String,
    pub value: IndexValue,
    pub label: String,
}

/// Rendering context shared by all indexes of one metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexContext<'a> {
    /// Resolved DISPLAY-HINT of the owning metric, applied to
    /// octet-string indexes.
    pub hint: Option<&'a str>,

    /// Enum labels of the owning metric, applied to EnumAsInfo indexes.
    pub enum_values: Option<&'a HashMap<i64, String>>,
}

/// Decode an index suffix against an ordered index schema.
///
/// Sub-identifiers left over after the last index are ignored; scalar
/// instances carry a trailing `.0` that no schema entry claims.
pub fn decode_indexes(
    suffix: &Oid,
    specs: &[IndexSpec],
    ctx: IndexContext<'_>,
) -> Result<Vec<DecodedIndex>, IndexError> {
    let mut rest = suffix.subids();
    let mut decoded: Vec<DecodedIndex> = Vec::with_capacity(specs.len());

    for (pos, spec) in specs.iter().enumerate() {
        let is_last = pos == specs.len() - 1;
        let value = peel_index(&mut rest, spec, is_last, &decoded)?;
        let label = render_index_label(&value, spec, ctx);
        decoded.push(DecodedIndex {
            name: spec.labelname.clone(),
            value,
            label,
        });
    }

    Ok(decoded)
}

fn peel_index(
    rest: &mut &[u32],
    spec: &IndexSpec,
    is_last: bool,
    decoded: &[DecodedIndex],
) -> Result<IndexValue, IndexError> {
    let name = spec.labelname.as_str();

    if spec.index_type.is_integer_index() {
        let v = take(rest, 1, name)?[0];
        return Ok(IndexValue::Integer(v));
    }

    if spec.index_type.is_octet_index() {
        let bytes = if spec.fixed_size > 0 {
            subids_to_bytes(take(rest, spec.fixed_size as usize, name)?, name)?
        } else if spec.implied && is_last {
            let all = std::mem::take(rest);
            subids_to_bytes(all, name)?
        } else {
            let len = take(rest, 1, name)?[0];
            if len as usize > rest.len() {
                return Err(IndexError::BadLength(name.to_string(), len));
            }
            subids_to_bytes(take(rest, len as usize, name)?, name)?
        };
        return Ok(IndexValue::Bytes(bytes));
    }

    match spec.index_type {
        MetricType::ObjectIdentifier => {
            let len = take(rest, 1, name)?[0];
            if len as usize > rest.len() {
                return Err(IndexError::BadLength(name.to_string(), len));
            }
            let subids = take(rest, len as usize, name)?;
            Ok(IndexValue::Oid(Oid::from_subids(subids.to_vec())))
        }
        MetricType::InetAddressIPv4 => peel_address(rest, name, 4),
        MetricType::InetAddressIPv6 => peel_address(rest, name, 16),
        MetricType::InetAddress | MetricType::InetAddressMissingSize => {
            // The preceding InetAddressType index selects the width.
            let family = decoded
                .last()
                .and_then(|d| match d.value {
                    IndexValue::Integer(v) => Some(i64::from(v)),
                    _ => None,
                })
                .ok_or_else(|| IndexError::MissingAddressType(name.to_string()))?;
            match family {
                ADDRESS_FAMILY_IPV4 => peel_address(rest, name, 4),
                ADDRESS_FAMILY_IPV6 => peel_address(rest, name, 16),
                other => Err(IndexError::UnknownAddressFamily(name.to_string(), other)),
            }
        }
        // Remaining types peel like a single integer.
        _ => {
            let v = take(rest, 1, name)?[0];
            Ok(IndexValue::Integer(v))
        }
    }
}

fn peel_address(rest: &mut &[u32], name: &str, width: usize) -> Result<IndexValue, IndexError> {
    let bytes = subids_to_bytes(take(rest, width, name)?, name)?;
    if width == 4 {
        let octets: [u8; 4] = bytes.try_into().unwrap_or_default();
        Ok(IndexValue::IpV4(Ipv4Addr::from(octets)))
    } else {
        let octets: [u8; 16] = bytes.try_into().unwrap_or_default();
        Ok(IndexValue::IpV6(Ipv6Addr::from(octets)))
    }
}

fn take<'a>(rest: &mut &'a [u32], count: usize, name: &str) -> Result<&'a [u32], IndexError> {
    if rest.len() < count {
        return Err(IndexError::ShortSuffix(name.to_string()));
    }
    let (head, tail) = rest.split_at(count);
    *rest = tail;
    Ok(head)
}

fn subids_to_bytes(subids: &[u32], name: &str) -> Result<Vec<u8>, IndexError> {
    let mut bytes = Vec::with_capacity(subids.len());
    for &subid in subids {
        let byte = u8::try_from(subid)
            .map_err(|_| IndexError::ByteOutOfRange(name.to_string(), subid))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

fn render_index_label(value: &IndexValue, spec: &IndexSpec, ctx: IndexContext<'_>) -> String {
    match value {
        IndexValue::Integer(v) => {
            if spec.index_type == MetricType::EnumAsInfo
                && let Some(label) = ctx
                    .enum_values
                    .and_then(|enums| enums.get(&i64::from(*v)))
            {
                return label.clone();
            }
            v.to_string()
        }
        IndexValue::Bytes(bytes) => {
            if let Some(hint) = ctx.hint
                && let Some(text) = apply_display_hint(hint, bytes)
            {
                return text;
            }
            default_octet_text(spec.index_type, bytes)
        }
        IndexValue::Oid(oid) => oid.to_string(),
        IndexValue::IpV4(addr) => addr.to_string(),
        IndexValue::IpV6(addr) => addr.to_string(),
    }
}

/// Re-encode decoded indexes into an OID suffix.
///
/// Inverse of [`decode_indexes`]: variable octet strings regain their
/// length prefix, implied and fixed variants emit bytes directly, INET
/// addresses expand to their declared width.
pub fn encode_indexes<'a, I>(pairs: I) -> Vec<u32>
where
    I: IntoIterator<Item = (&'a IndexSpec, &'a IndexValue)>,
{
    let mut suffix = Vec::new();

    for (spec, value) in pairs {
        match value {
            IndexValue::Integer(v) => suffix.push(*v),
            IndexValue::Bytes(bytes) => {
                if spec.fixed_size == 0 && !spec.implied {
                    suffix.push(bytes.len() as u32);
                }
                suffix.extend(bytes.iter().map(|&b| u32::from(b)));
            }
            IndexValue::Oid(oid) => {
                suffix.push(oid.len() as u32);
                suffix.extend_from_slice(oid.subids());
            }
            IndexValue::IpV4(addr) => {
                suffix.extend(addr.octets().iter().map(|&b| u32::from(b)));
            }
            IndexValue::IpV6(addr) => {
                suffix.extend(addr.octets().iter().map(|&b| u32::from(b)));
            }
        }
    }

    suffix
}
