//! snmp2-backed PDU transport.
//!
//! One session per scrape, dropped on every exit path. The adapter only
//! translates between the core's value model and the wire library; all
//! timeout, retry and containment logic lives in the core's walk
//! executor.

use snmp2::{AsyncSession, Value};

use snmpsight_core::error::TransportError;
use snmpsight_core::module::{SnmpVersion, WalkParams};
use snmpsight_core::walk::PduTransport;
use snmpsight_core::{Oid, SnmpValue, VarBind};

/// A per-scrape SNMP session.
pub struct SnmpTransport {
    session: AsyncSession,
}

impl SnmpTransport {
    /// Open a session to `address` (already normalized to `host:port`).
    ///
    /// SNMPv3 is modeled in configuration but not spoken by this adapter;
    /// a v3 module fails the scrape here.
    pub async fn connect(address: &str, params: &WalkParams) -> Result<Self, TransportError> {
        let community = params.auth.community.as_bytes();

        let session = match params.version {
            SnmpVersion::V1 => AsyncSession::new_v1(address, community, 0)
                .await
                .map_err(|e| TransportError::Protocol(format!("session setup: {:?}", e)))?,
            SnmpVersion::V2c => AsyncSession::new_v2c(address, community, 0)
                .await
                .map_err(|e| TransportError::Protocol(format!("session setup: {:?}", e)))?,
            SnmpVersion::V3 => {
                return Err(TransportError::Unsupported(
                    "SNMPv3 sessions are not supported by this transport".to_string(),
                ));
            }
        };

        Ok(Self { session })
    }
}

impl PduTransport for SnmpTransport {
    async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, TransportError> {
        // The session API is single-OID; the batch still maps onto one
        // logical exchange for the executor's accounting.
        let mut varbinds = Vec::with_capacity(oids.len());
        for oid in oids {
            let wire_oid = to_wire(oid)?;
            let response = self
                .session
                .get(&wire_oid)
                .await
                .map_err(|e| TransportError::Protocol(format!("GET: {:?}", e)))?;
            collect_varbinds(response.varbinds, &mut varbinds)?;
        }
        Ok(varbinds)
    }

    async fn get_next(&mut self, oid: &Oid) -> Result<Vec<VarBind>, TransportError> {
        let wire_oid = to_wire(oid)?;
        let response = self
            .session
            .getnext(&wire_oid)
            .await
            .map_err(|e| TransportError::Protocol(format!("GETNEXT: {:?}", e)))?;

        let mut varbinds = Vec::with_capacity(1);
        collect_varbinds(response.varbinds, &mut varbinds)?;
        Ok(varbinds)
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, TransportError> {
        let wire_oids = oids.iter().map(to_wire).collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&snmp2::Oid> = wire_oids.iter().collect();

        let response = self
            .session
            .getbulk(&refs, 0, max_repetitions)
            .await
            .map_err(|e| TransportError::Protocol(format!("GETBULK: {:?}", e)))?;

        let mut varbinds = Vec::new();
        collect_varbinds(response.varbinds, &mut varbinds)?;
        Ok(varbinds)
    }
}

fn to_wire(oid: &Oid) -> Result<snmp2::Oid<'static>, TransportError> {
    oid.to_string()
        .parse::<snmp2::Oid>()
        .map(|oid| oid.to_owned())
        .map_err(|e| TransportError::Protocol(format!("OID conversion: {:?}", e)))
}

fn collect_varbinds<'a, I>(varbinds: I, out: &mut Vec<VarBind>) -> Result<(), TransportError>
where
    I: IntoIterator<Item = (snmp2::Oid<'a>, Value<'a>)>,
{
    for (oid, value) in varbinds {
        let oid: Oid = oid
            .to_id_string()
            .parse()
            .map_err(|e| TransportError::Protocol(format!("response OID: {}", e)))?;
        out.push(VarBind::new(oid, from_wire(&value)));
    }
    Ok(())
}

fn from_wire(value: &Value<'_>) -> SnmpValue {
    match value {
        Value::Integer(v) => SnmpValue::Integer(*v),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::ObjectIdentifier(oid) => match oid.to_id_string().parse() {
            Ok(oid) => SnmpValue::ObjectIdentifier(oid),
            Err(_) => SnmpValue::Null,
        },
        Value::IpAddress(octets) => SnmpValue::IpAddress(*octets),
        Value::Counter32(v) => SnmpValue::Counter32(*v),
        Value::Unsigned32(v) => SnmpValue::Gauge32(*v),
        Value::Timeticks(v) => SnmpValue::TimeTicks(*v),
        Value::Counter64(v) => SnmpValue::Counter64(*v),
        Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        Value::Null => SnmpValue::Null,
        Value::NoSuchObject => SnmpValue::NoSuchObject,
        Value::NoSuchInstance => SnmpValue::NoSuchInstance,
        Value::EndOfMibView => SnmpValue::EndOfMibView,
        _ => SnmpValue::Null,
    }
}

/// Normalize a `host[:port]` target to `host:port`, bracketing bare IPv6
/// addresses and defaulting to port 161.
pub fn normalize_target(target: &str) -> Option<String> {
    if target.is_empty() {
        return None;
    }

    // Already bracketed IPv6.
    if let Some(rest) = target.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        if host.is_empty() {
            return None;
        }
        return match &rest[end + 1..] {
            "" => Some(format!("[{}]:161", host)),
            port if port.starts_with(':') && port.len() > 1 => Some(target.to_string()),
            _ => None,
        };
    }

    match target.matches(':').count() {
        0 => Some(format!("{}:161", target)),
        1 => {
            let (host, port) = target.split_once(':')?;
            if host.is_empty() || port.is_empty() {
                return None;
            }
            Some(target.to_string())
        }
        // Multiple colons: a bare IPv6 address.
        _ => Some(format!("[{}]:161", target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_target() {
        assert_eq!(
            normalize_target("192.168.1.1"),
            Some("192.168.1.1:161".to_string())
        );
        assert_eq!(
            normalize_target("router:1161"),
            Some("router:1161".to_string())
        );
        assert_eq!(
            normalize_target("2001:db8::1"),
            Some("[2001:db8::1]:161".to_string())
        );
        assert_eq!(
            normalize_target("[2001:db8::1]"),
            Some("[2001:db8::1]:161".to_string())
        );
        assert_eq!(
            normalize_target("[2001:db8::1]:1161"),
            Some("[2001:db8::1]:1161".to_string())
        );
        assert_eq!(normalize_target(""), None);
        assert_eq!(normalize_target("host:"), None);
        assert_eq!(normalize_target("[]:161"), None);
    }
}
