//! Scripted in-memory transport for tests.
//!
//! The mock holds an agent's OID tree and answers GET/GETNEXT/GETBULK the
//! way a well-behaved agent would, including row-major GETBULK responses
//! and EndOfMibView padding for exhausted columns. Failure injection
//! covers the retry and partial-failure paths without touching a clock:
//! injected timeouts return immediately.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::error::TransportError;
use crate::oid::Oid;
use crate::value::{SnmpValue, VarBind};
use crate::walk::PduTransport;

/// A replayable fake agent.
#[derive(Debug, Default)]
pub struct MockTransport {
    tree: BTreeMap<Oid, SnmpValue>,
    pending_timeouts: u64,
    timeout_after: Option<u64>,
    fatal: Option<TransportError>,
    successes: u64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate one binding of the fake agent's tree.
    pub fn insert(&mut self, oid: Oid, value: SnmpValue) {
        self.tree.insert(oid, value);
    }

    /// The next `n` exchanges time out, then service resumes.
    pub fn timeout_next(&mut self, n: u64) {
        self.pending_timeouts = n;
    }

    /// After `n` successful exchanges, every further exchange times out.
    pub fn timeout_after(&mut self, n: u64) {
        self.timeout_after = Some(n);
    }

    /// The next exchange fails with the given error.
    pub fn fail_next(&mut self, error: TransportError) {
        self.fatal = Some(error);
    }

    fn gate(&mut self) -> Result<(), TransportError> {
        if let Some(error) = self.fatal.take() {
            return Err(error);
        }
        if self.pending_timeouts > 0 {
            self.pending_timeouts -= 1;
            return Err(TransportError::Timeout);
        }
        if let Some(after) = self.timeout_after
            && self.successes >= after
        {
            return Err(TransportError::Timeout);
        }
        self.successes += 1;
        Ok(())
    }

    fn successor(&self, oid: &Oid) -> Option<VarBind> {
        self.tree
            .range::<Oid, _>((Excluded(oid), Unbounded))
            .next()
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
    }
}

impl PduTransport for MockTransport {
    async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, TransportError> {
        self.gate()?;
        Ok(oids
            .iter()
            .map(|oid| {
                let value = self
                    .tree
                    .get(oid)
                    .cloned()
                    .unwrap_or(SnmpValue::NoSuchInstance);
                VarBind::new(oid.clone(), value)
            })
            .collect())
    }

    async fn get_next(&mut self, oid: &Oid) -> Result<Vec<VarBind>, TransportError> {
        self.gate()?;
        Ok(match self.successor(oid) {
            Some(vb) => vec![vb],
            None => vec![VarBind::new(oid.clone(), SnmpValue::EndOfMibView)],
        })
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, TransportError> {
        self.gate()?;

        // Collect each column's successors, then interleave row-major the
        // way RFC 3416 lays out repetitions.
        let mut columns: Vec<Vec<VarBind>> = Vec::with_capacity(oids.len());
        for oid in oids {
            let mut column = Vec::new();
            let mut cursor = oid.clone();
            for _ in 0..max_repetitions {
                match self.successor(&cursor) {
                    Some(vb) => {
                        cursor = vb.oid.clone();
                        column.push(vb);
                    }
                    None => break,
                }
            }
            columns.push(column);
        }

        let mut varbinds = Vec::new();
        for row in 0..max_repetitions as usize {
            for (col, oid) in oids.iter().enumerate() {
                match columns[col].get(row) {
                    Some(vb) => varbinds.push(vb.clone()),
                    None => varbinds.push(VarBind::new(oid.clone(), SnmpValue::EndOfMibView)),
                }
            }
        }
        Ok(varbinds)
    }
}
