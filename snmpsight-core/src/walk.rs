//! Walk planning and execution.
//!
//! A module's `get` set is fetched in fixed-size GET batches; its `walk`
//! roots are traversed with GETNEXT (v1) or multiplexed GETBULK (v2c/v3),
//! each root keeping an independent cursor so one finished subtree does
//! not terminate the others sharing a PDU.
//!
//! Every exchange runs under the module's per-PDU deadline and is retried
//! on timeout up to `retries - 1` times. A non-timeout protocol error
//! aborts the scrape. Exhausting retries anywhere stops the walk and
//! returns the partial binding map with `healthy` cleared, so completed
//! roots still produce samples while the scrape reports `up=0`.
//!
//! The executor only awaits at PDU exchanges; dropping its future (client
//! disconnect) abandons the in-flight PDU with the transport.

use std::collections::BTreeMap;
use std::future::Future;

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::error::{ScrapeError, TransportError};
use crate::module::{Module, SnmpVersion, WalkParams};
use crate::oid::Oid;
use crate::value::VarBind;

/// OIDs per GET request PDU.
const GET_BATCH_SIZE: usize = 25;

/// Walk rounds budgeted per root when sizing the outer scrape deadline.
const WALK_ROUND_ALLOWANCE: u32 = 50;

/// Counters for one scrape's transport activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Logical PDU exchanges issued.
    pub pdus_sent: u64,

    /// Request packets sent, retries included.
    pub packets_sent: u64,

    /// Retries consumed by timeouts.
    pub retries: u64,

    /// Varbinds received, including out-of-subtree ones.
    pub vars_received: u64,

    /// Duplicate OIDs collapsed last-writer-wins.
    pub duplicates: u64,
}

/// The populated binding map and how the walk went.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// OID-keyed bindings; the BTreeMap keeps ascending OID order for
    /// deterministic emission.
    pub binds: BTreeMap<Oid, VarBind>,

    /// Transport counters.
    pub stats: WalkStats,

    /// False when any root exhausted its retries or the outer deadline
    /// passed; the map is then partial.
    pub healthy: bool,
}

/// One PDU exchange primitive.
///
/// Implementations own a session to a single agent for the lifetime of a
/// scrape; the core never parses or serializes PDUs itself.
pub trait PduTransport {
    /// GET a batch of exact OIDs.
    fn get(
        &mut self,
        oids: &[Oid],
    ) -> impl Future<Output = Result<Vec<VarBind>, TransportError>> + Send;

    /// GETNEXT a single cursor.
    fn get_next(
        &mut self,
        oid: &Oid,
    ) -> impl Future<Output = Result<Vec<VarBind>, TransportError>> + Send;

    /// GETBULK all cursors with the given max-repetitions; responses are
    /// row-major across the requested columns.
    fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> impl Future<Output = Result<Vec<VarBind>, TransportError>> + Send;
}

/// Execute a module's plan against a transport.
pub async fn walk_module<T: PduTransport>(
    module: &Module,
    transport: &mut T,
) -> Result<WalkOutcome, ScrapeError> {
    let params = &module.walk_params;
    let mut outcome = WalkOutcome {
        healthy: true,
        ..WalkOutcome::default()
    };

    let get_batches = module.get.len().div_ceil(GET_BATCH_SIZE.max(1));
    let expected_rounds =
        get_batches as u32 + module.walk.len() as u32 * WALK_ROUND_ALLOWANCE;
    let deadline = Instant::now()
        + params.timeout() * params.retries.max(1) * expected_rounds.max(1);

    // GET phase.
    for batch in module.get.chunks(GET_BATCH_SIZE) {
        let Some(varbinds) =
            exchange(transport, params, deadline, &mut outcome, Request::Get(batch)).await?
        else {
            return Ok(outcome);
        };
        for vb in varbinds {
            if vb.value.is_end_of_walk() {
                debug!(oid = %vb.oid, "GET returned no such instance");
                continue;
            }
            insert(&mut outcome, vb);
        }
    }

    // Walk phase.
    match params.version {
        SnmpVersion::V1 => {
            for root in &module.walk {
                if !walk_root_getnext(transport, params, deadline, root, &mut outcome).await? {
                    return Ok(outcome);
                }
            }
        }
        SnmpVersion::V2c | SnmpVersion::V3 => {
            if !walk_roots_getbulk(transport, params, deadline, &module.walk, &mut outcome)
                .await?
            {
                return Ok(outcome);
            }
        }
    }

    Ok(outcome)
}

/// GETNEXT walk of one subtree root (SNMPv1).
///
/// Returns `false` when the walk must stop early (retries exhausted or
/// deadline passed); `outcome.healthy` is already cleared then.
async fn walk_root_getnext<T: PduTransport>(
    transport: &mut T,
    params: &WalkParams,
    deadline: Instant,
    root: &Oid,
    outcome: &mut WalkOutcome,
) -> Result<bool, ScrapeError> {
    let mut cursor = root.clone();

    loop {
        let Some(varbinds) =
            exchange(transport, params, deadline, outcome, Request::Next(&cursor)).await?
        else {
            return Ok(false);
        };

        let Some(vb) = varbinds.into_iter().next() else {
            return Ok(true);
        };

        if vb.value.is_end_of_walk() || !vb.oid.starts_with(root) {
            return Ok(true);
        }
        if vb.oid <= cursor {
            warn!(root = %root, oid = %vb.oid, "agent OID not increasing, stopping walk");
            return Ok(true);
        }

        cursor = vb.oid.clone();
        insert(outcome, vb);
    }
}

/// Multiplexed GETBULK walk of all roots (SNMPv2c/v3).
async fn walk_roots_getbulk<T: PduTransport>(
    transport: &mut T,
    params: &WalkParams,
    deadline: Instant,
    roots: &[Oid],
    outcome: &mut WalkOutcome,
) -> Result<bool, ScrapeError> {
    // (root, cursor) per still-active subtree.
    let mut active: Vec<(Oid, Oid)> = roots.iter().map(|r| (r.clone(), r.clone())).collect();

    while !active.is_empty() {
        let cursors: Vec<Oid> = active.iter().map(|(_, c)| c.clone()).collect();
        let Some(varbinds) = exchange(
            transport,
            params,
            deadline,
            outcome,
            Request::Bulk(&cursors, params.max_repetitions),
        )
        .await?
        else {
            return Ok(false);
        };

        if varbinds.is_empty() {
            return Ok(true);
        }

        let columns = active.len();
        let mut done = vec![false; columns];

        // Responses are row-major: varbind i answers column i % columns.
        for (i, vb) in varbinds.into_iter().enumerate() {
            let col = i % columns;
            if done[col] {
                continue;
            }
            let (root, cursor) = &mut active[col];

            if vb.value.is_end_of_walk() || !vb.oid.starts_with(root) {
                done[col] = true;
                continue;
            }
            if vb.oid <= *cursor {
                warn!(root = %root, oid = %vb.oid, "agent OID not increasing, stopping walk");
                done[col] = true;
                continue;
            }

            *cursor = vb.oid.clone();
            insert(outcome, vb);
        }

        let mut keep = done.iter().map(|d| !d);
        active.retain(|_| keep.next().unwrap_or(false));
    }

    Ok(true)
}

/// One logical PDU request, replayable across retry attempts.
#[derive(Clone, Copy)]
enum Request<'a> {
    Get(&'a [Oid]),
    Next(&'a Oid),
    Bulk(&'a [Oid], u32),
}

async fn send<T: PduTransport>(
    transport: &mut T,
    request: Request<'_>,
) -> Result<Vec<VarBind>, TransportError> {
    match request {
        Request::Get(oids) => transport.get(oids).await,
        Request::Next(oid) => transport.get_next(oid).await,
        Request::Bulk(oids, max_repetitions) => transport.get_bulk(oids, max_repetitions).await,
    }
}

/// One exchange with per-PDU timeout and retry bookkeeping.
///
/// `Ok(None)` means retries were exhausted or the outer deadline passed:
/// the caller stops and returns the partial outcome.
async fn exchange<T: PduTransport>(
    transport: &mut T,
    params: &WalkParams,
    deadline: Instant,
    outcome: &mut WalkOutcome,
    request: Request<'_>,
) -> Result<Option<Vec<VarBind>>, ScrapeError> {
    outcome.stats.pdus_sent += 1;

    let attempts = params.retries.max(1);
    for attempt in 0..attempts {
        if Instant::now() >= deadline {
            warn!("scrape deadline exceeded, returning partial result");
            outcome.healthy = false;
            return Ok(None);
        }

        outcome.stats.packets_sent += 1;
        if attempt > 0 {
            outcome.stats.retries += 1;
        }

        let result = match timeout(params.timeout(), send(transport, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match result {
            Ok(varbinds) => {
                outcome.stats.vars_received += varbinds.len() as u64;
                return Ok(Some(varbinds));
            }
            Err(e) if e.is_retryable() => {
                debug!(attempt = attempt + 1, error = %e, "PDU exchange failed, retrying");
            }
            Err(e) => return Err(ScrapeError::Transport(e)),
        }
    }

    warn!(retries = attempts, "retries exhausted, returning partial result");
    outcome.healthy = false;
    Ok(None)
}

fn insert(outcome: &mut WalkOutcome, vb: VarBind) {
    if let Some(prev) = outcome.binds.insert(vb.oid.clone(), vb) {
        outcome.stats.duplicates += 1;
        warn!(oid = %prev.oid, "duplicate OID in response, keeping last");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::value::SnmpValue;
    use snmpsight_common::parse_config;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn if_table_transport() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.insert(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(12345));
        mock.insert(oid("1.3.6.1.2.1.2.2.1.10.1"), SnmpValue::Counter32(1000));
        mock.insert(oid("1.3.6.1.2.1.2.2.1.10.2"), SnmpValue::Counter32(2000));
        mock.insert(oid("1.3.6.1.2.1.2.2.1.16.1"), SnmpValue::Counter32(500));
        mock.insert(oid("1.3.6.1.2.1.2.2.1.16.2"), SnmpValue::Counter32(600));
        // A neighbouring subtree that must not leak into the walk.
        mock.insert(oid("1.3.6.1.2.1.3.1.0"), SnmpValue::Integer(1));
        mock
    }

    fn module(json5: &str) -> Module {
        parse_config(json5).unwrap()
    }

    #[tokio::test]
    async fn test_getbulk_walk_two_roots() {
        let mut mock = if_table_transport();
        let module = module(
            r#"{
                walk: ["1.3.6.1.2.1.2.2.1.10", "1.3.6.1.2.1.2.2.1.16"],
                get: ["1.3.6.1.2.1.1.3.0"],
                max_repetitions: 2,
            }"#,
        );

        let outcome = walk_module(&module, &mut mock).await.unwrap();

        assert!(outcome.healthy);
        assert_eq!(outcome.binds.len(), 5);
        assert!(outcome.binds.contains_key(&oid("1.3.6.1.2.1.1.3.0")));
        assert!(outcome.binds.contains_key(&oid("1.3.6.1.2.1.2.2.1.10.2")));
        assert!(outcome.binds.contains_key(&oid("1.3.6.1.2.1.2.2.1.16.2")));
        assert!(!outcome.binds.contains_key(&oid("1.3.6.1.2.1.3.1.0")));
    }

    #[tokio::test]
    async fn test_getnext_walk_v1() {
        let mut mock = if_table_transport();
        let module = module(
            r#"{
                walk: ["1.3.6.1.2.1.2.2.1.10"],
                version: "1",
            }"#,
        );

        let outcome = walk_module(&module, &mut mock).await.unwrap();

        assert!(outcome.healthy);
        assert_eq!(outcome.binds.len(), 2);
        assert_eq!(
            outcome.binds[&oid("1.3.6.1.2.1.2.2.1.10.1")].value,
            SnmpValue::Counter32(1000)
        );
    }

    #[tokio::test]
    async fn test_binds_are_oid_ordered() {
        let mut mock = if_table_transport();
        let module = module(r#"{ walk: ["1.3.6.1.2.1.2.2.1"] }"#);

        let outcome = walk_module(&module, &mut mock).await.unwrap();
        let oids: Vec<&Oid> = outcome.binds.keys().collect();
        let mut sorted = oids.clone();
        sorted.sort();
        assert_eq!(oids, sorted);
    }

    #[tokio::test]
    async fn test_timeout_retry_then_success() {
        let mut mock = if_table_transport();
        mock.timeout_next(1);
        let module = module(
            r#"{
                get: ["1.3.6.1.2.1.1.3.0"],
                retries: 3,
            }"#,
        );

        let outcome = walk_module(&module, &mut mock).await.unwrap();

        assert!(outcome.healthy);
        assert_eq!(outcome.stats.retries, 1);
        assert_eq!(outcome.stats.packets_sent, 2);
        assert_eq!(outcome.binds.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_exhaustion_is_partial_not_fatal() {
        let mut mock = if_table_transport();
        // The GET succeeds, then every later exchange times out.
        mock.timeout_after(1);
        let module = module(
            r#"{
                walk: ["1.3.6.1.2.1.2.2.1.10"],
                get: ["1.3.6.1.2.1.1.3.0"],
                retries: 2,
            }"#,
        );

        let outcome = walk_module(&module, &mut mock).await.unwrap();

        assert!(!outcome.healthy);
        // The completed GET still contributes its binding.
        assert_eq!(outcome.binds.len(), 1);
        assert!(outcome.binds.contains_key(&oid("1.3.6.1.2.1.1.3.0")));
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let mut mock = if_table_transport();
        mock.fail_next(TransportError::Auth("wrong community".to_string()));
        let module = module(r#"{ get: ["1.3.6.1.2.1.1.3.0"] }"#);

        let err = walk_module(&module, &mut mock).await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::Transport(TransportError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_one_root_finishing_does_not_stop_others() {
        let mut mock = MockTransport::new();
        // First root has one binding, second has four.
        mock.insert(oid("1.3.6.1.4.1.1.1"), SnmpValue::Integer(1));
        for i in 1..=4 {
            mock.insert(oid(&format!("1.3.6.1.4.1.2.{}", i)), SnmpValue::Integer(i as i64));
        }
        let module = module(
            r#"{
                walk: ["1.3.6.1.4.1.1", "1.3.6.1.4.1.2"],
                max_repetitions: 2,
            }"#,
        );

        let outcome = walk_module(&module, &mut mock).await.unwrap();

        assert!(outcome.healthy);
        assert_eq!(outcome.binds.len(), 5);
    }

    #[tokio::test]
    async fn test_replayed_walk_is_deterministic() {
        let module = module(r#"{ walk: ["1.3.6.1.2.1.2.2.1"], get: ["1.3.6.1.2.1.1.3.0"] }"#);

        let mut first = if_table_transport();
        let a = walk_module(&module, &mut first).await.unwrap();
        let mut second = if_table_transport();
        let b = walk_module(&module, &mut second).await.unwrap();

        assert_eq!(a.binds, b.binds);
        assert_eq!(a.stats, b.stats);
    }
}
