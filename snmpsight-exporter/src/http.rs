//! HTTP surface: per-request SNMP scrapes and process self-metrics.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use snmpsight_core::schema::SchemaRegistry;
use snmpsight_core::{Module, collect, failure_families};

use crate::exposition::{CONTENT_TYPE, render};
use crate::stats::ExporterStats;
use crate::transport::{SnmpTransport, normalize_target};

/// Application state shared across handlers; read-only after startup
/// apart from the additive counters.
#[derive(Clone)]
pub struct AppState {
    pub modules: Arc<HashMap<String, Module>>,
    pub registry: Arc<SchemaRegistry>,
    pub stats: Arc<ExporterStats>,
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/snmp", get(snmp_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SnmpParams {
    module: String,
    target: String,
}

/// Handler for `GET /snmp?module=<name>&target=<host[:port]>`.
///
/// One request is one scrape; dropping the connection drops the scrape
/// future between PDU exchanges and abandons the in-flight PDU.
async fn snmp_handler(
    State(state): State<AppState>,
    Query(params): Query<SnmpParams>,
) -> Response {
    let Some(module) = state.modules.get(&params.module) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("unknown module '{}'\n", params.module),
        )
            .into_response();
    };

    let Some(address) = normalize_target(&params.target) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("invalid target '{}'\n", params.target),
        )
            .into_response();
    };

    let start = Instant::now();

    let mut transport = match SnmpTransport::connect(&address, &module.walk_params).await {
        Ok(transport) => transport,
        Err(e) => {
            return scrape_failure(&state, &params.target, start, &e.to_string());
        }
    };

    match collect(module, &params.target, &mut transport, &state.registry).await {
        Ok(outcome) => {
            state.stats.record_scrape(&outcome.stats, outcome.up);
            if !outcome.up {
                warn!(
                    module = %params.module,
                    target = %params.target,
                    "scrape returned a partial result"
                );
            }
            exposition_response(&outcome.families)
        }
        Err(e) => scrape_failure(&state, &params.target, start, &e.to_string()),
    }
}

/// Tier-2 failure: the exposition still answers 200 so Prometheus records
/// `up=0` with the operational self-metrics.
fn scrape_failure(state: &AppState, target: &str, start: Instant, error: &str) -> Response {
    state.stats.record_failure();
    warn!(target = %target, error = %error, "scrape failed");

    exposition_response(&failure_families(target, start.elapsed()))
}

fn exposition_response(families: &[snmpsight_common::MetricFamily]) -> Response {
    (
        StatusCode::OK,
        [("content-type", CONTENT_TYPE)],
        render(families),
    )
        .into_response()
}

/// Handler for the `/metrics` endpoint (process self-metrics).
async fn metrics_handler(State(state): State<AppState>) -> Response {
    exposition_response(&state.stats.families())
}

/// Handler for the `/health` endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Serve the router until ctrl-c.
pub async fn serve(state: AppState, listen: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", listen, e))?;

    info!(addr = %listen, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
