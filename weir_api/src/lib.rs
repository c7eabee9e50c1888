// Weir: Policy-Enforcing OpenFlow Controller
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Management API
//!
//! The read-mostly HTTP surface of the controller: topology, flow and statistics snapshots, the
//! derived performance bundle, the cached policy set, and liveness endpoints — all JSON. The one
//! write operation, `POST /network/policies/update`, triggers an immediate policy sync cycle.
//!
//! The controller core is synchronous; this crate owns the only async runtime in the process,
//! spawned on a dedicated thread by the binary. A handler fault turns into a 500 with a JSON
//! error body for that request alone; an unknown datapath id is a 404.

#![deny(missing_docs)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use weir::controller::Controller;
use weir::types::Dpid;
use weir::Stopper;

/// Errors a handler can answer with: a JSON body with the matching status code.
enum ApiError {
    /// The referenced switch is unknown.
    UnknownSwitch(String),
    /// The request failed internally.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSwitch(dpid) => {
                (StatusCode::NOT_FOUND, format!("unknown switch: {}", dpid))
            }
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// Build the Management API router around a shared controller.
pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/v1.0/topology/switches", get(topology_switches))
        .route("/v1.0/topology/links", get(topology_links))
        .route("/v1.0/topology/hosts", get(topology_hosts))
        .route("/stats/switches", get(stats_switches))
        .route("/stats/links", get(topology_links))
        .route("/stats/hosts", get(topology_hosts))
        .route("/stats/flows", get(stats_flows))
        .route("/stats/port/:dpid", get(stats_port))
        .route("/stats/flowentry/:dpid", get(stats_flowentry))
        .route("/stats/flow/", get(stats_flow_summary))
        .route("/api/performance/metrics", get(performance_metrics))
        .route("/network/policies", get(network_policies))
        .route("/network/policies/update", post(network_policies_update))
        .route("/network/status", get(network_status))
        .route("/network/full_status", get(network_full_status))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/debug/discovery", get(debug_discovery))
        .route("/debug/switches", get(debug_switches))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

/// Serve the Management API on `addr` until the stopper fires. Blocking; meant to run on its own
/// thread. The tokio runtime lives and dies inside this call.
pub fn serve(controller: Arc<Controller>, addr: &str, stopper: Stopper) -> weir::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let app = router(controller);
    let addr = addr.to_string();
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Management API listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !stopper.is_stop() {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                info!("Stopping Management API");
            })
            .await?;
        Ok(())
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn parse_dpid(raw: &str) -> Result<Dpid, ApiError> {
    raw.parse::<Dpid>().map_err(|_| ApiError::UnknownSwitch(raw.to_string()))
}

async fn topology_switches(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.switches())
}

async fn topology_links(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.links())
}

async fn topology_hosts(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.hosts())
}

async fn stats_switches(State(c): State<Arc<Controller>>) -> ApiResult {
    let switches: Vec<serde_json::Value> = c
        .switches()
        .into_iter()
        .map(|sw| {
            let ports = c.port_stats(sw.dpid).unwrap_or_default();
            json!({
                "dpid": sw.dpid,
                "connected_at": sw.connected_at,
                "ports": ports,
            })
        })
        .collect();
    Ok(Json(serde_json::Value::Array(switches)))
}

async fn stats_flows(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.all_flows())
}

async fn stats_port(
    State(c): State<Arc<Controller>>,
    Path(dpid): Path<String>,
) -> ApiResult {
    let dpid = parse_dpid(&dpid)?;
    let ports = c.port_stats(dpid).ok_or_else(|| ApiError::UnknownSwitch(dpid.to_string()))?;
    to_value(&ports)
}

async fn stats_flowentry(
    State(c): State<Arc<Controller>>,
    Path(dpid): Path<String>,
) -> ApiResult {
    let dpid = parse_dpid(&dpid)?;
    let flows = c.switch_flows(dpid).ok_or_else(|| ApiError::UnknownSwitch(dpid.to_string()))?;
    to_value(&flows)
}

async fn stats_flow_summary(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.flow_efficiency())
}

async fn performance_metrics(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.performance())
}

async fn network_policies(State(c): State<Arc<Controller>>) -> ApiResult {
    let status = c.status();
    Ok(Json(json!({
        "policies": c.policies(),
        "policy_engine_available": status.policy_engine_available,
        "last_sync": status.last_policy_sync,
    })))
}

async fn network_policies_update(State(c): State<Arc<Controller>>) -> ApiResult {
    // the sync cycle blocks on the Policy Engine; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || c.sync_policies())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match result {
        Ok(count) => Ok(Json(json!({ "synced": true, "policies": count }))),
        Err(e) => {
            warn!("Manual policy sync failed: {}", e);
            Ok(Json(json!({ "synced": false, "error": e.to_string() })))
        }
    }
}

async fn network_status(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.status())
}

async fn network_full_status(State(c): State<Arc<Controller>>) -> ApiResult {
    Ok(Json(json!({
        "status": c.status(),
        "topology": {
            "switches": c.switches(),
            "links": c.links(),
            "hosts": c.hosts(),
        },
        "stats": {
            "performance": c.performance(),
            "flows": c.all_flows(),
        },
        "policies": c.policies(),
    })))
}

async fn status(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.status())
}

async fn health(State(c): State<Arc<Controller>>) -> ApiResult {
    let status = c.status();
    Ok(Json(json!({
        "healthy": true,
        "uptime_secs": status.uptime_secs,
        "switches": status.switches,
        "policies": status.policies,
        "policy_engine_available": status.policy_engine_available,
        "health_score": status.health_score,
    })))
}

async fn debug_discovery(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.debug_discovery())
}

async fn debug_switches(State(c): State<Arc<Controller>>) -> ApiResult {
    to_value(&c.debug_switches())
}
