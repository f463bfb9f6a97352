// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP server of the collector.
//!
//! Mounts the ingest endpoint and the query surface on an Axum router. The
//! server runs in a background task and is controlled through a handle with
//! graceful shutdown. Instrumented pages post cross-origin, so the router
//! carries a permissive CORS layer.

use axum::{
    extract::{Json as JsonExtract, Query, State},
    response::Json as JsonResponse,
    routing::{get, post},
    Router,
};
use eyre::Result;
use serde_json::json;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use typetrace_common::BatchRecord;

use crate::error::CollectorError;
use crate::query::{
    adhoc::{self, QueryRequest, QueryResult},
    annotations::{self, AnnotationCandidate, AnnotationsParams},
    calls::{self, CallRow, CallsParams},
    entities::{self, EntitiesParams, EntityRow},
    enums::{self, EnumCandidate, EnumsParams},
    location::{self, LocationParams, LocationResponse},
    shapes::{self, ShapeRow, ShapesParams},
    stats::{self, Stats},
    Page,
};
use crate::store::Store;

/// Handle to control a running collector server.
#[derive(Debug)]
pub struct CollectorServerHandle {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Shutdown signal sender (consumed when shutting down)
    shutdown_tx: oneshot::Sender<()>,
}

impl CollectorServerHandle {
    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gracefully shut down the collector server
    pub fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("collector server already shut down");
        }
        Ok(())
    }
}

/// Shared request state for Axum handlers.
#[derive(Clone)]
struct CollectorState {
    store: Store,
}

/// The collector server: ingest plus the read-only query surface.
pub struct CollectorServer {
    store: Store,
}

impl CollectorServer {
    /// Create a server over an open store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Start the server on the given port (0 picks a free one).
    pub async fn start_on_port(self, port: u16) -> Result<CollectorServerHandle> {
        let app = router(self.store);

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("collector server failed");
        });

        info!("collector server started on {}", actual_addr);

        Ok(CollectorServerHandle { addr: actual_addr, shutdown_tx })
    }
}

/// Build the collector router over a store.
pub fn router(store: Store) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats_handler))
        .route("/ingest", post(ingest_handler))
        .route("/entities", get(entities_handler))
        .route("/calls", get(calls_handler))
        .route("/location", get(location_handler))
        .route("/shapes", get(shapes_handler))
        .route("/enums", get(enums_handler))
        .route("/annotations", get(annotations_handler))
        .route("/query", post(query_handler))
        .layer(CorsLayer::permissive())
        .with_state(CollectorState { store })
}

/// Parse an ingest body into batch records.
///
/// The body must be a JSON array; each record is either the positional
/// 4-tuple or the keyed object form.
pub fn parse_batch(body: serde_json::Value) -> Result<Vec<BatchRecord>, CollectorError> {
    if !body.is_array() {
        return Err(CollectorError::BatchMalformed("body is not a JSON array".to_string()));
    }
    serde_json::from_value(body).map_err(|err| CollectorError::BatchMalformed(err.to_string()))
}

async fn health() -> JsonResponse<serde_json::Value> {
    JsonResponse(json!({
        "status": "healthy",
        "service": "typetrace-collector",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn stats_handler(
    State(state): State<CollectorState>,
) -> Result<JsonResponse<Stats>, CollectorError> {
    Ok(JsonResponse(stats::stats(&state.store)?))
}

async fn ingest_handler(
    State(state): State<CollectorState>,
    JsonExtract(body): JsonExtract<serde_json::Value>,
) -> Result<JsonResponse<serde_json::Value>, CollectorError> {
    let records = parse_batch(body)?;
    let summary = state.store.ingest(records)?;
    Ok(JsonResponse(json!({
        "status": "ok",
        "records": summary.records,
        "values": summary.values,
    })))
}

async fn entities_handler(
    State(state): State<CollectorState>,
    Query(params): Query<EntitiesParams>,
) -> Result<JsonResponse<Page<EntityRow>>, CollectorError> {
    Ok(JsonResponse(entities::entities(&state.store, &params)?))
}

async fn calls_handler(
    State(state): State<CollectorState>,
    Query(params): Query<CallsParams>,
) -> Result<JsonResponse<Page<CallRow>>, CollectorError> {
    Ok(JsonResponse(calls::calls(&state.store, &params)?))
}

async fn location_handler(
    State(state): State<CollectorState>,
    Query(params): Query<LocationParams>,
) -> Result<JsonResponse<LocationResponse>, CollectorError> {
    Ok(JsonResponse(location::location(&state.store, &params)?))
}

async fn shapes_handler(
    State(state): State<CollectorState>,
    Query(params): Query<ShapesParams>,
) -> Result<JsonResponse<Page<ShapeRow>>, CollectorError> {
    Ok(JsonResponse(shapes::shapes(&state.store, &params)?))
}

async fn enums_handler(
    State(state): State<CollectorState>,
    Query(params): Query<EnumsParams>,
) -> Result<JsonResponse<Page<EnumCandidate>>, CollectorError> {
    Ok(JsonResponse(enums::enums(&state.store, &params)?))
}

async fn annotations_handler(
    State(state): State<CollectorState>,
    Query(params): Query<AnnotationsParams>,
) -> Result<JsonResponse<Page<AnnotationCandidate>>, CollectorError> {
    Ok(JsonResponse(annotations::annotations(&state.store, &params)?))
}

async fn query_handler(
    State(state): State<CollectorState>,
    JsonExtract(request): JsonExtract<QueryRequest>,
) -> Result<JsonResponse<QueryResult>, CollectorError> {
    Ok(JsonResponse(adhoc::execute(&state.store, &request)?))
}
