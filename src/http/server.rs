//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the relay, preflight and health handlers
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener and serve until shutdown
//! - Swap in reloaded configuration without dropping sessions
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::finalize;
use crate::observability::metrics;
use crate::relay::{Relay, RelayQuery, SessionStore, TransportError, UpstreamTransport};
use crate::security::headers::apply_relay_headers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    relay: Arc<ArcSwap<Relay>>,
    /// Transport pinned across reloads (tests, embedding).
    pinned_transport: Option<Arc<dyn UpstreamTransport>>,
}

impl AppState {
    /// Current relay snapshot.
    pub fn relay(&self) -> Arc<Relay> {
        self.relay.load_full()
    }

    /// Rebuild the relay from `config`, keeping the session store.
    pub fn reload(&self, config: RelayConfig) -> Result<(), TransportError> {
        let current = self.relay.load();
        if current.config().relay.path != config.relay.path {
            tracing::warn!(
                current = %current.config().relay.path,
                requested = %config.relay.path,
                "Relay path changes take effect on restart"
            );
        }

        let config = Arc::new(config);
        let sessions = current.sessions().clone();
        let relay = match &self.pinned_transport {
            Some(transport) => Relay::new(config, sessions, transport.clone()),
            None => Relay::from_config(config, sessions)?,
        };
        self.relay.store(Arc::new(relay));
        tracing::info!("Configuration reloaded");
        Ok(())
    }
}

/// HTTP server for the relay.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a server fetching through the configured reqwest transport.
    pub fn new(config: RelayConfig) -> Result<Self, TransportError> {
        let relay = Relay::from_config(Arc::new(config), SessionStore::new())?;
        Ok(Self::from_parts(relay, None))
    }

    /// Create a server fetching through `transport`.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        let relay = Relay::new(Arc::new(config), SessionStore::new(), transport.clone());
        Self::from_parts(relay, Some(transport))
    }

    fn from_parts(relay: Relay, pinned_transport: Option<Arc<dyn UpstreamTransport>>) -> Self {
        Self {
            state: AppState {
                relay: Arc::new(ArcSwap::from_pointee(relay)),
                pinned_transport,
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let path = self.state.relay().config().relay.path.clone();
        Router::new()
            .route(&path, get(relay_handler).options(preflight_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. Configurations arriving on `config_updates` are
    /// swapped in atomically.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.state.relay().config().relay.path,
            "HTTP server starting"
        );

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = state.reload(config) {
                    tracing::error!(error = %e, "Failed to apply reloaded configuration");
                }
            }
        });

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main relay handler.
async fn relay_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let relay = state.relay();
    let query = RelayQuery::from_query_string(raw.as_deref());

    let result = relay.handle(&query, &headers).await;
    let mode = match &result {
        Ok(relayed) => relayed.mode(),
        Err(e) => {
            tracing::warn!(
                request_id = %headers.request_id(),
                kind = e.kind(),
                error = %e,
                "Relay request failed"
            );
            "error"
        }
    };

    let response = finalize(result, &headers, &relay.config().cors);
    metrics::record_request(mode, response.status().as_u16(), start);
    response
}

/// CORS preflight.
async fn preflight_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let relay = state.relay();
    let mut response = match relay.check_origin(&headers) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    };
    apply_relay_headers(response.headers_mut(), headers.get(header::ORIGIN), &relay.config().cors);
    response
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.relay().sessions().len(),
    })
}
