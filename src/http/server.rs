//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (ASN filter, request ID, tracing, timeout)
//! - Cap in-flight requests across all routes
//! - Bind server to listener
//! - Forward admitted requests to the upstream service
//! - Apply filter reloads while serving

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router, ServiceExt,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::{ConcurrencyLimit, ConcurrencyLimitLayer};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{FilterConfig, GatewayConfig};
use crate::http::middleware::protect;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::ReloadSignal;
use crate::observability::metrics;
use crate::security::asn_filter::{self, FilterHandle, FilterStatus};

/// Path of the filter status endpoint. Not subject to filtering.
pub const STATUS_PATH: &str = "/-/asn-filter/status";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// State for the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
    pub upstream_timeout: Duration,
}

/// HTTP gateway placing the ASN filter in front of one upstream.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    filter: FilterHandle,
}

impl GatewayServer {
    /// Create a new gateway serving through `filter`.
    pub fn new(config: GatewayConfig, filter: FilterHandle) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            client,
            upstream,
            upstream_timeout: Duration::from_secs(config.upstream.timeout_secs),
        };

        let router = Self::build_router(&config, state, filter.clone());
        Ok(Self {
            router,
            config,
            filter,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, filter: FilterHandle) -> Router {
        let forwarded = Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(state);

        Router::new()
            .route(STATUS_PATH, get(status_handler))
            .with_state(filter.clone())
            .merge(protect(forwarded, filter))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, applying reloads as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        reloads: mpsc::UnboundedReceiver<ReloadSignal>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        tokio::spawn(apply_reloads(
            self.filter.clone(),
            self.config.filter.clone(),
            reloads,
        ));

        let service = ServiceExt::<Request<Body>>::into_make_service(self.service());
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The router behind one concurrency limit. Clones share the limit,
    /// separate calls do not.
    pub fn service(&self) -> ConcurrencyLimit<Router> {
        ServiceBuilder::new()
            .layer(ConcurrencyLimitLayer::new(self.config.listener.max_connections))
            .service(self.router.clone())
    }

    /// The router without the concurrency limit.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Rebuild the filter for every reload signal until the channel closes.
async fn apply_reloads(
    handle: FilterHandle,
    mut current: FilterConfig,
    mut reloads: mpsc::UnboundedReceiver<ReloadSignal>,
) {
    while let Some(signal) = reloads.recv().await {
        if let ReloadSignal::Config(config) = signal {
            current = config.filter;
            tracing::info!("Applying new filter configuration (listener and upstream changes need a restart)");
        }

        let handle = handle.clone();
        let config = current.clone();
        match tokio::task::spawn_blocking(move || asn_filter::reload(&handle, &config)).await {
            Ok(Ok(state)) => tracing::info!(state = ?state, "ASN filter reloaded"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to rebuild ASN filter. Keeping current filter."),
            Err(e) => tracing::error!(error = %e, "Filter reload task failed"),
        }
    }
}

async fn status_handler(State(filter): State<FilterHandle>) -> Json<FilterStatus> {
    Json(filter.load().status())
}

/// Forward an admitted request to the upstream.
async fn forward_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let request_id = request_id(request.headers()).to_string();

    let mut uri_parts = request.uri().clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    match Uri::from_parts(uri_parts) {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Cannot build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    }

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        "Forwarding request"
    );

    match tokio::time::timeout(state.upstream_timeout, state.client.request(request)).await {
        Ok(Ok(response)) => {
            metrics::record_upstream(response.status().as_u16());
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, "Upstream timeout");
            metrics::record_upstream(StatusCode::GATEWAY_TIMEOUT.as_u16());
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}
