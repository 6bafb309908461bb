//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use asn_filter::asn::{AsnLookup, AsnRecord, LookupError};
use asn_filter::config::FilterConfig;
use asn_filter::security::{AsnFilter, FilterHandle};
use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;

/// Lookup source backed by a fixed table. Counts every call.
#[derive(Debug, Default)]
pub struct StubLookup {
    records: HashMap<IpAddr, AsnRecord>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub fn new(entries: &[(&str, u32, &str)]) -> Arc<Self> {
        let records = entries
            .iter()
            .map(|(ip, asn, org)| (ip.parse().unwrap(), AsnRecord::new(*asn, *org)))
            .collect();
        Arc::new(Self {
            records,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AsnLookup for StubLookup {
    fn lookup(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records.get(&ip).cloned().ok_or(LookupError::AddressNotFound(ip))
    }
}

/// The IP used throughout the scenarios, resolving to either test ASN.
pub const CLIENT_IP: &str = "188.92.102.22";

/// Stub where [`CLIENT_IP`] belongs to `asn`.
pub fn stub_with_client_asn(asn: u32) -> Arc<StubLookup> {
    StubLookup::new(&[(CLIENT_IP, asn, "Test Network")])
}

/// Build a shared filter handle around a stub lookup.
pub fn filter_handle(config: &FilterConfig, lookup: Arc<StubLookup>) -> FilterHandle {
    let filter = AsnFilter::with_lookup(config, lookup).expect("valid filter config");
    Arc::new(ArcSwap::from_pointee(filter))
}

/// Downstream handler that always answers 418, like a no-op next handler.
pub fn teapot_router() -> Router {
    Router::new()
        .route("/", any(|| async { StatusCode::IM_A_TEAPOT }))
        .route("/{*path}", any(|| async { StatusCode::IM_A_TEAPOT }))
}

/// Start a mock upstream on an ephemeral port that returns a fixed body.
pub async fn start_mock_upstream(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(move || async move { response }))
        .route("/{*path}", any(move || async move { response }));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}
