//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default location of the GeoLite2 ASN database.
pub const DEFAULT_DATABASE_PATH: &str = "GeoLite2-ASN.mmdb";

/// Default header carrying the client IP.
pub const DEFAULT_HEADER: &str = "x-real-ip";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Upstream service that filtered requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// ASN filter settings.
    pub filter: FilterConfig,

    /// Database refresh settings.
    pub refresh: RefreshConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            request_timeout_secs: 30,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Upstream request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// What to do with a request whose ASN is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Log and count the denial, forward the request anyway.
    #[default]
    Observe,
    /// Answer 403 with an empty body; the upstream is never called.
    Enforce,
}

/// ASN filter configuration.
///
/// `allowed_asns` and `disallowed_asns` are mutually exclusive.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Instance name used in logs.
    pub name: String,

    /// Path to the MMDB ASN database.
    pub database_path: PathBuf,

    /// ASNs (decimal strings) that are admitted; everything else is denied.
    pub allowed_asns: Vec<String>,

    /// ASNs (decimal strings) that are denied; everything else is admitted.
    pub disallowed_asns: Vec<String>,

    /// When false the filter forwards everything without looking anything up.
    pub enabled: bool,

    /// Request header holding the client IP.
    pub header: String,

    /// Action taken on a denied request.
    pub enforcement: EnforcementMode,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            name: "asn-filter".to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            allowed_asns: Vec::new(),
            disallowed_asns: Vec::new(),
            enabled: true,
            header: DEFAULT_HEADER.to_string(),
            enforcement: EnforcementMode::Observe,
        }
    }
}

/// Periodic database download settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Enable the background refresher.
    pub enabled: bool,

    /// MaxMind license key. Never logged.
    pub license_key: Option<String>,

    /// Database edition to download.
    pub edition_id: String,

    /// Download endpoint.
    pub download_url: String,

    /// Interval between refreshes in seconds.
    pub interval_secs: u64,

    /// HTTP timeout for a single download in seconds.
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            license_key: None,
            edition_id: "GeoLite2-ASN".to_string(),
            download_url: "https://download.maxmind.com/app/geoip_download".to_string(),
            interval_secs: 24 * 60 * 60,
            timeout_secs: 120,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
