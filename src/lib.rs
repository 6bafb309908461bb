//! ASN request filtering for HTTP services.

pub mod asn;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod refresh;
pub mod security;

pub use asn::{AsnLookup, AsnRecord};
pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use security::{AsnFilter, FilterError, FilterHandle, FilterState, Verdict};
