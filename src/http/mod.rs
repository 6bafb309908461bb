//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, limits)
//!     → middleware/asn_block.rs (ASN verdict: pass or 403)
//!     → server.rs forward_handler (upstream request)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::{asn_filter_middleware, protect, ClientAsn};
pub use request::X_REQUEST_ID;
pub use server::{GatewayServer, ServerError, STATUS_PATH};
