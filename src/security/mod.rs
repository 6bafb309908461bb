//! ASN filtering subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → extractor.rs (candidate IPs from the configured header)
//!     → asn::lookup (IP → AsnRecord)
//!     → policy.rs (AsnRecord.asn → Allow | Deny)
//!     → asn_filter.rs (Verdict for the request)
//!     → http::middleware::asn_block (act, then forward)
//! ```
//!
//! # Design Decisions
//! - Fail open: anything that cannot be classified is admitted
//! - Configuration is validated once; request handling never mutates it
//! - No cross-request state

pub mod asn_filter;
pub mod error;
pub mod extractor;
pub mod policy;

pub use asn_filter::{AsnFilter, Classification, FilterHandle, FilterState, FilterStatus, Verdict};
pub use error::{FilterError, LookupFailure};
pub use extractor::extract_ips;
pub use policy::{evaluate, AsnPolicy, Decision, PolicyMode};
