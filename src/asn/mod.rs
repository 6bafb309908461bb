//! ASN classification subsystem.
//!
//! # Data Flow
//! ```text
//! database_path (MMDB, optionally .zst)
//!     → lookup.rs (open once at construction)
//!     → MaxMindLookup | AbsentLookup (behind the AsnLookup trait)
//!     → lookup(ip) → AsnRecord | LookupError
//! ```
//!
//! # Design Decisions
//! - The database is read fully into memory when opened; lookups never touch disk
//! - A missing or unreadable database is a degraded mode, not a failure
//! - "Address not found" is a normal outcome and is returned as a typed error

pub mod lookup;
pub mod record;

pub use lookup::{open, open_or_absent, AbsentLookup, AsnLookup, LookupError, MaxMindLookup};
pub use record::AsnRecord;
