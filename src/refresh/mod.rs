//! ASN database refresh.
//!
//! # Data Flow
//! ```text
//! interval tick
//!     → download {edition}.tar.gz (license key)
//!     → unpack .mmdb → verify it opens
//!     → write sibling temp file → rename over database_path
//!     → ReloadSignal::Database → server rebuilds the filter
//! ```
//!
//! # Design Decisions
//! - Started explicitly by the process, never by filter construction
//! - The file at database_path is always either the old or the new complete database
//! - A failed refresh keeps the current database

pub mod refresher;

pub use refresher::{extract_database, install_database, DatabaseRefresher, RefreshError};
