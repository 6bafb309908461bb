//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload the ASN database
//!
//! Reload (reload.rs):
//!     config watcher / refresher / SIGHUP → ReloadSignal → server rebuilds filter
//! ```

pub mod reload;
pub mod shutdown;
pub mod signals;

pub use reload::ReloadSignal;
pub use shutdown::Shutdown;
