//! Reload requests shared by the config watcher, the refresher and signals.

use crate::config::GatewayConfig;

/// Asks the server to rebuild its filter.
#[derive(Debug)]
pub enum ReloadSignal {
    /// A new validated configuration; its `[filter]` table replaces the current one.
    Config(Box<GatewayConfig>),
    /// The database file was replaced; rebuild with the current configuration.
    Database,
}
