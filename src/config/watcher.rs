//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself so that
//! editors and deploy tools that replace the file by rename are still seen.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::lifecycle::ReloadSignal;

/// Publishes a validated [`ReloadSignal::Config`] whenever the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    reload_tx: mpsc::UnboundedSender<ReloadSignal>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, reload_tx: mpsc::UnboundedSender<ReloadSignal>) -> Self {
        Self {
            path: path.to_path_buf(),
            reload_tx,
        }
    }

    /// Start watching. Events are delivered on notify's own thread; the
    /// returned watcher stops when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let path = self.path.clone();
        let tx = self.reload_tx;
        let handler = move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Config watch error");
                    return;
                }
            };

            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }
            let touches_config = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !touches_config {
                return;
            }

            match load_config(&path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Config file changed, reloading filter");
                    let _ = tx.send(ReloadSignal::Config(Box::new(config)));
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Rejected new config. Keeping current configuration.");
                }
            }
        };

        let mut watcher = RecommendedWatcher::new(handler, Config::default().with_poll_interval(Duration::from_secs(2)))?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}
