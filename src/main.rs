//! ASN filtering gateway.
//!
//! ```text
//!     Client Request          ┌──────────────────────────────────────────────┐
//!     ───────────────────────▶│  request id → trace → asn filter → forward   │──▶ Upstream
//!                             │                          │                   │
//!                             │                   403 (enforce mode)         │
//!                             └──────────────────────────────────────────────┘
//!                                     ▲                ▲              ▲
//!                               config watcher    db refresher     SIGHUP
//!                                     └──────── ReloadSignal ────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use asn_filter::config::loader::load_or_default;
use asn_filter::config::watcher::ConfigWatcher;
use asn_filter::lifecycle::{signals, Shutdown};
use asn_filter::observability::{logging, metrics};
use asn_filter::refresh::DatabaseRefresher;
use asn_filter::security::{AsnFilter, FilterError, FilterHandle};
use asn_filter::GatewayServer;

#[derive(Parser)]
#[command(name = "asn-filter")]
#[command(about = "HTTP gateway that admits or denies requests by client ASN", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Resolve an IP against the configured database, print the result and exit.
    #[arg(long, value_name = "IP")]
    lookup: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    tracing::info!("asn-filter v{} starting", env!("CARGO_PKG_VERSION"));

    let filter = AsnFilter::new(&config.filter)?;

    if let Some(ip) = cli.lookup {
        print_lookup(&filter, &ip)?;
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        state = ?filter.state(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handle: FilterHandle = Arc::new(ArcSwap::from_pointee(filter));
    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();

    // Kept alive for the lifetime of the process.
    let _watcher = match &cli.config {
        Some(path) => match ConfigWatcher::new(path, reload_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                None
            }
        },
        None => None,
    };

    if config.refresh.enabled {
        let refresher = DatabaseRefresher::new(config.refresh.clone(), config.filter.database_path.clone())?
            .with_reload_channel(reload_tx.clone());
        tokio::spawn(refresher.run(shutdown.subscribe()));
    }

    tokio::spawn(signals::listen(shutdown.clone(), reload_tx));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config, handle)?;
    server.run(listener, reload_rx, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_lookup(filter: &AsnFilter, ip: &str) -> Result<(), Box<dyn std::error::Error>> {
    let output = match filter.check_ip(ip) {
        Ok(c) => serde_json::json!({
            "ip": c.ip,
            "asn": c.record.asn,
            "organization": c.record.organization,
            "decision": "allow",
        }),
        Err(FilterError::NotAllowed { ip, record }) => serde_json::json!({
            "ip": ip,
            "asn": record.asn,
            "organization": record.organization,
            "decision": "deny",
        }),
        Err(e) => serde_json::json!({
            "ip": ip,
            "error": e.to_string(),
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
