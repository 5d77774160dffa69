//! fleetnoded: control plane of a fleet node.
//!
//! ```text
//!   SIGTERM/SIGINT ──▶ LifecycleManager::start_drain
//!                              │
//!                              ▼
//!   ┌──────────────────── SubsystemSupervisor ─────────────────────┐
//!   │ identity ─▶ attestation ─▶ signing keys ─▶ hot properties    │
//!   │                                                              │
//!   │ listener │ fetcher │ discovery │ health │ workload control   │
//!   │          (shared cancellation, first exit stops all)         │
//!   └──────────────────────────────┬───────────────────────────────┘
//!                                  ▼
//!         drain: health NotServing → workload shutdown → gate drained
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use fleetnode::config::{self, NodeRole};
use fleetnode::fetcher::{FileDataSource, PollingFetcher};
use fleetnode::lifecycle::{signals::spawn_signal_handler, LifecycleManager};
use fleetnode::observability::{logging, metrics, MetricsSink, NoopSink, ObservabilitySink};
use fleetnode::supervisor::{DaemonComponents, FileIdentityManager, SubsystemSupervisor};

#[derive(Parser, Debug)]
#[command(name = "fleetnoded", version, about = "Fleet node control-plane daemon")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = config::load_or_default(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.observability.log_level = level;
    }
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fleetnoded starting");

    if config.node.role == NodeRole::Follower {
        tracing::info!("Not a leader node, exiting");
        return Ok(());
    }

    let sink: Arc<dyn ObservabilitySink> = if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
        Arc::new(MetricsSink)
    } else {
        Arc::new(NoopSink)
    };

    let health_listener = if config.health.enabled {
        Some(TcpListener::bind(&config.health.bind_address).await?)
    } else {
        None
    };

    let fetcher = config.fetcher.source_path.as_ref().map(|path| {
        Arc::new(PollingFetcher::from_config(
            &config.fetcher,
            Arc::new(FileDataSource::new(path)),
            sink.clone(),
        ))
    });

    let identity = FileIdentityManager::from_config(&config.identity)
        .await
        .map(Arc::new);

    let components = DaemonComponents {
        identity,
        fetcher,
        health_listener,
        ..Default::default()
    };

    let lifecycle = Arc::new(LifecycleManager::new(&config.lifecycle));
    spawn_signal_handler(lifecycle.clone());

    let supervisor = SubsystemSupervisor::new(config, lifecycle, components, sink);
    supervisor.run(CancellationToken::new()).await?;

    tracing::info!("fleetnoded stopped");
    Ok(())
}
