//! flowmgrd - OpenFlow Flow Table Manager Daemon
//!
//! Entry point for the flowmgrd daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use openflow_types::{event_names, Dpid, OutboundEvent};
use sonic_flowmgrd::config::DEFAULT_CONFIG_PATH;
use sonic_flowmgrd::rest_api;
use sonic_flowmgrd::{FlowManager, FlowMgrConfig, LocalController, Poller, RequestRouter};

/// OpenFlow flow table manager
#[derive(Debug, Parser)]
#[command(name = "flowmgrd", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Seconds between flow statistics polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// REST API port
    #[arg(long)]
    port: Option<u16>,

    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Register a switch at startup (repeatable)
    #[arg(long = "switch", value_name = "DPID")]
    switches: Vec<Dpid>,
}

impl Cli {
    fn apply(&self, config: &mut FlowMgrConfig) {
        if let Some(secs) = self.poll_interval {
            config.poller.interval_secs = secs;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// Initializes tracing/logging subsystem
fn init_logging(config: &FlowMgrConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

/// Logs outbound events. Encoding them onto switch connections belongs to
/// the OpenFlow transport.
async fn drain_outbound(mut outbound: mpsc::UnboundedReceiver<OutboundEvent>) {
    while let Some(event) = outbound.recv().await {
        match serde_json::to_string(&event.message) {
            Ok(body) => debug!(
                event = %event.name,
                dpid = %event.destination.dpid,
                connection = %event.destination.id,
                %body,
                "Outbound event"
            ),
            Err(e) => error!(event = %event.name, error = %e, "Failed to encode outbound event"),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = FlowMgrConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&config)?;
    info!("--- Starting flowmgrd ---");

    let (controller, outbound) = LocalController::new();
    for dpid in &cli.switches {
        controller.connect(*dpid);
    }
    let replies = controller.subscribe(event_names::IN_STATS_REPLY);

    let controller = Arc::new(controller);
    let manager = Arc::new(FlowManager::new(Arc::clone(&controller)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(drain_outbound(outbound));
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.listen(replies).await });
    }

    let poller = config.poller.enabled.then(|| {
        Poller::new(Arc::clone(&manager), config.poll_interval()).spawn(shutdown_rx.clone())
    });

    let server = if config.api.enabled {
        let addr = config.api_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding REST API to {}", addr))?;
        info!(%addr, "REST API listening");

        let app = rest_api::router(Arc::new(RequestRouter::new(Arc::clone(&manager))));
        let mut shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = poller {
        handle.await.context("poller task")?;
    }
    if let Some(handle) = server {
        handle.await.context("REST API task")??;
    }

    info!("flowmgrd shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("flowmgrd failed: {:#}", e);
            eprintln!("flowmgrd: {:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
