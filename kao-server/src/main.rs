//! Kao Server
//!
//! A reactive avatar controller for dev streams: GitHub and chat events
//! come in, facial expressions go out to overlay clients over WebSocket
//! and to the motion-capture peer over VMC/OSC.

mod api;
mod config;
mod hub;
mod reactions;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use hub::BroadcastHub;
use kao_core::scheduler;
use kao_core::vmc::{VmcClient, VmcConfig, VmcHandle};
use kao_proto::messages::StatusEvent;
use kao_proto::{WireBody, WireMessage};
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Kao - reactive avatar controller for dev streams
#[derive(Parser, Debug)]
#[command(name = "kao-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./kao-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3001)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Webhook signing secret (overrides the config file)
    #[arg(long, env = "KAO_WEBHOOK_SECRET")]
    webhook_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting kao-server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load(&args.config, args.listen, args.webhook_secret).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = config.server.listen;

    if config.webhook.secret.is_none() {
        tracing::warn!("no webhook secret configured, signature verification is disabled");
    }

    // One flag shuts everything down: the HTTP server, the scheduler
    // actor, and the forwarder tasks.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            shutdown::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        }
    });

    let scheduler = scheduler::spawn(shutdown_rx.clone());
    let hub = Arc::new(BroadcastHub::new());

    let vmc = if config.vmc.enabled {
        let handle = VmcClient::connect(VmcConfig {
            host: config.vmc.host,
            port: config.vmc.port,
            local_port: config.vmc.local_port,
            ..VmcConfig::default()
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to start VMC client: {}", e);
            e
        })?;
        tracing::info!(host = %config.vmc.host, port = config.vmc.port, "VMC client started");
        Some(handle)
    } else {
        tracing::info!("VMC output disabled by config");
        None
    };

    let state = AppState::new(scheduler, hub, vmc.clone(), config.webhook.secret);

    let forwarder = reactions::spawn_change_forwarder(state.clone(), shutdown_rx.clone());
    if let Some(vmc) = vmc.clone() {
        spawn_vmc_status_forwarder(state.clone(), vmc, shutdown_rx.clone());
    }

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_rx).await;

    // The signal task may never have fired (bind error path); flip the
    // flag ourselves so the actors stop.
    let _ = shutdown_tx.send(true);
    if let Some(vmc) = &vmc {
        vmc.disconnect();
    }
    let _ = forwarder.await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Mirror VMC liveness transitions to every overlay client so the
/// dashboard can show when the avatar peer goes dark.
fn spawn_vmc_status_forwarder(
    state: AppState,
    vmc: VmcHandle,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut status_rx = vmc.subscribe_status();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let connected = *status_rx.borrow_and_update();
                    let status = vmc.status();
                    let message = WireMessage::new(WireBody::Status(StatusEvent {
                        connected,
                        client_id: None,
                        host: Some(status.host.to_string()),
                        port: Some(status.port),
                    }));
                    state.hub.broadcast_all(message).await;
                }
            }
        }
    });
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
