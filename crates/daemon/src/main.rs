// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Entry point: loads configuration, wires the shared registry to every
//! component, and runs until interrupted (§5 "the main loop owns the
//! Registry and every socket; components are handed references, never
//! ownership").

mod client_task;
mod config;
mod error;
mod event_loop;
mod guestchan_task;
mod heartbeat_task;
mod linkmon_task;
mod registry_port;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use maintd_core::clock::SystemClock;
use maintd_core::registry::HostRegistry;
use maintd_core::Event;
use maintd_orchestrator::outbound::{OutboundClient, OutboundConfig};
use maintd_orchestrator::port::InventoryPort;
use maintd_orchestrator::token::TokenManager;
use maintd_orchestrator::{inbound, InboundConfig};

use config::DaemonConfig;
use error::DaemonError;
use registry_port::RegistryPort;

#[derive(Debug, Parser)]
#[command(name = "maintd", about = "node maintenance daemon")]
struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(long, env = "MAINTD_CONFIG", default_value = "/etc/maintd/maintd.toml")]
    config: PathBuf,

    /// Overrides `RUST_LOG` filtering if set.
    #[arg(long, env = "MAINTD_LOG")]
    log: Option<String>,
}

fn init_tracing(cli_log: Option<&str>) {
    let filter = cli_log
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    if let Err(e) = run(cli.config).await {
        error!(error = %e, "maintd exited with a fatal error");
        std::process::exit(1);
    }
}

async fn run(config_path: PathBuf) -> Result<(), DaemonError> {
    let config = DaemonConfig::load(&config_path)?;

    let registry = Arc::new(Mutex::new(HostRegistry::new(SystemClock)));
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let port = Arc::new(RegistryPort::new(
        Arc::clone(&registry),
        event_tx.clone(),
        config.guestchan.channel_dir.clone(),
        std::time::Duration::from_millis(config.guestchan.initial_connect_backoff_ms),
    ));

    let tokens = Arc::new(TokenManager::new(reqwest::Client::new(), config.token.into()));
    tokens.refresh().await.map_err(DaemonError::Orchestrator)?;
    let outbound = Arc::new(OutboundClient::new(reqwest::Client::new(), Arc::clone(&tokens), OutboundConfig::from(config.outbound)));

    let mut tasks = vec![tokio::spawn(event_loop::run(event_rx, Arc::clone(&outbound)))];

    tasks.push(spawn_inbound(Arc::clone(&port) as Arc<dyn InventoryPort>, config.inbound));
    tasks.push(spawn_linkmon(config.linkmon, event_tx.clone()));
    tasks.push(spawn_guestchan(config.guestchan.channel_dir, Arc::clone(&registry), Arc::clone(&port), event_tx.clone(), config.guestchan.hbs_failure_threshold));

    for network in config.heartbeat_agent.networks.clone() {
        if let Some(addr) = config.pulse_addressing.get(network).cloned() {
            tasks.push(spawn_heartbeat(Arc::clone(&registry), event_tx.clone(), network, addr, config.heartbeat_agent.clone()));
        } else {
            tracing::warn!(?network, "no pulse addressing configured for an active agent network, skipping");
        }
    }

    let hostname = maintd_core::host::HostName::from(config.node.hostname.as_str());
    for network in config.heartbeat_client.networks.clone() {
        if let Some(addr) = config.pulse_addressing.get(network).cloned() {
            tasks.push(spawn_client(hostname.clone(), network, addr, config.heartbeat_client.clone(), config.node.ready_event_url.clone()));
        } else {
            tracing::warn!(?network, "no pulse addressing configured for an active client network, skipping");
        }
    }

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal, stopping tasks");
    for task in tasks {
        task.abort();
    }

    Ok(())
}

fn spawn_inbound(port: Arc<dyn InventoryPort>, section: config::InboundSection) -> tokio::task::JoinHandle<()> {
    let bind = section.bind;
    let router = inbound::router(port, InboundConfig::from(section));
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                error!(%bind, error = %e, "inbound http server failed to bind");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await {
            error!(error = %e, "inbound http server exited");
        }
    })
}

fn spawn_linkmon(cfg: maintd_linkmon::LinkmonConfig, events: mpsc::UnboundedSender<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = linkmon_task::run(cfg, events).await {
            error!(error = %e, "link monitor task exited");
        }
    })
}

fn spawn_guestchan(
    channel_dir: PathBuf,
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    port: Arc<RegistryPort>,
    events: mpsc::UnboundedSender<Event>,
    hbs_failure_threshold: u32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = guestchan_task::run_discovery(channel_dir, registry, port, events, hbs_failure_threshold).await {
            error!(error = %e, "guest channel discovery task exited");
        }
    })
}

fn spawn_heartbeat(
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    events: mpsc::UnboundedSender<Event>,
    network: maintd_core::host::PulseNetwork,
    addr: config::PulseAddress,
    agent_config: maintd_heartbeat::AgentConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = heartbeat_task::run_agent_network(registry, events, network, addr, agent_config).await {
            error!(?network, error = %e, "heartbeat agent task exited");
        }
    })
}

fn spawn_client(
    hostname: maintd_core::host::HostName,
    network: maintd_core::host::PulseNetwork,
    addr: config::PulseAddress,
    client_config: maintd_heartbeat::ClientConfig,
    ready_event_url: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = client_task::run_client_network(hostname, network, addr, client_config, ready_event_url).await {
            error!(?network, error = %e, "heartbeat client task exited");
        }
    })
}
