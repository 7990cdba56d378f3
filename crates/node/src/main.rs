//! Market Simulator
//!
//! Main entry point for the Lamport-ordered trading venue.
//! Runs the coordinator behind JSON-RPC, a fleet of remote agents, or the
//! whole venue in one process with an in-memory transport.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use market_core::{
    AgentConfig, AgentExit, CoordinatorNode, Instrumentation, LocalTransport, MarketConfig,
    MarketTransport, MetricsCollector, TradingAgent,
};
use market_rpc::{
    HttpRpcServer, RpcClient, RpcContext, DEFAULT_COORDINATOR_URL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RPC_ADDR,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

/// Interval between status summaries in simulate mode
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Node mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Coordinator only - serves JSON-RPC and runs the failure detector
    Coordinator,
    /// Agents only - trade against a remote coordinator
    Agents,
    /// Coordinator and agents in one process
    Simulate,
}

/// Lamport-ordered trading venue simulator
#[derive(Parser, Debug)]
#[command(name = "market-sim")]
#[command(about = "Logical-clock trading venue with heartbeat failure detection", long_about = None)]
struct Args {
    /// Node mode (coordinator, agents or simulate)
    #[arg(long, value_enum, default_value = "simulate")]
    mode: Mode,

    /// HTTP RPC bind address (coordinator mode)
    #[arg(long, default_value = DEFAULT_RPC_ADDR)]
    rpc_addr: String,

    /// Coordinator URL (agents mode)
    #[arg(long, default_value = DEFAULT_COORDINATOR_URL)]
    coordinator_url: String,

    /// Number of trading agents
    #[arg(long, default_value = "3")]
    agents: usize,

    /// Make agent-1 stop sending after a few messages
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    fail_first: bool,

    /// RNG seed for reproducible agent behaviour
    #[arg(long)]
    seed: Option<u64>,

    /// TOML configuration file with [coordinator] and [agent] tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::load(args.config.as_deref())?;

    match args.mode {
        Mode::Coordinator => run_coordinator(args, config).await,
        Mode::Agents => run_agents(args, config).await,
        Mode::Simulate => run_simulate(args, config).await,
    }
}

/// Spawn `count` agents sharing one transport
fn spawn_agents(
    args: &Args,
    config: &AgentConfig,
    coordinator_id: &str,
    transport: Arc<dyn MarketTransport>,
    instrumentation: Arc<dyn Instrumentation>,
    shutdown: &watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<AgentExit>>> {
    let mut handles = Vec::with_capacity(args.agents);
    for i in 1..=args.agents {
        let mut agent = TradingAgent::new(
            format!("agent-{}", i),
            transport.clone(),
            instrumentation.clone(),
            config.clone(),
        )?
        .coordinator_id(coordinator_id)
        .simulate_failure(args.fail_first && i == 1);

        if let Some(seed) = args.seed {
            agent = agent.seed(seed.wrapping_add(i as u64));
        }

        tracing::info!("Starting {}", agent.agent_id());
        handles.push(tokio::spawn(agent.run(shutdown.clone())));
    }
    Ok(handles)
}

/// Wait for every agent and report how each one ended
async fn join_agents(handles: Vec<JoinHandle<AgentExit>>) {
    for (i, result) in futures::future::join_all(handles).await.into_iter().enumerate() {
        match result {
            Ok(exit) => tracing::info!("agent-{} exited: {:?}", i + 1, exit),
            Err(e) => tracing::error!("agent-{} task failed: {}", i + 1, e),
        }
    }
}

/// Bind the RPC listener up front so a busy port fails startup
async fn bind_rpc(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP RPC on {}", addr))
}

/// Run in coordinator mode - serve JSON-RPC and detect failed peers
async fn run_coordinator(args: Args, config: MarketConfig) -> Result<()> {
    let metrics = Arc::new(MetricsCollector::new());
    let node = Arc::new(CoordinatorNode::new(config.coordinator, metrics.clone())?);

    tracing::info!("Starting market coordinator - COORDINATOR MODE");
    tracing::info!("  Node id: {}", node.node_id());
    tracing::info!("  HTTP RPC: {}", args.rpc_addr);
    tracing::info!(
        "  Failure detector: every {}ms, timeout {}ms",
        node.config().detector_interval_ms,
        node.config().peer_timeout_ms
    );

    let listener = bind_rpc(&args.rpc_addr).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let detector = tokio::spawn(node.failure_detector().run(shutdown_rx));

    // Start HTTP RPC server
    let context = Arc::new(RpcContext::new(node.clone()).with_metrics(metrics));
    let http_server = tokio::spawn(async move {
        let server = HttpRpcServer::new(context);
        if let Err(e) = server.serve(listener).await {
            tracing::error!("HTTP RPC server error: {}", e);
        }
    });

    tracing::info!("Coordinator running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = detector.await {
        tracing::error!("Failure detector task failed: {}", e);
    }
    http_server.abort();

    tracing::info!(
        "Coordinator stopped at logical time {} after {} trades",
        node.current_time(),
        node.trade_count()
    );

    Ok(())
}

/// Run in agents mode - trade against a remote coordinator
async fn run_agents(args: Args, config: MarketConfig) -> Result<()> {
    let client = RpcClient::new(&args.coordinator_url, DEFAULT_REQUEST_TIMEOUT)?;

    tracing::info!("Starting market agents - AGENTS MODE");
    tracing::info!("  Coordinator: {}", client.url());
    tracing::info!("  Agents: {}", args.agents);

    let transport: Arc<dyn MarketTransport> = Arc::new(client);
    let metrics = Arc::new(MetricsCollector::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = spawn_agents(
        &args,
        &config.agent,
        &config.coordinator.node_id,
        transport,
        metrics.clone(),
        &shutdown_rx,
    )?;

    tracing::info!("Press Ctrl+C to stop.");

    let all_done = join_agents(handles);
    tokio::pin!(all_done);

    tokio::select! {
        _ = &mut all_done => {
            tracing::info!("All agents have stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down agents...");
            let _ = shutdown_tx.send(true);
            all_done.await;
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        "Agents stopped: {} messages sent, {} heartbeats",
        snapshot.message_sent_total.values().sum::<u64>(),
        snapshot.heartbeat_count_total.values().sum::<u64>()
    );

    Ok(())
}

/// Run in simulate mode - coordinator and agents in one process
async fn run_simulate(args: Args, config: MarketConfig) -> Result<()> {
    tracing::info!("Starting market simulation - SIMULATE MODE");
    tracing::info!("  Agents: {}", args.agents);
    tracing::info!("  Fail first agent: {}", args.fail_first);
    if let Some(seed) = args.seed {
        tracing::info!("  Seed: {}", seed);
    }

    let metrics = Arc::new(MetricsCollector::new());
    let node = Arc::new(CoordinatorNode::new(config.coordinator, metrics.clone())?);
    let transport: Arc<dyn MarketTransport> = Arc::new(LocalTransport::new(node.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let detector = tokio::spawn(node.failure_detector().run(shutdown_rx.clone()));
    let handles = spawn_agents(
        &args,
        &config.agent,
        node.node_id(),
        transport,
        metrics.clone(),
        &shutdown_rx,
    )?;

    // Log venue status periodically
    let status_node = node.clone();
    let mut status_shutdown = shutdown_rx.clone();
    let status = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = status_node.snapshot();
                    tracing::info!(
                        "Clock {}: {} trades recorded, {} peers, failed: {:?}",
                        snapshot.clock,
                        status_node.trade_count(),
                        snapshot.peer_statuses.len(),
                        snapshot.failed_peers()
                    );
                }
                changed = status_shutdown.changed() => {
                    if changed.is_err() || *status_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    tracing::info!("Simulation running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    join_agents(handles).await;
    if let Err(e) = detector.await {
        tracing::error!("Failure detector task failed: {}", e);
    }
    if let Err(e) = status.await {
        tracing::error!("Status task failed: {}", e);
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        "Simulation stopped at logical time {}: {} trades, {} failures detected",
        node.current_time(),
        node.trade_count(),
        snapshot.failure_detected_total
    );

    Ok(())
}
