//! Market Core - Lamport-ordered trading venue
//!
//! This crate provides the coordination core for the simulated venue:
//! - Lamport logical clocks for causal ordering across agents
//! - A coordinator node that serializes inbound orders and heartbeats
//! - Heartbeat liveness tracking and an edge-triggered failure detector
//! - Trading agents that emit randomized traffic over a transport boundary

pub mod agent;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod instrumentation;
pub mod liveness;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use agent::{AgentExit, TradingAgent};
pub use clock::LogicalClock;
pub use config::{AgentConfig, CoordinatorConfig, MarketConfig};
pub use coordinator::CoordinatorNode;
pub use detector::FailureDetector;
pub use error::{ConfigError, OrderError, TransportError};
pub use instrumentation::{
    Instrumentation, MetricsCollector, MetricsSnapshot, NoopInstrumentation,
};
pub use liveness::LivenessTracker;
pub use transport::{LocalTransport, MarketTransport};
pub use types::*;

/// Identifier the coordinator registers under
pub const COORDINATOR_ID: &str = "market-node-01";

/// Number of trades returned in a snapshot
pub const SNAPSHOT_TRADES: usize = 50;

/// Failure detector poll period in milliseconds
pub const DETECTOR_INTERVAL_MS: u64 = 2_000;

/// Heartbeat silence after which a peer is considered failed
pub const PEER_TIMEOUT_MS: u64 = 10_000;

/// Default number of trades the coordinator retains in memory
pub const TRADE_RETENTION: usize = 10_000;

/// Largest lead an inbound timestamp may have over the coordinator clock
pub const MAX_CLOCK_LEAD: u64 = 1 << 40;
