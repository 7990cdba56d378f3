//! Core types for orders, trades, messages and snapshots

use crate::error::OrderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of a node (coordinator or agent)
pub type NodeId = String;

/// Identity of a monitored peer
pub type PeerId = String;

/// Unique trade identifier
pub type TradeId = Uuid;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// An order placed by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub agent_id: NodeId,
    pub symbol: String,
    pub quantity: u32,
    pub price: f64,
    pub side: Side,
}

impl Order {
    /// Build a validated order
    pub fn new(
        agent_id: impl Into<NodeId>,
        symbol: impl Into<String>,
        quantity: u32,
        price: f64,
        side: Side,
    ) -> Result<Self, OrderError> {
        let order = Self {
            agent_id: agent_id.into(),
            symbol: symbol.into(),
            quantity,
            price,
            side,
        };
        order.validate()?;
        Ok(order)
    }

    /// Check the order invariants (orders may arrive from remote peers)
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.symbol.is_empty() {
            return Err(OrderError::EmptySymbol);
        }
        if self.quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(OrderError::InvalidPrice(self.price));
        }
        Ok(())
    }
}

/// An executed trade recorded by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub agent_id: NodeId,
    pub symbol: String,
    pub quantity: u32,
    pub price: f64,
    pub side: Side,
    /// Coordinator's logical time after merging the order's message
    pub lamport_time: u64,
    /// Wall-clock time (unix millis) at which the trade was recorded
    pub wall_clock_ms: i64,
}

/// Message kinds on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Order,
    Heartbeat,
}

/// A single delivery from an agent to the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: NodeId,
    pub receiver_id: NodeId,
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Option<Order>,
    pub lamport_timestamp: u64,
}

impl Message {
    /// Order message stamped with the sender's send tick
    pub fn order(sender: &str, receiver: &str, order: Order, timestamp: u64) -> Self {
        Self {
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            kind: MessageKind::Order,
            payload: Some(order),
            lamport_timestamp: timestamp,
        }
    }

    /// Heartbeat message (never carries a payload)
    pub fn heartbeat(sender: &str, receiver: &str, timestamp: u64) -> Self {
        Self {
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            kind: MessageKind::Heartbeat,
            payload: None,
            lamport_timestamp: timestamp,
        }
    }
}

/// Liveness state of a peer as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerState {
    Active,
    Failed,
}

/// Up/down status reported through instrumentation and snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Up,
    Down,
}

impl NodeStatus {
    /// Gauge value (1 = up, 0 = down)
    pub fn as_gauge(self) -> u64 {
        match self {
            NodeStatus::Up => 1,
            NodeStatus::Down => 0,
        }
    }
}

/// Why a delivered message did not produce a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingPayload,
    InvalidOrder,
    /// Timestamp too far ahead of the coordinator clock to merge
    TimestampOutOfRange,
}

/// Acknowledgement returned for every processed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Delivery {
    TradeRecorded { trade_id: TradeId, lamport_time: u64 },
    HeartbeatRecorded { lamport_time: u64 },
    Dropped { reason: DropReason, lamport_time: u64 },
}

impl Delivery {
    /// Coordinator's logical time after processing the message
    pub fn lamport_time(&self) -> u64 {
        match self {
            Delivery::TradeRecorded { lamport_time, .. }
            | Delivery::HeartbeatRecorded { lamport_time }
            | Delivery::Dropped { lamport_time, .. } => *lamport_time,
        }
    }
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node_id: NodeId,
    pub node_status: NodeStatus,
    /// Coordinator's logical time when the trades were copied
    pub clock: u64,
    /// Most recent trades, oldest first
    pub recent_trades: Vec<Trade>,
    pub peer_statuses: BTreeMap<PeerId, PeerState>,
}

impl Snapshot {
    /// Peers currently reported as failed
    pub fn failed_peers(&self) -> Vec<&PeerId> {
        self.peer_statuses
            .iter()
            .filter(|(_, state)| **state == PeerState::Failed)
            .map(|(peer, _)| peer)
            .collect()
    }
}
