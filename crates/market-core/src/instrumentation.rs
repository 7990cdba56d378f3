//! Instrumentation hooks
//!
//! Components receive an `Arc<dyn Instrumentation>` at construction and call
//! out to it on every observable event. `MetricsCollector` records them in
//! process so they can be exported or queried over RPC.

use crate::types::{NodeStatus, Side};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observer of coordinator and agent events
pub trait Instrumentation: Send + Sync {
    fn clock_value_changed(&self, node_id: &str, value: u64);
    fn message_received(&self, node_id: &str);
    fn message_sent(&self, node_id: &str);
    fn trade_recorded(&self, side: Side);
    fn heartbeat_sent(&self, agent_id: &str);
    fn peer_marked_failed(&self, peer_id: &str);
    fn node_status_changed(&self, node_id: &str, status: NodeStatus);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn clock_value_changed(&self, _node_id: &str, _value: u64) {}
    fn message_received(&self, _node_id: &str) {}
    fn message_sent(&self, _node_id: &str) {}
    fn trade_recorded(&self, _side: Side) {}
    fn heartbeat_sent(&self, _agent_id: &str) {}
    fn peer_marked_failed(&self, _peer_id: &str) {}
    fn node_status_changed(&self, _node_id: &str, _status: NodeStatus) {}
}

/// Serializable view of collected metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Latest logical clock value per node
    pub lamport_timestamp: BTreeMap<String, u64>,
    /// 1 = up, 0 = down
    pub node_status: BTreeMap<String, u64>,
    pub trade_count_total: BTreeMap<Side, u64>,
    pub heartbeat_count_total: BTreeMap<String, u64>,
    pub message_sent_total: BTreeMap<String, u64>,
    pub message_received_total: BTreeMap<String, u64>,
    pub failure_detected_total: u64,
}

/// In-process metrics registry keyed by node label
#[derive(Debug, Default)]
pub struct MetricsCollector {
    lamport_timestamp: DashMap<String, u64>,
    node_status: DashMap<String, u64>,
    buy_trades: AtomicU64,
    sell_trades: AtomicU64,
    heartbeats: DashMap<String, u64>,
    messages_sent: DashMap<String, u64>,
    messages_received: DashMap<String, u64>,
    failures_detected: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut trade_count_total = BTreeMap::new();
        trade_count_total.insert(Side::Buy, self.buy_trades.load(Ordering::Relaxed));
        trade_count_total.insert(Side::Sell, self.sell_trades.load(Ordering::Relaxed));

        MetricsSnapshot {
            lamport_timestamp: collect(&self.lamport_timestamp),
            node_status: collect(&self.node_status),
            trade_count_total,
            heartbeat_count_total: collect(&self.heartbeats),
            message_sent_total: collect(&self.messages_sent),
            message_received_total: collect(&self.messages_received),
            failure_detected_total: self.failures_detected.load(Ordering::Relaxed),
        }
    }
}

fn collect(map: &DashMap<String, u64>) -> BTreeMap<String, u64> {
    map.iter().map(|r| (r.key().clone(), *r.value())).collect()
}

fn increment(map: &DashMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

impl Instrumentation for MetricsCollector {
    fn clock_value_changed(&self, node_id: &str, value: u64) {
        self.lamport_timestamp.insert(node_id.to_string(), value);
    }

    fn message_received(&self, node_id: &str) {
        increment(&self.messages_received, node_id);
    }

    fn message_sent(&self, node_id: &str) {
        increment(&self.messages_sent, node_id);
    }

    fn trade_recorded(&self, side: Side) {
        match side {
            Side::Buy => self.buy_trades.fetch_add(1, Ordering::Relaxed),
            Side::Sell => self.sell_trades.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn heartbeat_sent(&self, agent_id: &str) {
        increment(&self.heartbeats, agent_id);
    }

    fn peer_marked_failed(&self, _peer_id: &str) {
        self.failures_detected.fetch_add(1, Ordering::Relaxed);
    }

    fn node_status_changed(&self, node_id: &str, status: NodeStatus) {
        self.node_status.insert(node_id.to_string(), status.as_gauge());
    }
}
