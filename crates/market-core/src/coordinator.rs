//! Coordinator node - serializes inbound messages and owns the trade log
//!
//! Every `receive` runs under one mutex: the clock merge and the routing
//! step that follows it form a single critical section, so concurrent
//! senders are strictly ordered and each handler sees a fully merged clock.
//! Snapshots take the same lock only long enough to copy the log tail.

use crate::clock::LogicalClock;
use crate::config::CoordinatorConfig;
use crate::detector::FailureDetector;
use crate::error::ConfigError;
use crate::instrumentation::Instrumentation;
use crate::liveness::LivenessTracker;
use crate::types::{
    Delivery, DropReason, Message, MessageKind, NodeId, NodeStatus, Snapshot, Trade,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// State mutated only inside the receive critical section
struct Ledger {
    clock: LogicalClock,
    trades: VecDeque<Trade>,
    /// Trades ever recorded, including evicted ones
    recorded: u64,
}

/// Central market node
pub struct CoordinatorNode {
    node_id: NodeId,
    config: CoordinatorConfig,
    ledger: Mutex<Ledger>,
    liveness: Arc<LivenessTracker>,
    instrumentation: Arc<dyn Instrumentation>,
}

impl CoordinatorNode {
    /// Create a new coordinator; the config is validated up front
    pub fn new(
        config: CoordinatorConfig,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let node = Self {
            node_id: config.node_id.clone(),
            ledger: Mutex::new(Ledger {
                clock: LogicalClock::new(),
                trades: VecDeque::with_capacity(config.snapshot_trades),
                recorded: 0,
            }),
            liveness: Arc::new(LivenessTracker::new()),
            instrumentation,
            config,
        };

        node.instrumentation
            .node_status_changed(&node.node_id, NodeStatus::Up);
        let started_at = {
            let ledger = node.ledger.lock();
            ledger.clock.tick();
            ledger.clock.read()
        };
        node.instrumentation
            .clock_value_changed(&node.node_id, started_at);

        tracing::info!("Coordinator {} initialized", node.node_id);
        Ok(node)
    }

    /// Process one inbound message
    ///
    /// Never fails: malformed orders and timestamps the clock cannot
    /// absorb are acknowledged as dropped.
    pub fn receive(&self, message: Message) -> Delivery {
        self.instrumentation.message_received(&self.node_id);

        let mut ledger = self.ledger.lock();

        let before = ledger.clock.read();
        let Some(now) = ledger
            .clock
            .try_merge(message.lamport_timestamp, self.config.max_clock_lead)
        else {
            tracing::warn!(
                "Dropping {:?} from {}: timestamp {} is out of range for clock {}",
                message.kind,
                message.sender_id,
                message.lamport_timestamp,
                before
            );
            return Delivery::Dropped {
                reason: DropReason::TimestampOutOfRange,
                lamport_time: before,
            };
        };
        self.instrumentation.clock_value_changed(&self.node_id, now);

        tracing::trace!(
            "Clock {} -> {} on message from {} (LT={})",
            before,
            now,
            message.sender_id,
            message.lamport_timestamp
        );

        match message.kind {
            MessageKind::Order => self.handle_order(&mut ledger, message, now),
            MessageKind::Heartbeat => {
                self.liveness.record_heartbeat(&message.sender_id);
                self.instrumentation
                    .node_status_changed(&message.sender_id, NodeStatus::Up);
                tracing::debug!(
                    "[LT={}] Heartbeat from {} (msg LT={})",
                    now,
                    message.sender_id,
                    message.lamport_timestamp
                );
                Delivery::HeartbeatRecorded { lamport_time: now }
            }
        }
    }

    fn handle_order(&self, ledger: &mut Ledger, message: Message, now: u64) -> Delivery {
        let Some(order) = message.payload else {
            tracing::debug!("Dropping ORDER without payload from {}", message.sender_id);
            return Delivery::Dropped {
                reason: DropReason::MissingPayload,
                lamport_time: now,
            };
        };

        if let Err(e) = order.validate() {
            tracing::warn!("Dropping invalid order from {}: {}", message.sender_id, e);
            return Delivery::Dropped {
                reason: DropReason::InvalidOrder,
                lamport_time: now,
            };
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            agent_id: order.agent_id,
            symbol: order.symbol,
            quantity: order.quantity,
            price: order.price,
            side: order.side,
            lamport_time: now,
            wall_clock_ms: chrono::Utc::now().timestamp_millis(),
        };
        let trade_id = trade.id;

        tracing::info!(
            "[LT={}] Processed {} {} {} @ {:.2} from {} (msg LT={})",
            now,
            trade.side,
            trade.quantity,
            trade.symbol,
            trade.price,
            trade.agent_id,
            message.lamport_timestamp
        );

        self.instrumentation.trade_recorded(trade.side);

        ledger.trades.push_back(trade);
        ledger.recorded += 1;
        while ledger.trades.len() > self.config.trade_retention {
            ledger.trades.pop_front();
        }

        Delivery::TradeRecorded {
            trade_id,
            lamport_time: now,
        }
    }

    /// Build a point-in-time view for readers
    pub fn snapshot(&self) -> Snapshot {
        let (clock, recent_trades) = {
            let ledger = self.ledger.lock();
            let skip = ledger
                .trades
                .len()
                .saturating_sub(self.config.snapshot_trades);
            let trades: Vec<Trade> = ledger.trades.iter().skip(skip).cloned().collect();
            (ledger.clock.read(), trades)
        };

        Snapshot {
            node_id: self.node_id.clone(),
            node_status: NodeStatus::Up,
            clock,
            recent_trades,
            peer_statuses: self.liveness.statuses(self.config.peer_timeout()),
        }
    }

    /// Current logical time (serialized with receives)
    pub fn current_time(&self) -> u64 {
        self.ledger.lock().clock.read()
    }

    /// Trades ever recorded, including ones evicted by retention
    pub fn trade_count(&self) -> u64 {
        self.ledger.lock().recorded
    }

    /// Trades currently held in memory
    pub fn retained_trades(&self) -> usize {
        self.ledger.lock().trades.len()
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn liveness(&self) -> Arc<LivenessTracker> {
        self.liveness.clone()
    }

    /// Failure detector wired to this node's liveness table
    pub fn failure_detector(&self) -> FailureDetector {
        FailureDetector::new(
            self.liveness.clone(),
            self.instrumentation.clone(),
            self.config.detector_interval(),
            self.config.peer_timeout(),
        )
    }
}
