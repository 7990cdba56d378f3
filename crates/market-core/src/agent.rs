//! Trading agent - randomized order and heartbeat traffic
//!
//! Each agent owns its own Lamport clock and ticks it before every send.
//! An agent stops for good when failure simulation trips, when the
//! transport reports the coordinator unreachable, or on external shutdown.

use crate::clock::LogicalClock;
use crate::config::AgentConfig;
use crate::error::{ConfigError, TransportError};
use crate::instrumentation::Instrumentation;
use crate::transport::MarketTransport;
use crate::types::{Delivery, Message, NodeId, NodeStatus, Order, Side};
use crate::COORDINATOR_ID;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::watch;

/// Why an agent loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum AgentExit {
    /// External stop signal
    Shutdown,
    /// Failure simulation stopped all traffic
    SimulatedFailure { sent: u32 },
    /// A send could not complete
    Disconnected { sent: u32, error: TransportError },
}

/// A simulated trader
pub struct TradingAgent {
    agent_id: NodeId,
    coordinator_id: NodeId,
    config: AgentConfig,
    simulate_failure: bool,
    clock: LogicalClock,
    transport: Arc<dyn MarketTransport>,
    instrumentation: Arc<dyn Instrumentation>,
    rng: StdRng,
    sent: u32,
}

impl TradingAgent {
    /// Create an agent; the config is validated up front
    pub fn new(
        agent_id: impl Into<NodeId>,
        transport: Arc<dyn MarketTransport>,
        instrumentation: Arc<dyn Instrumentation>,
        config: AgentConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            agent_id: agent_id.into(),
            coordinator_id: COORDINATOR_ID.to_string(),
            config,
            simulate_failure: false,
            clock: LogicalClock::new(),
            transport,
            instrumentation,
            rng: StdRng::from_entropy(),
            sent: 0,
        })
    }

    /// Stop sending after a randomized number of messages
    pub fn simulate_failure(mut self, enabled: bool) -> Self {
        self.simulate_failure = enabled;
        self
    }

    /// Deterministic randomness (tests, reproducible runs)
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Receiver id stamped on outgoing messages
    pub fn coordinator_id(mut self, id: impl Into<NodeId>) -> Self {
        self.coordinator_id = id.into();
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Run until shutdown, simulated failure, or a transport error
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AgentExit {
        self.instrumentation
            .node_status_changed(&self.agent_id, NodeStatus::Up);

        let failure_threshold = if self.simulate_failure {
            let threshold = self
                .rng
                .gen_range(self.config.failure_after_min..=self.config.failure_after_max);
            tracing::info!(
                "Agent {} will simulate failure after {} messages",
                self.agent_id,
                threshold
            );
            Some(threshold)
        } else {
            None
        };

        loop {
            if *shutdown.borrow() {
                return AgentExit::Shutdown;
            }

            let pause = self
                .rng
                .gen_range(self.config.min_interval()..self.config.max_interval());

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return AgentExit::Shutdown;
                    }
                    continue;
                }
            }

            if let Some(threshold) = failure_threshold {
                if self.sent > threshold {
                    tracing::warn!(
                        "Agent {} is now simulating failure - stopping all messages",
                        self.agent_id
                    );
                    self.instrumentation
                        .node_status_changed(&self.agent_id, NodeStatus::Down);
                    return AgentExit::SimulatedFailure { sent: self.sent };
                }
            }

            let result = if self.rng.gen_bool(self.config.order_probability) {
                self.send_order().await
            } else {
                self.send_heartbeat().await
            };

            if let Err(error) = result {
                tracing::error!(
                    "Agent {} lost connection to {}: {}",
                    self.agent_id,
                    self.coordinator_id,
                    error
                );
                self.instrumentation
                    .node_status_changed(&self.agent_id, NodeStatus::Down);
                return AgentExit::Disconnected {
                    sent: self.sent,
                    error,
                };
            }

            self.sent += 1;
        }
    }

    fn stamp(&self) -> u64 {
        let timestamp = self.clock.tick_for_send();
        self.instrumentation
            .clock_value_changed(&self.agent_id, timestamp);
        timestamp
    }

    fn random_order(&mut self) -> Result<Order, crate::error::OrderError> {
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        let symbol = self.config.symbols[self.rng.gen_range(0..self.config.symbols.len())].clone();
        let quantity = self.rng.gen_range(1..=self.config.max_quantity);
        let price = self
            .rng
            .gen_range(self.config.min_price..self.config.max_price);

        Order::new(self.agent_id.clone(), symbol, quantity, price, side)
    }

    async fn send_order(&mut self) -> Result<Delivery, TransportError> {
        let order = match self.random_order() {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!("Agent {} generated an invalid order: {}", self.agent_id, e);
                return self.send_heartbeat().await;
            }
        };

        let timestamp = self.stamp();
        tracing::debug!(
            "[LT={}] Agent {} -> {}: ORDER {} {} {} @ {:.2}",
            timestamp,
            self.agent_id,
            self.coordinator_id,
            order.side,
            order.quantity,
            order.symbol,
            order.price
        );

        let message = Message::order(&self.agent_id, &self.coordinator_id, order, timestamp);
        let delivery = self.transport.submit(message).await?;
        self.instrumentation.message_sent(&self.agent_id);
        Ok(delivery)
    }

    async fn send_heartbeat(&mut self) -> Result<Delivery, TransportError> {
        let timestamp = self.stamp();
        tracing::debug!(
            "[LT={}] Agent {} -> {}: HEARTBEAT",
            timestamp,
            self.agent_id,
            self.coordinator_id
        );

        let message = Message::heartbeat(&self.agent_id, &self.coordinator_id, timestamp);
        let delivery = self.transport.submit(message).await?;
        self.instrumentation.heartbeat_sent(&self.agent_id);
        self.instrumentation.message_sent(&self.agent_id);
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::{MetricsCollector, NoopInstrumentation};
    use crate::types::{MessageKind, Snapshot};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// Records every message and acknowledges it
    #[derive(Default)]
    struct RecordingTransport {
        messages: Mutex<Vec<Message>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl MarketTransport for RecordingTransport {
        async fn submit(&self, message: Message) -> Result<Delivery, TransportError> {
            let mut messages = self.messages.lock();
            if let Some(limit) = self.fail_after {
                if messages.len() >= limit {
                    return Err(TransportError::Unreachable("connection refused".into()));
                }
            }
            let lamport_time = message.lamport_timestamp;
            messages.push(message);
            Ok(Delivery::HeartbeatRecorded { lamport_time })
        }

        async fn get_state(&self) -> Result<Snapshot, TransportError> {
            Ok(Snapshot {
                node_id: "test".into(),
                node_status: NodeStatus::Up,
                clock: 0,
                recent_trades: Vec::new(),
                peer_statuses: BTreeMap::new(),
            })
        }
    }

    fn fast_config() -> AgentConfig {
        AgentConfig {
            min_interval_ms: 10,
            max_interval_ms: 20,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamps_strictly_increase() {
        let transport = Arc::new(RecordingTransport::default());
        let agent = TradingAgent::new(
            "agent-1",
            transport.clone(),
            Arc::new(NoopInstrumentation),
            fast_config(),
        )
        .unwrap()
        .seed(7);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(agent.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), AgentExit::Shutdown);

        let messages = transport.messages.lock();
        assert!(messages.len() > 50);
        assert_eq!(messages[0].lamport_timestamp, 1);
        assert!(messages
            .windows(2)
            .all(|w| w[1].lamport_timestamp == w[0].lamport_timestamp + 1));
        assert!(messages.iter().all(|m| m.sender_id == "agent-1"));
        assert!(messages.iter().all(|m| m.receiver_id == COORDINATOR_ID));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_shapes() {
        let transport = Arc::new(RecordingTransport::default());
        let agent = TradingAgent::new(
            "agent-3",
            transport.clone(),
            Arc::new(NoopInstrumentation),
            fast_config(),
        )
        .unwrap()
        .seed(11);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(agent.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let messages = transport.messages.lock();
        let config = AgentConfig::default();
        for message in messages.iter() {
            match message.kind {
                MessageKind::Heartbeat => assert!(message.payload.is_none()),
                MessageKind::Order => {
                    let order = message.payload.as_ref().unwrap();
                    assert!(order.validate().is_ok());
                    assert!(config.symbols.contains(&order.symbol));
                    assert!((1..=100).contains(&order.quantity));
                    assert!(order.price >= 10.0 && order.price < 200.0);
                    assert_eq!(order.agent_id, "agent-3");
                }
            }
        }
        assert!(messages.iter().any(|m| m.kind == MessageKind::Order));
        assert!(messages.iter().any(|m| m.kind == MessageKind::Heartbeat));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_failure_stops_sending() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(MetricsCollector::new());
        let agent = TradingAgent::new("agent-1", transport.clone(), metrics.clone(), fast_config())
            .unwrap()
            .simulate_failure(true)
            .seed(3);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let exit = agent.run(shutdown_rx).await;

        let AgentExit::SimulatedFailure { sent } = exit else {
            panic!("unexpected exit: {:?}", exit);
        };
        // threshold is drawn from 5..=9 and the agent stops once sent exceeds it
        assert!((6..=10).contains(&sent));
        assert_eq!(transport.messages.lock().len() as u32, sent);
        assert_eq!(metrics.snapshot().node_status["agent-1"], 0);
        assert_eq!(metrics.snapshot().message_sent_total["agent-1"], sent as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_stops_agent() {
        let transport = Arc::new(RecordingTransport {
            fail_after: Some(4),
            ..Default::default()
        });
        let agent = TradingAgent::new(
            "agent-2",
            transport.clone(),
            Arc::new(NoopInstrumentation),
            fast_config(),
        )
        .unwrap()
        .seed(5);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let exit = agent.run(shutdown_rx).await;

        assert!(matches!(
            exit,
            AgentExit::Disconnected {
                sent: 4,
                error: TransportError::Unreachable(_)
            }
        ));
        assert_eq!(transport.messages.lock().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let config = AgentConfig {
            min_interval_ms: 60_000,
            max_interval_ms: 120_000,
            ..Default::default()
        };
        let transport = Arc::new(RecordingTransport::default());
        let agent =
            TradingAgent::new("agent-1", transport.clone(), Arc::new(NoopInstrumentation), config)
                .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(agent.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown_tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("agent ignored shutdown")
            .unwrap();
        assert_eq!(exit, AgentExit::Shutdown);
        assert!(transport.messages.lock().is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = AgentConfig {
            symbols: Vec::new(),
            ..Default::default()
        };
        let result = TradingAgent::new(
            "agent-1",
            Arc::new(RecordingTransport::default()),
            Arc::new(NoopInstrumentation),
            config,
        );
        assert!(result.is_err());
    }
}
