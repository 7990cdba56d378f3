//! Concurrent senders against one coordinator
//!
//! Checks that the merge invariant holds for every delivery when many
//! agents and raw senders hit the coordinator at the same time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    AgentConfig, CoordinatorConfig, CoordinatorNode, Delivery, LocalTransport, MarketTransport,
    Message, NoopInstrumentation, Order, Side, Snapshot, TradingAgent, TransportError,
};

/// (sender, attached timestamp, coordinator time after merge)
type Observation = (String, u64, u64);

/// Forwards to a local transport and records what each delivery observed
struct TapTransport {
    inner: LocalTransport,
    observed: Mutex<Vec<Observation>>,
}

#[async_trait]
impl MarketTransport for TapTransport {
    async fn submit(&self, message: Message) -> Result<Delivery, TransportError> {
        let sender = message.sender_id.clone();
        let sent_at = message.lamport_timestamp;
        let delivery = self.inner.submit(message).await?;
        self.observed
            .lock()
            .push((sender, sent_at, delivery.lamport_time()));
        Ok(delivery)
    }

    async fn get_state(&self) -> Result<Snapshot, TransportError> {
        self.inner.get_state().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_agents_preserve_merge_invariant() {
    let node = Arc::new(
        CoordinatorNode::new(CoordinatorConfig::default(), Arc::new(NoopInstrumentation)).unwrap(),
    );
    let tap = Arc::new(TapTransport {
        inner: LocalTransport::new(node.clone()),
        observed: Mutex::new(Vec::new()),
    });

    let config = AgentConfig {
        min_interval_ms: 1,
        max_interval_ms: 3,
        ..Default::default()
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = (1..=4)
        .map(|i| {
            let agent = TradingAgent::new(
                format!("agent-{}", i),
                tap.clone(),
                Arc::new(NoopInstrumentation),
                config.clone(),
            )
            .unwrap()
            .seed(i);
            tokio::spawn(agent.run(shutdown_rx.clone()))
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    for result in futures::future::join_all(handles).await {
        assert_eq!(result.unwrap(), crate::AgentExit::Shutdown);
    }

    let observed = tap.observed.lock().clone();
    assert!(observed.len() > 20);

    // merge: coordinator time strictly exceeds every attached timestamp
    for (sender, sent_at, merged) in &observed {
        assert!(merged > sent_at, "{} sent {} but merged to {}", sender, sent_at, merged);
    }

    // serialization: no two deliveries observed the same coordinator time
    let distinct: HashSet<u64> = observed.iter().map(|(_, _, merged)| *merged).collect();
    assert_eq!(distinct.len(), observed.len());

    // per sender, coordinator times follow send order
    for i in 1..=4 {
        let id = format!("agent-{}", i);
        let times: Vec<(u64, u64)> = observed
            .iter()
            .filter(|(sender, _, _)| *sender == id)
            .map(|(_, sent, merged)| (*sent, *merged))
            .collect();
        assert!(times.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
    }

    let max_merged = observed.iter().map(|(_, _, merged)| *merged).max().unwrap();
    assert_eq!(node.current_time(), max_merged);
}

#[test]
fn test_raw_threads_serialize_receives() {
    let node = Arc::new(
        CoordinatorNode::new(CoordinatorConfig::default(), Arc::new(NoopInstrumentation)).unwrap(),
    );

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let node = node.clone();
            std::thread::spawn(move || {
                let sender = format!("agent-{}", t);
                let mut results = Vec::new();
                for i in 0..200u64 {
                    let stamp = (i * 7 + t * 13) % 500;
                    let order = Order::new(sender.as_str(), "GOOG", 1, 50.0, Side::Sell).unwrap();
                    let delivery = node.receive(Message::order(&sender, "market-node-01", order, stamp));
                    results.push((stamp, delivery.lamport_time()));
                }
                results
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    assert!(all.iter().all(|(stamp, merged)| merged > stamp));
    let distinct: HashSet<u64> = all.iter().map(|(_, merged)| *merged).collect();
    assert_eq!(distinct.len(), 1_600);
    assert_eq!(node.trade_count(), 1_600);

    let snapshot = node.snapshot();
    assert_eq!(snapshot.recent_trades.len(), 50);
    assert!(snapshot
        .recent_trades
        .windows(2)
        .all(|w| w[0].lamport_time < w[1].lamport_time));
}
