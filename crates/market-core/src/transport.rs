//! Transport boundary between agents and the coordinator
//!
//! Agents only see `MarketTransport`. `LocalTransport` delivers in-process;
//! the RPC client in `market-rpc` delivers over HTTP.

use crate::coordinator::CoordinatorNode;
use crate::error::TransportError;
use crate::types::{Delivery, Message, Snapshot};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Remote-call surface of the coordinator
#[async_trait]
pub trait MarketTransport: Send + Sync {
    /// Deliver a message; an error means the call itself did not complete
    async fn submit(&self, message: Message) -> Result<Delivery, TransportError>;

    /// Read the coordinator's current snapshot
    async fn get_state(&self) -> Result<Snapshot, TransportError>;
}

/// In-process transport with a switch to simulate an unreachable coordinator
pub struct LocalTransport {
    node: Arc<CoordinatorNode>,
    connected: AtomicBool,
}

impl LocalTransport {
    pub fn new(node: Arc<CoordinatorNode>) -> Self {
        Self {
            node,
            connected: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call fail
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    fn check_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unreachable(format!(
                "{} is disconnected",
                self.node.node_id()
            )))
        }
    }
}

#[async_trait]
impl MarketTransport for LocalTransport {
    async fn submit(&self, message: Message) -> Result<Delivery, TransportError> {
        self.check_connected()?;
        Ok(self.node.receive(message))
    }

    async fn get_state(&self) -> Result<Snapshot, TransportError> {
        self.check_connected()?;
        Ok(self.node.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::instrumentation::NoopInstrumentation;

    #[tokio::test]
    async fn test_disconnect_fails_fast() {
        let node = Arc::new(
            CoordinatorNode::new(CoordinatorConfig::default(), Arc::new(NoopInstrumentation)).unwrap(),
        );
        let transport = LocalTransport::new(node.clone());

        let delivery = transport
            .submit(Message::heartbeat("agent-1", "market-node-01", 1))
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::HeartbeatRecorded { .. }));

        transport.disconnect();
        let err = transport
            .submit(Message::heartbeat("agent-1", "market-node-01", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert!(transport.get_state().await.is_err());

        // the failed call never reached the node
        assert_eq!(node.current_time(), 2);

        transport.reconnect();
        assert_eq!(transport.get_state().await.unwrap().peer_statuses.len(), 1);
    }
}
