//! Failure detector - edge-triggered peer failure reporting
//!
//! Polls the liveness table on a fixed period and compares each peer's
//! state with the one observed on the previous poll. Only ACTIVE -> FAILED
//! flips are reported. Polls that fall behind are skipped, not replayed, so
//! a peer that fails and recovers between two polls is never reported.

use crate::instrumentation::Instrumentation;
use crate::liveness::LivenessTracker;
use crate::types::{NodeStatus, PeerId, PeerState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Unreliable, timeout-based failure detector
pub struct FailureDetector {
    liveness: Arc<LivenessTracker>,
    instrumentation: Arc<dyn Instrumentation>,
    interval: Duration,
    timeout: Duration,
    /// State observed on the previous poll
    previous: HashMap<PeerId, PeerState>,
}

impl FailureDetector {
    pub fn new(
        liveness: Arc<LivenessTracker>,
        instrumentation: Arc<dyn Instrumentation>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            liveness,
            instrumentation,
            interval,
            timeout,
            previous: HashMap::new(),
        }
    }

    /// Run one detection pass and return the peers that just failed
    pub fn poll(&mut self) -> Vec<PeerId> {
        let mut newly_failed = Vec::new();

        for (peer, current) in self.liveness.statuses(self.timeout) {
            // An unseen peer counts as ACTIVE so its first observation never fires
            let previous = self
                .previous
                .get(&peer)
                .copied()
                .unwrap_or(PeerState::Active);

            match (previous, current) {
                (PeerState::Active, PeerState::Failed) => {
                    tracing::warn!("Peer {} has failed (no heartbeat). Marking as FAILED", peer);
                    self.instrumentation.peer_marked_failed(&peer);
                    self.instrumentation
                        .node_status_changed(&peer, NodeStatus::Down);
                    newly_failed.push(peer.clone());
                }
                (PeerState::Failed, PeerState::Active) => {
                    tracing::debug!("Peer {} is sending heartbeats again", peer);
                }
                _ => {}
            }

            self.previous.insert(peer, current);
        }

        newly_failed
    }

    /// States recorded on the last poll
    pub fn states(&self) -> &HashMap<PeerId, PeerState> {
        &self.previous
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; start one period in
        interval.tick().await;

        tracing::info!(
            "Failure detector started ({}ms period, {}ms timeout)",
            self.interval.as_millis(),
            self.timeout.as_millis()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    let failed = self.poll();
                    if !failed.is_empty() {
                        tracing::debug!("Detector pass marked {} peer(s) failed", failed.len());
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Failure detector stopped");
    }
}
