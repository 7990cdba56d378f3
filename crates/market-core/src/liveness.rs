//! Heartbeat liveness table
//!
//! Keeps the last time each peer was heard from. Writers for peers that are
//! already known share the read lock and only touch their own atomic slot,
//! so heartbeats from different peers never block each other. `statuses`
//! takes the write lock to read a coherent point-in-time view.

use crate::types::{PeerId, PeerState};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-peer last-seen table
pub struct LivenessTracker {
    /// Reference point for the stored offsets
    epoch: Instant,
    /// Microseconds since `epoch` at which each peer was last heard from
    last_seen: RwLock<HashMap<PeerId, Arc<AtomicU64>>>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_seen: RwLock::new(HashMap::new()),
        }
    }

    fn now_offset(&self) -> u64 {
        micros(Instant::now().duration_since(self.epoch))
    }

    /// Mark a peer as heard from now
    pub fn record_heartbeat(&self, peer_id: &str) {
        let now = self.now_offset();

        if let Some(slot) = self.last_seen.read().get(peer_id) {
            slot.fetch_max(now, Ordering::SeqCst);
            return;
        }

        let mut table = self.last_seen.write();
        table
            .entry(peer_id.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_max(now, Ordering::SeqCst);
    }

    /// Evaluate every known peer against `timeout`
    ///
    /// A peer is ACTIVE while `now - last_seen <= timeout`. Peers that never
    /// sent a heartbeat are not reported.
    pub fn statuses(&self, timeout: Duration) -> BTreeMap<PeerId, PeerState> {
        let table = self.last_seen.write();
        let now = self.now_offset();
        let timeout_us = micros(timeout);

        table
            .iter()
            .map(|(peer, slot)| {
                let age = now.saturating_sub(slot.load(Ordering::SeqCst));
                let state = if age <= timeout_us {
                    PeerState::Active
                } else {
                    PeerState::Failed
                };
                (peer.clone(), state)
            })
            .collect()
    }

    /// Time since the peer's last heartbeat
    pub fn last_seen(&self, peer_id: &str) -> Option<Duration> {
        let seen = self.last_seen.read().get(peer_id)?.load(Ordering::SeqCst);
        Some(Duration::from_micros(self.now_offset().saturating_sub(seen)))
    }

    /// Number of peers ever recorded
    pub fn len(&self) -> usize {
        self.last_seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.read().is_empty()
    }
}

/// Whole microseconds, saturating at `u64::MAX`
fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}
