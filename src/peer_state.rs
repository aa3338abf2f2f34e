//! Peer State Registry (spec.md §2.4, §3, §4.5): per-peer UI-counter
//! reception state enforcing in-order delivery of `CertifiedMessage`s.
//! This is the ordering engine's hard kernel; grounded on the Go
//! source's `peerstate.Provider`/`captureUI` contract (spec.md §4.5),
//! realized with a `Condvar` since the blocking contract is explicitly
//! synchronous ("block the caller") rather than an async suspension
//! point.
//!
//! Design choice (recorded in DESIGN.md): at most one UI counter per peer
//! is ever in flight (captured but not released) at a time. The spec's
//! capture/release description would, read literally, allow counter `k`
//! and `k+1` to both be reserved concurrently once `k` is captured (since
//! `nextExpected` advances at capture time, not at release time) — but
//! the surrounding "Ordering guarantee" prose requires `k`'s
//! `applyPeerMessage` to *return* before `k+1`'s begins, which only holds
//! if capture of `k+1` is also gated on `k`'s release. A single `busy`
//! flag per peer (rather than a per-counter reservation set) realizes
//! that stronger, and still spec-compliant, serialization.

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex},
};

use crate::message::ReplicaId;

struct PeerEntry {
    next_expected: u64,
    busy: bool,
}

struct Peer {
    state: Mutex<PeerEntry>,
    condvar: Condvar,
}

/// Released on drop, clearing the peer's `busy` flag and waking any
/// blocked captures (spec.md §4.5 point 2, §9 RAII redesign flag).
pub struct CaptureGuard {
    peer: Arc<Peer>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let mut entry = self.peer.state.lock().unwrap();
        entry.busy = false;
        self.peer.condvar.notify_all();
    }
}

#[derive(Default)]
pub struct PeerStateRegistry {
    peers: Mutex<HashMap<ReplicaId, Arc<Peer>>>,
}

impl PeerStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, peer_id: ReplicaId) -> Arc<Peer> {
        self.peers
            .lock()
            .unwrap()
            .entry(peer_id)
            .or_insert_with(|| {
                Arc::new(Peer {
                    state: Mutex::new(PeerEntry {
                        next_expected: 1,
                        busy: false,
                    }),
                    condvar: Condvar::new(),
                })
            })
            .clone()
    }

    /// Atomically reserves counter `c` for peer `p` (spec.md §4.5).
    /// Returns `None` for a duplicate (`c < nextExpected`); otherwise
    /// blocks until `c` is next in line and the peer is idle, then
    /// reserves it and returns a release guard.
    pub fn capture_ui(&self, peer_id: ReplicaId, counter: u64) -> Option<CaptureGuard> {
        let peer = self.entry(peer_id);
        let mut entry = peer.state.lock().unwrap();
        if counter < entry.next_expected {
            return None;
        }
        loop {
            if !entry.busy && counter == entry.next_expected {
                entry.busy = true;
                entry.next_expected += 1;
                drop(entry);
                return Some(CaptureGuard { peer });
            }
            entry = peer.condvar.wait(entry).unwrap();
        }
    }
}
