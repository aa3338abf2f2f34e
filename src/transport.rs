//! The wire transport contract (spec.md §6): opaque byte frames in,
//! opaque reply frames out. Grounded on the Go source's
//! `api.ReplicaConnector`/`StreamHandler` and the teacher's
//! `Dispatch`/`Context` split (`context/tokio.rs`); the core depends only
//! on these traits, never on a concrete network stack.

use tokio::sync::mpsc;

/// Per-peer handler: accepts an outbound byte channel, returns an
/// inbound one. Each replica initiates connections to every other peer
/// at startup (spec.md §6).
pub trait StreamHandler: Send + Sync {
    fn handle_message_stream(&self, out: mpsc::Receiver<Vec<u8>>) -> mpsc::Receiver<Vec<u8>>;
}

/// Yields a `StreamHandler` per peer replica.
pub trait ReplicaConnector: Send + Sync {
    fn replica_message_stream_handler(&self, peer_id: crate::message::ReplicaId) -> Option<Box<dyn StreamHandler>>;
}
