//! Replier (spec.md §2.8, §4.8): produces a reply channel for a freshly
//! submitted `Request`, fulfilled once the Commitment Collector executes
//! it. Grounded on the Go source's `makeReplier`.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::client_state::ClientStateRegistry;
use crate::message::{ClientId, Reply};

/// Spawns a task awaiting the reply for `(client_id, seq)` and returns a
/// receiver for it. Only called for externally-submitted `Request`s
/// (spec.md §4.1): a replica's own loopback processing has no caller
/// waiting on a reply.
pub fn reply_channel(
    client_states: Arc<ClientStateRegistry>,
    client_id: ClientId,
    seq: u64,
) -> oneshot::Receiver<Reply> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let reply = client_states.await_reply(client_id, seq).await;
        let _ = tx.send(reply);
    });
    rx
}
