//! Message Log & Peer Fan-out (spec.md §2, §4.10): an append-only,
//! multi-reader streaming buffer. Grounded on the Go source's
//! `messagelog.MessageLog` (index-addressable `Stream(from)`) and the
//! teacher's `flume`-channel fan-out pattern (`context/tokio.rs`), here
//! built on a `Mutex<Vec<_>>` snapshot plus a `Notify` instead of a
//! channel, since readers must be able to restart from an arbitrary
//! position rather than only consume forward from subscription time.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::message::Message;

#[derive(Default)]
struct Inner {
    messages: Mutex<Vec<Message>>,
    notify: Notify,
}

/// The local message log: append-only, fanned out to (a) all peer
/// connections and (b) a self-loop back into the Incoming-Message
/// Handler (spec.md §2, §4.10).
#[derive(Default, Clone)]
pub struct MessageLog {
    inner: Arc<Inner>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking append (spec.md §4.10).
    pub fn append(&self, message: Message) {
        self.inner.messages.lock().unwrap().push(message);
        self.inner.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A restartable reader cursor starting at position `from`.
    pub fn reader(&self, from: usize) -> MessageLogReader {
        MessageLogReader {
            inner: self.inner.clone(),
            position: from,
        }
    }

    /// Clones every message appended at or after `from`, without waiting
    /// for more to arrive. Useful for a synchronous drain of whatever a
    /// fan-out pass has produced so far (e.g. wiring a test network by
    /// hand, rather than through real peer connections).
    pub fn snapshot_from(&self, from: usize) -> Vec<Message> {
        self.inner.messages.lock().unwrap()[from.min(self.len())..].to_vec()
    }
}

/// Reads `stream(from)` as a pull cursor: `next().await` yields the next
/// appended message, blocking until it exists. Restartable because the
/// cursor is just a position into the shared snapshot.
pub struct MessageLogReader {
    inner: Arc<Inner>,
    position: usize,
}

impl MessageLogReader {
    pub async fn next(&mut self) -> Message {
        loop {
            let notified = self.inner.notify.notified();
            {
                let messages = self.inner.messages.lock().unwrap();
                if self.position < messages.len() {
                    let message = messages[self.position].clone();
                    self.position += 1;
                    return message;
                }
            }
            notified.await;
        }
    }
}

/// Where the Generated-Message Handler sends finalised `ReplicaMessage`s
/// (spec.md §4.9): the log is the production implementation; tests can
/// substitute a recording sink.
pub trait GeneratedMessageSink: Send + Sync {
    fn consume(&self, message: Message);
}

impl GeneratedMessageSink for MessageLog {
    fn consume(&self, message: Message) {
        self.append(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Signature};

    fn request(seq: u64) -> Message {
        Message::Request(Request {
            client_id: 1,
            seq,
            operation: vec![],
            signature: Signature(vec![]),
        })
    }

    #[tokio::test]
    async fn reader_replays_backlog_then_new_appends() {
        let log = MessageLog::new();
        log.append(request(1));
        log.append(request(2));

        let mut reader = log.reader(0);
        assert_eq!(reader.next().await, request(1));
        assert_eq!(reader.next().await, request(2));

        let log2 = log.clone();
        let waiter = tokio::spawn(async move { reader.next().await });
        tokio::task::yield_now().await;
        log2.append(request(3));
        assert_eq!(waiter.await.unwrap(), request(3));
    }

    #[tokio::test]
    async fn two_readers_at_different_positions_are_independent() {
        let log = MessageLog::new();
        log.append(request(1));
        log.append(request(2));

        let mut from_start = log.reader(0);
        let mut from_middle = log.reader(1);
        assert_eq!(from_start.next().await, request(1));
        assert_eq!(from_middle.next().await, request(2));
    }
}
