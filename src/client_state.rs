//! Client State Registry (spec.md §2.3, §3, §4.4, §4.8): per-client
//! sequence-number tracking, reply cache, request/prepare timers.
//! Grounded on the Go source's `clientstate.Provider` and the teacher's
//! `Timer` (`common.rs`), generalized to real concurrent timers instead
//! of the teacher's single-threaded `Context::set`/`unset`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::Notify, task::JoinHandle};

use crate::message::{ClientId, Reply};

/// Invoked when a client's request or prepare timer expires; the core
/// wires this to emit a `ReqViewChange` (spec.md §5).
pub trait TimeoutSink: Send + Sync {
    fn on_timeout(&self, client_id: ClientId);
}

#[derive(Debug)]
struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    fn new() -> Self {
        Self { handle: None }
    }

    fn set(&mut self, duration: Duration, client_id: ClientId, sink: Arc<dyn TimeoutSink>) {
        assert!(self.handle.is_none(), "timer already armed");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            sink.on_timeout(client_id);
        }));
    }

    fn unset(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.unset();
    }
}

#[derive(Debug)]
struct ClientState {
    last_captured: u64,
    last_prepared: u64,
    last_retired: u64,
    reply: Option<Reply>,
    reply_notify: Arc<Notify>,
    request_timer: Timer,
    prepare_timer: Timer,
}

impl ClientState {
    fn new() -> Self {
        Self {
            last_captured: 0,
            last_prepared: 0,
            last_retired: 0,
            reply: None,
            reply_notify: Arc::new(Notify::new()),
            request_timer: Timer::new(),
            prepare_timer: Timer::new(),
        }
    }
}

/// RAII marker returned by [`ClientStateRegistry::capture_seq`]. The
/// capture itself is an atomic check-and-bump of `lastCaptured`
/// (spec.md §4.4 step 1); the guard exists so callers express release
/// with normal scope exit (§9 REDESIGN FLAGS) instead of an explicit
/// `release()` call threaded through every error path.
#[derive(Debug)]
pub struct CaptureGuard {
    pub client_id: ClientId,
    pub seq: u64,
}

pub struct ClientStateRegistry {
    clients: Mutex<HashMap<ClientId, Arc<Mutex<ClientState>>>>,
    request_timeout: Duration,
    prepare_timeout: Duration,
}

impl ClientStateRegistry {
    pub fn new(request_timeout: Duration, prepare_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            request_timeout,
            prepare_timeout,
        }
    }

    fn entry(&self, client_id: ClientId) -> Arc<Mutex<ClientState>> {
        self.clients
            .lock()
            .unwrap()
            .entry(client_id)
            .or_insert_with(|| Arc::new(Mutex::new(ClientState::new())))
            .clone()
    }

    /// Succeeds iff `seq > lastCaptured`; atomically bumps `lastCaptured`
    /// and returns a release guard (spec.md §4.4 step 1).
    pub fn capture_seq(&self, client_id: ClientId, seq: u64) -> Option<CaptureGuard> {
        let state = self.entry(client_id);
        let mut guard = state.lock().unwrap();
        if seq <= guard.last_captured {
            return None;
        }
        guard.last_captured = seq;
        Some(CaptureGuard { client_id, seq })
    }

    /// Marks `seq` as prepared, iff it is newer than the last prepared
    /// one (spec.md §3 lifecycle: capture ≤ prepare ≤ retire).
    pub fn prepare_seq(&self, client_id: ClientId, seq: u64) -> bool {
        let state = self.entry(client_id);
        let mut guard = state.lock().unwrap();
        if seq > guard.last_prepared {
            guard.last_prepared = seq;
            true
        } else {
            false
        }
    }

    /// Retires `seq` iff new; returns `true` the first (and only) time
    /// this is called for a given seq (spec.md §4.7, §8 "executed at
    /// most once").
    pub fn retire_seq(&self, client_id: ClientId, seq: u64) -> bool {
        let state = self.entry(client_id);
        let mut guard = state.lock().unwrap();
        if seq > guard.last_retired {
            guard.last_retired = seq;
            true
        } else {
            false
        }
    }

    pub fn start_request_timer(&self, client_id: ClientId, sink: Arc<dyn TimeoutSink>) {
        let state = self.entry(client_id);
        let mut guard = state.lock().unwrap();
        guard.request_timer.set(self.request_timeout, client_id, sink);
    }

    pub fn stop_request_timer(&self, client_id: ClientId) {
        let state = self.entry(client_id);
        state.lock().unwrap().request_timer.unset();
    }

    pub fn start_prepare_timer(&self, client_id: ClientId, sink: Arc<dyn TimeoutSink>) {
        let state = self.entry(client_id);
        let mut guard = state.lock().unwrap();
        guard.prepare_timer.set(self.prepare_timeout, client_id, sink);
    }

    pub fn stop_prepare_timer(&self, client_id: ClientId) {
        let state = self.entry(client_id);
        state.lock().unwrap().prepare_timer.unset();
    }

    /// The Generated-Message Handler attaches a finalised Reply here,
    /// waking any Replier task awaiting this `(clientId, seq)` (spec.md
    /// §4.8, §4.9).
    pub fn add_reply(&self, reply: Reply) {
        let state = self.entry(reply.client_id);
        let mut guard = state.lock().unwrap();
        let notify = guard.reply_notify.clone();
        guard.reply = Some(reply);
        notify.notify_waiters();
    }

    /// Awaits the reply slot for `(clientId, seq)`, forwarding exactly
    /// one matching value (spec.md §4.8).
    pub async fn await_reply(&self, client_id: ClientId, seq: u64) -> Reply {
        let state = self.entry(client_id);
        loop {
            let notify = state.lock().unwrap().reply_notify.clone();
            let notified = notify.notified();
            {
                let guard = state.lock().unwrap();
                if let Some(reply) = &guard.reply {
                    if reply.seq == seq {
                        return reply.clone();
                    }
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Signature;

    fn reply(client_id: ClientId, seq: u64) -> Reply {
        Reply {
            replica_id: 0,
            client_id,
            seq,
            result: vec![],
            signature: Signature(vec![]),
        }
    }

    #[test]
    fn duplicate_capture_is_rejected() {
        let registry = ClientStateRegistry::new(Duration::from_secs(1), Duration::from_secs(1));
        assert!(registry.capture_seq(1, 1).is_some());
        assert!(registry.capture_seq(1, 1).is_none());
    }

    #[test]
    fn capture_requires_strictly_increasing_seq() {
        let registry = ClientStateRegistry::new(Duration::from_secs(1), Duration::from_secs(1));
        registry.capture_seq(1, 5).unwrap();
        assert!(registry.capture_seq(1, 5).is_none());
        assert!(registry.capture_seq(1, 4).is_none());
        assert!(registry.capture_seq(1, 6).is_some());
    }

    #[test]
    fn retire_seq_fires_exactly_once() {
        let registry = ClientStateRegistry::new(Duration::from_secs(1), Duration::from_secs(1));
        assert!(registry.retire_seq(1, 1));
        assert!(!registry.retire_seq(1, 1));
    }

    #[tokio::test]
    async fn await_reply_wakes_on_matching_add_reply() {
        let registry = Arc::new(ClientStateRegistry::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.await_reply(9, 3).await })
        };
        tokio::task::yield_now().await;
        registry.add_reply(reply(9, 2));
        registry.add_reply(reply(9, 3));
        let got = waiter.await.unwrap();
        assert_eq!(got.seq, 3);
    }
}
