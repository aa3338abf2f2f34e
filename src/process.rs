//! Message Processor (spec.md §2.5-§2.6, §4.2-§4.6): routes a validated
//! message to request handling or peer-message ordering. Grounded on the
//! Go source's `defaultIncomingMessageHandler`'s `processor` wiring and
//! its `embeddedMessageProcessor`/`messageProcessor`/`peerMessageProcessor`
//! split.
//!
//! spec.md §9 notes the Go source builds this through a closure that
//! captures its own not-yet-constructed continuation, to let a peer
//! message's processor recurse into the embedded message's processor
//! before either exists as a value. Rust doesn't need the trick: `process`
//! is an ordinary `&self` method, so recursing into an embedded message is
//! just a recursive call.

use std::sync::Arc;

use crate::apply::Applier;
use crate::client_state::ClientStateRegistry;
use crate::error::CoreError;
use crate::message::{primary_of_view, Message, Request, View};
use crate::peer_state::PeerStateRegistry;
use crate::pending::PendingRequestList;
use crate::view_state::ViewState;

pub struct Pipeline {
    replica_id: u32,
    n: usize,
    client_states: Arc<ClientStateRegistry>,
    peer_states: Arc<PeerStateRegistry>,
    view_state: Arc<ViewState>,
    pending: Arc<PendingRequestList>,
    generated: Arc<crate::generated::GeneratedMessageHandler>,
    applier: Arc<Applier>,
}

impl Pipeline {
    pub fn new(
        replica_id: u32,
        n: usize,
        client_states: Arc<ClientStateRegistry>,
        peer_states: Arc<PeerStateRegistry>,
        view_state: Arc<ViewState>,
        pending: Arc<PendingRequestList>,
        generated: Arc<crate::generated::GeneratedMessageHandler>,
        applier: Arc<Applier>,
    ) -> Self {
        Self {
            replica_id,
            n,
            client_states,
            peer_states,
            view_state,
            pending,
            generated,
            applier,
        }
    }

    /// Top-level routing (spec.md §4.2): a `Request` goes to the Request
    /// Processor, everything else is a `PeerMessage`. The returned `bool`
    /// is the source's `new` flag (spec.md §4.1, §8): `false` for a
    /// message this replica has already captured, with no further effect.
    pub fn process(&self, message: Message) -> Result<bool, CoreError> {
        match message {
            Message::Request(request) => self.process_request(request),
            other => self.process_peer_message(other),
        }
    }

    /// Request Processor (spec.md §4.4): capture, track as pending, and
    /// either emit a Prepare (primary) or arm the prepare timer (backup).
    fn process_request(&self, request: Request) -> Result<bool, CoreError> {
        let client_id = request.client_id;
        let seq = request.seq;

        if self.client_states.capture_seq(client_id, seq).is_none() {
            tracing::debug!(client_id, seq, "duplicate request dropped");
            return Ok(false);
        }

        self.pending.add(request.clone());

        let hold = self.view_state.hold_view();
        let active = hold.active();
        let view = hold.current_view();
        drop(hold);

        // spec.md §4.4: active-and-primary gates *applier invocation* only;
        // a fresh request captured mid-view-change is still `new=true`.
        if active {
            let is_primary = primary_of_view(view, self.n) == self.replica_id;
            if is_primary {
                self.generated
                    .handle(crate::generated::Draft::Prepare { view, request });
            } else {
                self.client_states
                    .start_prepare_timer(client_id, self.applier.timeout_sink());
            }
        }
        Ok(true)
    }

    /// PeerMessage processing (spec.md §4.3, §4.5-§4.6): run the Embedded
    /// Message Processor, then branch on whether the message carries a UI
    /// (ordered against its sender's peer stream) or is a `ReqViewChange`
    /// (ordered only by view).
    fn process_peer_message(&self, message: Message) -> Result<bool, CoreError> {
        if let Some(embedded) = message.embedded() {
            // The embedded message is re-entering the pipeline purely for
            // its own side effects (spec.md §4.3); its `new` flag is not
            // this message's.
            self.process(embedded)?;
        }

        match message {
            Message::Prepare(prepare) => {
                match self.peer_states.capture_ui(prepare.replica_id, prepare.ui.counter) {
                    None => {
                        tracing::debug!(replica_id = prepare.replica_id, "duplicate prepare UI dropped");
                        Ok(false)
                    }
                    Some(_guard) => match self.view_check(prepare.view)? {
                        None => Ok(false),
                        Some(true) => self.applier.apply_prepare(&prepare).map(|()| true),
                        Some(false) => {
                            tracing::debug!("view change in progress, prepare not applied");
                            Ok(false)
                        }
                    },
                }
            }
            Message::Commit(commit) => {
                match self.peer_states.capture_ui(commit.replica_id, commit.ui.counter) {
                    None => {
                        tracing::debug!(replica_id = commit.replica_id, "duplicate commit UI dropped");
                        Ok(false)
                    }
                    Some(_guard) => match self.view_check(commit.prepare.view)? {
                        None => Ok(false),
                        Some(true) => self.applier.apply_commit(&commit).map(|()| true),
                        Some(false) => {
                            tracing::debug!("view change in progress, commit not applied");
                            Ok(false)
                        }
                    },
                }
            }
            Message::ReqViewChange(rvc) => self.applier.apply_req_view_change(&rvc).map(|()| true),
            Message::ViewChange(vc) => {
                match self.peer_states.capture_ui(vc.replica_id, vc.ui.counter) {
                    None => {
                        tracing::debug!(replica_id = vc.replica_id, "duplicate view-change UI dropped");
                        Ok(false)
                    }
                    Some(_guard) => self.applier.apply_view_change(&vc).map(|()| true),
                }
            }
            Message::NewView(nv) => {
                match self.peer_states.capture_ui(nv.replica_id, nv.ui.counter) {
                    None => Ok(false),
                    Some(_guard) => self.applier.apply_new_view(&nv).map(|()| true),
                }
            }
            Message::Request(_) => unreachable!("process_peer_message only receives PeerMessages"),
        }
    }

    /// View-Message Processor (spec.md §4.6): resolves `message_view`
    /// against the held current view. `Ok(None)` means stale, drop;
    /// `Err` means ahead of our view, reject; `Ok(Some(active))` means
    /// deliver, `active` telling the Applier whether a view change is
    /// currently in progress.
    fn view_check(&self, message_view: View) -> Result<Option<bool>, CoreError> {
        let hold = self.view_state.hold_view();
        let current = hold.current_view();
        let active = hold.active();
        drop(hold);
        if message_view < current {
            Ok(None)
        } else if message_view > current {
            Err(CoreError::protocol("unexpected view"))
        } else {
            Ok(Some(active))
        }
    }
}
