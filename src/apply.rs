//! Appliers (spec.md §2.7-§2.8, §4.7-§4.8): the side-effecting second
//! half of peer-message processing, run once a message's position in its
//! sender's stream (or, for `ReqViewChange`, its view) has been
//! established. Grounded on the Go source's `applyPrepare`/`applyCommit`/
//! `collectCommitment`/`applyReqViewChange`/`applyViewChange`.

use std::sync::{Arc, Mutex};

use crate::app::Application;
use crate::client_state::{ClientStateRegistry, TimeoutSink};
use crate::commitment::{CommitmentCounter, ViewChangeCounter};
use crate::error::CoreError;
use crate::generated::{Draft, GeneratedMessageHandler};
use crate::message::{primary_of_view, ClientId, Commit, NewView, Prepare, ReplicaId, ReqViewChange, ViewChange};
use crate::pending::PendingRequestList;
use crate::view_state::ViewState;

/// Fires a `ReqViewChange` when a client's request or prepare timer
/// expires (spec.md §5): the liveness half of the view-change trigger.
struct RequestTimeoutSink {
    view_state: Arc<ViewState>,
    generated: Arc<GeneratedMessageHandler>,
}

impl TimeoutSink for RequestTimeoutSink {
    fn on_timeout(&self, _client_id: ClientId) {
        let hold = self.view_state.hold_view();
        let current_view = hold.current_view();
        drop(hold);
        self.generated.handle(Draft::ReqViewChange {
            current_view,
            requested_view: current_view + 1,
        });
    }
}

/// Owns the post-ordering side effects for every peer-message variant
/// (spec.md §4.7-§4.8): committing prepares, retiring and executing
/// requests, and advancing the view on a view-change quorum.
pub struct Applier {
    replica_id: ReplicaId,
    n: usize,
    client_states: Arc<ClientStateRegistry>,
    pending: Arc<PendingRequestList>,
    commitment: Arc<CommitmentCounter>,
    view_change_counter: Arc<ViewChangeCounter>,
    view_state: Arc<ViewState>,
    generated: Arc<GeneratedMessageHandler>,
    app: Arc<Mutex<dyn Application>>,
    timeout_sink: Arc<dyn TimeoutSink>,
}

impl Applier {
    pub fn new(
        replica_id: ReplicaId,
        n: usize,
        client_states: Arc<ClientStateRegistry>,
        pending: Arc<PendingRequestList>,
        commitment: Arc<CommitmentCounter>,
        view_change_counter: Arc<ViewChangeCounter>,
        view_state: Arc<ViewState>,
        generated: Arc<GeneratedMessageHandler>,
        app: Arc<Mutex<dyn Application>>,
    ) -> Self {
        let timeout_sink = Arc::new(RequestTimeoutSink {
            view_state: view_state.clone(),
            generated: generated.clone(),
        });
        Self {
            replica_id,
            n,
            client_states,
            pending,
            commitment,
            view_change_counter,
            view_state,
            generated,
            app,
            timeout_sink,
        }
    }

    /// spec.md §4.7: the primary's own Prepare counts as its commitment
    /// ack; a backup instead emits a Commit and waits to count the
    /// quorum via `apply_commit`.
    pub fn apply_prepare(&self, prepare: &Prepare) -> Result<(), CoreError> {
        let client_id = prepare.request.client_id;
        if prepare.replica_id == self.replica_id {
            if self.commitment.count(self.replica_id, prepare)? {
                self.collect(prepare)?;
            }
        } else {
            self.client_states.prepare_seq(client_id, prepare.request.seq);
            self.client_states.stop_prepare_timer(client_id);
            self.client_states
                .start_request_timer(client_id, self.timeout_sink.clone());
            self.generated.handle(Draft::Commit { prepare: prepare.clone() });
        }
        Ok(())
    }

    pub fn apply_commit(&self, commit: &Commit) -> Result<(), CoreError> {
        if self.commitment.count(commit.replica_id, &commit.prepare)? {
            self.collect(&commit.prepare)?;
        }
        Ok(())
    }

    /// Commitment Collector (spec.md §4.7, §8): retires, executes, and
    /// replies exactly once per `(clientId, seq)`.
    fn collect(&self, prepare: &Prepare) -> Result<(), CoreError> {
        let client_id = prepare.request.client_id;
        let seq = prepare.request.seq;
        if !self.client_states.retire_seq(client_id, seq) {
            return Ok(());
        }
        self.pending.remove(client_id);
        self.client_states.stop_request_timer(client_id);
        let result = self.app.lock().unwrap().execute(&prepare.request.operation);
        self.generated.handle(Draft::Reply { client_id, seq, result });
        Ok(())
    }

    /// spec.md §4.8: advances `expectedView` and echoes a `ViewChange` of
    /// our own once a peer requests a later view than we've seen.
    pub fn apply_req_view_change(&self, rvc: &ReqViewChange) -> Result<(), CoreError> {
        if self.view_state.advance_expected_view(rvc.requested_view) {
            self.generated.handle(Draft::ViewChange {
                new_view: rvc.requested_view,
                req_view_change: rvc.clone(),
                checkpoint_certificate: Vec::new(),
                messages_since_checkpoint: Vec::new(),
            });
        }
        Ok(())
    }

    /// spec.md §4.8, §9: counts `ViewChange`s toward the `F+1` quorum.
    /// `NewView` assembly (collecting the certificate, replaying the log
    /// suffix) is a Non-goal of this core (checkpointing/GC, spec.md §1),
    /// so a matured quorum is only observed here, never turned into an
    /// emitted `NewView` — mirroring the Go source, which counts votes but
    /// never completes the view-change protocol either.
    pub fn apply_view_change(&self, vc: &ViewChange) -> Result<(), CoreError> {
        let matured = self.view_change_counter.count(vc.replica_id, vc.new_view);
        if matured && primary_of_view(vc.new_view, self.n) == self.replica_id {
            tracing::info!(view = vc.new_view, "view-change quorum reached; NewView assembly is out of scope");
        }
        Ok(())
    }

    /// spec.md §9: `NewView` application (installing the new current
    /// view) is unwired, matching the Go source's incomplete
    /// `applyNewView`. `ViewState::advance_current_view` exists for this
    /// purpose but is never called from the pipeline.
    pub fn apply_new_view(&self, _new_view: &NewView) -> Result<(), CoreError> {
        Ok(())
    }

    /// The timer sink shared with the Request Processor (spec.md §4.4), so
    /// a backup's prepare timer and a client's request timer both surface
    /// through the same `ReqViewChange` trigger on expiry.
    pub fn timeout_sink(&self) -> Arc<dyn TimeoutSink> {
        self.timeout_sink.clone()
    }
}
