//! Generated-Message Handler (spec.md §2.9, §4.9): finalises
//! replica-originated messages before they enter the local log.
//! Grounded on the Go source's `makeGeneratedMessageHandler`/
//! `makeGeneratedMessageConsumer`.

use std::sync::Mutex;

use serde::Serialize;

use crate::client_state::ClientStateRegistry;
use crate::crypto::{SignatureScheme, Usig};
use crate::error::FatalError;
use crate::log::GeneratedMessageSink;
use crate::message::{
    ClientId, Commit, Message, Prepare, ReplicaId, Reply, Request, Signature, ReqViewChange, View,
    ViewChange,
};

/// A locally-generated message, still missing the authentication tag
/// that only the Generated-Message Handler attaches. Stands in for the
/// Go source's almost-complete `ReplicaMessage` values passed to
/// `handleGeneratedMessage`.
pub enum Draft {
    Prepare { view: View, request: Request },
    Commit { prepare: Prepare },
    Reply { client_id: ClientId, seq: u64, result: Vec<u8> },
    ReqViewChange { current_view: View, requested_view: View },
    ViewChange {
        new_view: View,
        req_view_change: ReqViewChange,
        checkpoint_certificate: Vec<u8>,
        messages_since_checkpoint: Vec<u8>,
    },
}

#[derive(Serialize)]
struct PreparePreimage<'a> {
    replica_id: ReplicaId,
    view: View,
    request: &'a Request,
}

#[derive(Serialize)]
struct CommitPreimage<'a> {
    replica_id: ReplicaId,
    prepare: &'a Prepare,
}

#[derive(Serialize)]
struct ReplyPreimage<'a> {
    replica_id: ReplicaId,
    client_id: ClientId,
    seq: u64,
    result: &'a [u8],
}

#[derive(Serialize)]
struct ReqViewChangePreimage {
    replica_id: ReplicaId,
    current_view: View,
    requested_view: View,
}

#[derive(Serialize)]
struct ViewChangePreimage<'a> {
    replica_id: ReplicaId,
    new_view: View,
    req_view_change: &'a ReqViewChange,
}

fn preimage(value: &impl Serialize) -> Vec<u8> {
    bincode::serialize(value).expect("preimage of a well-typed draft must serialize")
}

/// Finalises and hands off replica-originated messages (spec.md §4.9).
/// The UI-assignment mutex is the only point of USIG exclusion;
/// verification and all other handling stay fully concurrent.
pub struct GeneratedMessageHandler {
    replica_id: ReplicaId,
    usig: Box<dyn Usig>,
    signer: Box<dyn SignatureScheme>,
    ui_lock: Mutex<()>,
    client_states: std::sync::Arc<ClientStateRegistry>,
    sink: std::sync::Arc<dyn GeneratedMessageSink>,
}

impl GeneratedMessageHandler {
    pub fn new(
        replica_id: ReplicaId,
        usig: Box<dyn Usig>,
        signer: Box<dyn SignatureScheme>,
        client_states: std::sync::Arc<ClientStateRegistry>,
        sink: std::sync::Arc<dyn GeneratedMessageSink>,
    ) -> Self {
        Self {
            replica_id,
            usig,
            signer,
            ui_lock: Mutex::new(()),
            client_states,
            sink,
        }
    }

    /// Assigns a UI under the exclusion mutex, then hands the finalised
    /// message to `consume`. A USIG failure is fatal (spec.md §7): the
    /// replica cannot safely continue emitting unsequenced messages.
    pub fn handle(&self, draft: Draft) {
        let message = match draft {
            Draft::Prepare { view, request } => {
                let pre = preimage(&PreparePreimage {
                    replica_id: self.replica_id,
                    view,
                    request: &request,
                });
                let ui = self.assign_ui(&pre);
                Message::Prepare(Prepare {
                    replica_id: self.replica_id,
                    view,
                    request,
                    ui,
                })
            }
            Draft::Commit { prepare } => {
                let pre = preimage(&CommitPreimage {
                    replica_id: self.replica_id,
                    prepare: &prepare,
                });
                let ui = self.assign_ui(&pre);
                Message::Commit(Commit {
                    replica_id: self.replica_id,
                    prepare,
                    ui,
                })
            }
            Draft::Reply { client_id, seq, result } => {
                let pre = preimage(&ReplyPreimage {
                    replica_id: self.replica_id,
                    client_id,
                    seq,
                    result: &result,
                });
                let signature = self.sign(&pre);
                Message::Reply(Reply {
                    replica_id: self.replica_id,
                    client_id,
                    seq,
                    result,
                    signature,
                })
            }
            Draft::ReqViewChange { current_view, requested_view } => {
                let pre = preimage(&ReqViewChangePreimage {
                    replica_id: self.replica_id,
                    current_view,
                    requested_view,
                });
                let signature = self.sign(&pre);
                Message::ReqViewChange(ReqViewChange {
                    replica_id: self.replica_id,
                    current_view,
                    requested_view,
                    signature,
                })
            }
            Draft::ViewChange {
                new_view,
                req_view_change,
                checkpoint_certificate,
                messages_since_checkpoint,
            } => {
                let pre = preimage(&ViewChangePreimage {
                    replica_id: self.replica_id,
                    new_view,
                    req_view_change: &req_view_change,
                });
                let ui = self.assign_ui(&pre);
                Message::ViewChange(ViewChange {
                    replica_id: self.replica_id,
                    new_view,
                    checkpoint_certificate,
                    messages_since_checkpoint,
                    req_view_change,
                    ui,
                })
            }
        };

        self.consume(message);
    }

    fn assign_ui(&self, authenticated_bytes: &[u8]) -> crate::message::Ui {
        let _guard = self.ui_lock.lock().unwrap();
        match self.usig.assign_ui(authenticated_bytes) {
            Ok(ui) => ui,
            Err(err) => fatal(err),
        }
    }

    fn sign(&self, authenticated_bytes: &[u8]) -> Signature {
        self.signer.sign(authenticated_bytes)
    }

    /// Reply messages are routed to the Client State Registry; all other
    /// `ReplicaMessage`s are appended to the message log (spec.md §4.9).
    fn consume(&self, message: Message) {
        tracing::debug!(kind = message.variant_name(), "generated");
        match message {
            Message::Reply(reply) => self.client_states.add_reply(reply),
            other => self.sink.consume(other),
        }
    }
}

/// USIG failures are fatal (spec.md §7): the replica cannot safely
/// continue emitting unsequenced messages.
fn fatal(err: FatalError) -> ! {
    panic!("fatal USIG/signing failure on outgoing message: {err}")
}
