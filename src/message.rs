//! The closed message algebra (spec.md §3).
//!
//! A single tagged enum stands in for the source's capability-marker
//! interfaces (`ClientMessage`, `ReplicaMessage`, `CertifiedMessage`,
//! `SignedMessage`): capability checks become exhaustive matches instead
//! of trait-object downcasts.

use serde::{Deserialize, Serialize};

pub type ReplicaId = u32;
pub type ClientId = u32;
pub type View = u64;

/// `(counter, attestation)` produced by a replica's USIG (spec.md §3).
///
/// `counter` is the ordering key; `attestation` is opaque to the core and
/// only meaningful to the USIG oracle that produced and verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ui {
    pub counter: u64,
    pub attestation: Vec<u8>,
}

/// An ordinary (non-USIG) signature over a message's authenticated bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub client_id: ClientId,
    pub seq: u64,
    pub operation: Vec<u8>,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prepare {
    pub replica_id: ReplicaId,
    pub view: View,
    pub request: Request,
    pub ui: Ui,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub replica_id: ReplicaId,
    pub prepare: Prepare,
    pub ui: Ui,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub replica_id: ReplicaId,
    pub client_id: ClientId,
    pub seq: u64,
    pub result: Vec<u8>,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqViewChange {
    pub replica_id: ReplicaId,
    pub current_view: View,
    pub requested_view: View,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewChange {
    pub replica_id: ReplicaId,
    pub new_view: View,
    /// Checkpoint certificate and log suffix are carried opaquely: the
    /// core's Non-goals exclude checkpointing/GC (spec.md §1), so these
    /// fields are only round-tripped, never interpreted.
    pub checkpoint_certificate: Vec<u8>,
    pub messages_since_checkpoint: Vec<u8>,
    pub req_view_change: ReqViewChange,
    pub ui: Ui,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewView {
    pub replica_id: ReplicaId,
    pub view_changes: Vec<ViewChange>,
    pub ui: Ui,
}

/// The closed message algebra (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Request(Request),
    Prepare(Prepare),
    Commit(Commit),
    Reply(Reply),
    ReqViewChange(ReqViewChange),
    ViewChange(ViewChange),
    NewView(NewView),
}

impl Message {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Request(_) => "Request",
            Self::Prepare(_) => "Prepare",
            Self::Commit(_) => "Commit",
            Self::Reply(_) => "Reply",
            Self::ReqViewChange(_) => "ReqViewChange",
            Self::ViewChange(_) => "ViewChange",
            Self::NewView(_) => "NewView",
        }
    }

    /// `ClientMessage` capability: has a `clientId`.
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Request(m) => Some(m.client_id),
            Self::Reply(m) => Some(m.client_id),
            _ => None,
        }
    }

    /// `ReplicaMessage` capability: has a `replicaId`.
    pub fn replica_id(&self) -> Option<ReplicaId> {
        match self {
            Self::Prepare(m) => Some(m.replica_id),
            Self::Commit(m) => Some(m.replica_id),
            Self::Reply(m) => Some(m.replica_id),
            Self::ReqViewChange(m) => Some(m.replica_id),
            Self::ViewChange(m) => Some(m.replica_id),
            Self::NewView(m) => Some(m.replica_id),
            Self::Request(_) => None,
        }
    }

    /// `PeerMessage` capability: exchanged replica-to-replica.
    pub fn is_peer_message(&self) -> bool {
        matches!(
            self,
            Self::Prepare(_)
                | Self::Commit(_)
                | Self::ReqViewChange(_)
                | Self::ViewChange(_)
                | Self::NewView(_)
        )
    }

    /// `CertifiedMessage` capability: carries a USIG UI.
    pub fn ui(&self) -> Option<&Ui> {
        match self {
            Self::Prepare(m) => Some(&m.ui),
            Self::Commit(m) => Some(&m.ui),
            Self::ViewChange(m) => Some(&m.ui),
            Self::NewView(m) => Some(&m.ui),
            Self::Request(_) | Self::Reply(_) | Self::ReqViewChange(_) => None,
        }
    }

    /// The embedded message re-entering the pipeline for its own side
    /// effects (spec.md §4.3's "Embedded extraction").
    pub fn embedded(&self) -> Option<Message> {
        match self {
            Self::Prepare(m) => Some(Message::Request(m.request.clone())),
            Self::Commit(m) => Some(Message::Prepare(m.prepare.clone())),
            Self::ViewChange(m) => Some(Message::ReqViewChange(m.req_view_change.clone())),
            _ => None,
        }
    }

    /// The view a Prepare/Commit message refers to (Commit derives it from
    /// its embedded Prepare, spec.md §4.6).
    pub fn view(&self) -> Option<View> {
        match self {
            Self::Prepare(m) => Some(m.view),
            Self::Commit(m) => Some(m.prepare.view),
            _ => None,
        }
    }
}

/// `view mod N` — the primary of a given view (spec.md §4.2).
pub fn primary_of_view(view: View, n: usize) -> ReplicaId {
    (view % n as u64) as ReplicaId
}
