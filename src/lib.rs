//! Core message-handling pipeline for a MinBFT replica (spec.md §1): the
//! validate → process → apply → reply chain that turns inbound wire
//! frames into ordered, executed requests and outbound replies. Transport,
//! persistence, checkpointing, and view-change completion are external
//! collaborators or explicit Non-goals (spec.md §1); this crate owns only
//! the ordering and commitment logic in between.

pub mod app;
pub mod apply;
pub mod client_state;
pub mod codec;
pub mod commitment;
pub mod config;
pub mod crypto;
pub mod error;
pub mod generated;
pub mod handler;
pub mod log;
pub mod message;
pub mod peer_state;
pub mod pending;
pub mod process;
pub mod reply;
pub mod transport;
pub mod validate;
pub mod view_state;

pub use config::ReplicaConfig;
pub use error::{CoreError, FatalError};
pub use handler::IncomingMessageHandler;
pub use message::Message;

/// Wires every component into a working `IncomingMessageHandler` for one
/// replica (spec.md §2). A thin convenience constructor over the
/// individually-testable pieces above; production callers may prefer to
/// assemble the pipeline themselves to share registries across
/// connections.
pub fn build_replica(
    replica_id: message::ReplicaId,
    config: &ReplicaConfig,
    usig: Box<dyn crypto::Usig>,
    signer: Box<dyn crypto::SignatureScheme>,
    verifier: std::sync::Arc<dyn crypto::Usig>,
    verify_signer: std::sync::Arc<dyn crypto::SignatureScheme>,
    app: std::sync::Arc<std::sync::Mutex<dyn app::Application>>,
    sink: std::sync::Arc<dyn log::GeneratedMessageSink>,
) -> IncomingMessageHandler {
    let client_states = std::sync::Arc::new(client_state::ClientStateRegistry::new(
        config.request_timeout,
        config.prepare_timeout,
    ));
    let peer_states = std::sync::Arc::new(peer_state::PeerStateRegistry::new());
    let view_state = std::sync::Arc::new(view_state::ViewState::new());
    let pending = std::sync::Arc::new(pending::PendingRequestList::new());
    let generated = std::sync::Arc::new(generated::GeneratedMessageHandler::new(
        replica_id,
        usig,
        signer,
        client_states.clone(),
        sink,
    ));
    let applier = std::sync::Arc::new(apply::Applier::new(
        replica_id,
        config.n,
        client_states.clone(),
        pending.clone(),
        std::sync::Arc::new(commitment::CommitmentCounter::new(config.f)),
        std::sync::Arc::new(commitment::ViewChangeCounter::new(config.f)),
        view_state.clone(),
        generated.clone(),
        app,
    ));
    let pipeline = process::Pipeline::new(
        replica_id,
        config.n,
        client_states.clone(),
        peer_states,
        view_state,
        pending,
        generated,
        applier,
    );
    let validator = validate::MessageValidator::new(config.n, verifier, verify_signer);
    IncomingMessageHandler::new(validator, pipeline, client_states)
}

/// In-memory fixtures for exercising a full replica pipeline without a
/// transport or a real USIG (spec.md §8's testable properties).
pub mod testutil {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::app::EchoApplication;
    use crate::crypto::nop::{NopSignatureScheme, NopUsig};
    use crate::log::MessageLog;
    use crate::message::ReplicaId;
    use crate::{build_replica, handler::IncomingMessageHandler, ReplicaConfig};

    /// A single replica's pipeline, its own message log (what it would
    /// fan out to peers and back to itself), and its application, for
    /// assembling an N-replica test network by hand.
    pub struct ReplicaFixture {
        pub handler: IncomingMessageHandler,
        pub log: MessageLog,
    }

    pub fn replica_fixture(replica_id: ReplicaId, n: usize, f: usize) -> ReplicaFixture {
        let config = ReplicaConfig::new(n, f, Duration::from_millis(500), Duration::from_millis(500));
        let log = MessageLog::new();
        let handler = build_replica(
            replica_id,
            &config,
            Box::new(NopUsig::new()),
            Box::new(NopSignatureScheme),
            Arc::new(NopUsig::new()),
            Arc::new(NopSignatureScheme),
            Arc::new(Mutex::new(EchoApplication::default())),
            Arc::new(log.clone()),
        );
        ReplicaFixture { handler, log }
    }
}
