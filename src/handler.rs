//! Incoming Message Handler (spec.md §2.1, §4.1): the single entry point
//! transport code calls for every inbound frame, and the one the
//! Generated-Message Handler's self-loop calls for a replica's own
//! messages. Grounded on the Go source's `defaultIncomingMessageHandler`.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::client_state::ClientStateRegistry;
use crate::error::CoreError;
use crate::message::Message;
use crate::process::Pipeline;
use crate::reply::reply_channel;
use crate::validate::MessageValidator;

/// Composes validation, processing, and (for externally-submitted
/// requests) reply delivery (spec.md §4.1).
pub struct IncomingMessageHandler {
    validator: MessageValidator,
    pipeline: Pipeline,
    client_states: Arc<ClientStateRegistry>,
}

impl IncomingMessageHandler {
    pub fn new(validator: MessageValidator, pipeline: Pipeline, client_states: Arc<ClientStateRegistry>) -> Self {
        Self {
            validator,
            pipeline,
            client_states,
        }
    }

    /// `own = false` for messages arriving over the transport: validated
    /// before processing, and a `Request` is handed a reply channel.
    /// `own = true` for messages fed back from this replica's own message
    /// log: already trusted, so validation is skipped and no reply channel
    /// is produced (spec.md §4.1).
    pub fn handle(&self, message: Message, own: bool) -> Result<Option<oneshot::Receiver<crate::message::Reply>>, CoreError> {
        if !own {
            self.validator.validate(&message)?;
        }

        let pending_reply = if !own {
            match &message {
                Message::Request(request) => Some((request.client_id, request.seq)),
                _ => None,
            }
        } else {
            None
        };

        let new = self.pipeline.process(message)?;

        // A duplicate request (spec.md §8: "return new=false, err=nil")
        // produces no reply channel of its own; the caller that submitted
        // the original request is still awaiting its own channel.
        let reply_rx = match pending_reply {
            Some((client_id, seq)) if new => Some(reply_channel(self.client_states.clone(), client_id, seq)),
            _ => None,
        };
        Ok(reply_rx)
    }
}
