//! Message serialisation (spec.md §1, §6): an external collaborator with
//! a bijective encode/decode on the message algebra. The core never
//! depends on the concrete wire format and treats codec errors on inbound
//! bytes as "drop with warning" (spec.md §7); codec errors on outgoing,
//! well-typed messages are fatal.

use crate::error::FatalError;
use crate::message::Message;

pub trait MessageCodec: Send + Sync {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, FatalError>;
    fn decode(&self, bytes: &[u8]) -> Result<Message, String>;
}

/// `bincode`-backed codec, the teacher's serialisation crate
/// (`Cargo.toml`'s `bincode` dependency, used throughout
/// `context/tokio.rs`). A real deployment would use Protocol Buffers, as
/// the source does, but the core is codec-agnostic by contract (spec.md
/// §6); `bincode` stands in as the concrete choice carried over from the
/// teacher.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl MessageCodec for BincodeCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, FatalError> {
        bincode::serialize(message).map_err(|e| FatalError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}
