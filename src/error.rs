//! Error taxonomy (spec.md §7).

use thiserror::Error;

/// Errors a sub-step of the processing pipeline can return. Both
/// variants are "drop with warning" at the transport loop; neither
/// mutates durable state beyond what a prior successful sub-step already
/// committed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed or unauthentic message (§7: "MalformedOrUnauthentic").
    #[error("validation failed: {0}")]
    Validation(String),
    /// A protocol invariant was violated by an otherwise well-formed
    /// message (e.g. "skipped commitment", "duplicated commitment",
    /// "unexpected view").
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Errors that the generated-message path treats as fatal (spec.md §7):
/// the replica cannot safely continue emitting unsequenced messages, so
/// these are surfaced for the caller to `panic!` on rather than returned
/// up through `Result` chains that could be silently ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("USIG failure: {0}")]
    Usig(String),
    #[error("signing failure: {0}")]
    Signing(String),
    #[error("codec failure on outgoing message: {0}")]
    Codec(String),
}
