//! Protocol error types.

use thiserror::Error;

/// Result type for decoding inbound packets.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding an inbound datagram.
///
/// None of these are fatal to a session: the receive loop logs them and
/// waits for the next datagram.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Datagram is larger than the receive buffer allows.
    #[error("packet too large: {size} bytes (max: {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// No NUL-terminated address at the start of the packet.
    #[error("packet has no OSC address")]
    MissingAddress,

    /// Reply payload contains no `{...}` block.
    #[error("reply to {address} carries no JSON payload")]
    MissingJson { address: String },

    /// Embedded JSON failed to parse.
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedded JSON parsed but is not an object.
    #[error("reply JSON is not an object")]
    NotAnObject,
}
