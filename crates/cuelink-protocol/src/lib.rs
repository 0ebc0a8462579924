//! QLab OSC wire protocol for cuelink.
//!
//! QLab listens for OSC messages over UDP and answers on a separate port.
//! This crate knows nothing about sockets; it only turns addresses into
//! packets and packets back into typed messages.
//!
//! # Protocol Overview
//!
//! - outbound: one OSC message per datagram, with no argument or a single
//!   string argument ([`osc::encode`])
//! - inbound replies: `/reply/<query address>` followed by a JSON object
//! - inbound updates: `/update/workspace/{id}/...` with an optional
//!   string argument
//!
//! # Example
//!
//! ```rust
//! use cuelink_protocol::{address, interpret, osc, Inbound, Update};
//!
//! let packet = osc::encode(&address::command(Some("W1"), address::PlaybackCommand::Go), None);
//! assert_eq!(osc::decode_address(&packet), "/workspace/W1/go");
//!
//! let update = osc::encode("/update/workspace/W1/cueList/L1/playbackPosition", Some("C2"));
//! match interpret(&update).unwrap() {
//!     Inbound::Update(Update::PlaybackPosition { cue_id, .. }) => {
//!         assert_eq!(cue_id.as_deref(), Some("C2"));
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod address;
mod error;
pub mod osc;
pub mod reply;

pub use address::PlaybackCommand;
pub use error::{DecodeError, DecodeResult};
pub use reply::{
    classify, interpret, CueListSummary, Inbound, MessageKind, Reply, ReplyData, Update,
    WorkspaceSummary,
};

/// Port QLab listens on for OSC messages.
pub const DEFAULT_SERVER_PORT: u16 = 53000;

/// Local port QLab sends replies to.
pub const DEFAULT_REPLY_PORT: u16 = 53001;

/// Largest datagram accepted by the receive loop (32 KiB).
///
/// Cue-list replies for large shows are the biggest packets QLab sends.
pub const MAX_PACKET_SIZE: usize = 32 * 1024;
