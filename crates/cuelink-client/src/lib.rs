//! UDP transport, session state, command facade and CLI
//!
//! This crate provides [`CueController`], the remote control for a QLab
//! workspace, and the `cuelink` command-line interface built on it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod transport;

pub use cli::Cli;
pub use config::{ClientConfig, SessionConfig};
pub use controller::{ConnectionInfo, ConnectionParams, CueController};
pub use error::{ClientError, ClientResult, ConnectError, SendError};
pub use session::{HandshakePhase, SessionHandle, SessionState};
