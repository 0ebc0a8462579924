//! Client error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type for CLI and configuration operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while opening a connection.
///
/// A failed connect always leaves the controller fully torn down.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Host name did not resolve to any address.
    #[error("cannot resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Host resolved, but to no usable address.
    #[error("{host}:{port} resolved to no address")]
    NoAddress { host: String, port: u16 },

    /// Outbound socket could not be created.
    #[error("failed to create outbound socket: {0}")]
    Socket(#[source] io::Error),

    /// Reply port could not be bound (usually another client holds it).
    #[error("failed to bind reply port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A handshake message could not be sent.
    #[error("handshake failed: {0}")]
    Handshake(#[from] SendError),

    /// QLab ended the session before the handshake finished.
    #[error("server closed the session during connect")]
    ClosedByServer,
}

impl ConnectError {
    /// Creates a resolution error.
    pub fn resolve(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Resolve {
            host: host.into(),
            port,
            source,
        }
    }
}

/// Errors raised while sending a command.
#[derive(Debug, Error)]
pub enum SendError {
    /// No connection is open.
    #[error("not connected")]
    NotConnected,

    /// The OS refused the datagram.
    #[error("failed to send {address} to {target}: {source}")]
    Io {
        address: String,
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced by the `cuelink` binary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connection could not be opened.
    #[error("connection error: {0}")]
    Connect(#[from] ConnectError),

    /// A command could not be sent.
    #[error("command failed: {0}")]
    Send(#[from] SendError),

    /// Output could not be serialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
