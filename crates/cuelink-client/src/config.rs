//! Client configuration.
//!
//! [`SessionConfig`] tunes a single [`CueController`](crate::CueController)
//! session: the reply port and every handshake wait. [`ClientConfig`] is
//! the `cuelink` binary's `config.toml`, found at
//! `~/.config/cuelink/config.toml` by default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cuelink_protocol::{DEFAULT_REPLY_PORT, DEFAULT_SERVER_PORT, MAX_PACKET_SIZE};

use crate::error::{ClientError, ClientResult};

/// Largest payload a UDP datagram can carry over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Session tuning.
///
/// Every wait is an upper bound: it ends early as soon as the state it is
/// waiting for shows up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local UDP port QLab sends replies to. `0` picks an ephemeral port.
    pub reply_port: u16,

    /// Largest datagram accepted; bigger ones are dropped.
    pub max_packet_size: usize,

    /// Pause after the unscoped authentication attempt.
    pub auth_settle: Duration,

    /// How long to wait for the workspace listing during connect.
    pub workspace_wait: Duration,

    /// How long connect waits for the cue table before returning.
    pub connect_settle: Duration,

    /// Pause between a playback command and the position re-query.
    pub command_refresh_delay: Duration,

    /// How long a snapshot waits for the position reply.
    pub snapshot_wait: Duration,

    /// How long disconnect waits for the receive loop to stop.
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_port: DEFAULT_REPLY_PORT,
            max_packet_size: MAX_PACKET_SIZE,
            auth_settle: Duration::from_millis(300),
            workspace_wait: Duration::from_secs(1),
            connect_settle: Duration::from_millis(500),
            command_refresh_delay: Duration::from_millis(50),
            snapshot_wait: Duration::from_millis(150),
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Creates a session configuration with default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the local reply port.
    pub fn with_reply_port(mut self, port: u16) -> Self {
        self.reply_port = port;
        self
    }

    /// Builder: set the maximum accepted packet size, capped at
    /// [`MAX_UDP_PAYLOAD`].
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.min(MAX_UDP_PAYLOAD);
        self
    }

    /// Builder: set the post-authentication pause.
    pub fn with_auth_settle(mut self, wait: Duration) -> Self {
        self.auth_settle = wait;
        self
    }

    /// Builder: set the workspace listing wait.
    pub fn with_workspace_wait(mut self, wait: Duration) -> Self {
        self.workspace_wait = wait;
        self
    }

    /// Builder: set the final connect wait.
    pub fn with_connect_settle(mut self, wait: Duration) -> Self {
        self.connect_settle = wait;
        self
    }

    /// Builder: set the delay before re-querying the playback position.
    pub fn with_command_refresh_delay(mut self, wait: Duration) -> Self {
        self.command_refresh_delay = wait;
        self
    }

    /// Builder: set the snapshot wait.
    pub fn with_snapshot_wait(mut self, wait: Duration) -> Self {
        self.snapshot_wait = wait;
        self
    }

    /// Builder: set the receive-loop shutdown timeout.
    pub fn with_close_timeout(mut self, wait: Duration) -> Self {
        self.close_timeout = wait;
        self
    }
}

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the `cuelink` binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Which QLab to talk to.
    pub connection: ConnectionSettings,

    /// Overrides for the session waits.
    pub timing: TimingSettings,
}

/// Where QLab runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Host name or IP address of the QLab machine.
    pub host: String,

    /// QLab OSC port.
    pub port: u16,

    /// Workspace passcode, if the workspace requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
            passcode: None,
        }
    }
}

/// Millisecond overrides for [`SessionConfig`]; unset values keep defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_settle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_wait_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_settle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_refresh_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_wait_ms: Option<u64>,
}

impl TimingSettings {
    /// Applies the overrides on top of the default session configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(port) = self.reply_port {
            config.reply_port = port;
        }
        let overrides = [
            (self.auth_settle_ms, &mut config.auth_settle),
            (self.workspace_wait_ms, &mut config.workspace_wait),
            (self.connect_settle_ms, &mut config.connect_settle),
            (self.command_refresh_delay_ms, &mut config.command_refresh_delay),
            (self.snapshot_wait_ms, &mut config.snapshot_wait),
        ];
        for (millis, slot) in overrides {
            if let Some(millis) = millis {
                *slot = Duration::from_millis(millis);
            }
        }
        config
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults when the
    /// file does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cuelink")
    }

    /// Session configuration derived from the `[timing]` table.
    pub fn session_config(&self) -> SessionConfig {
        self.timing.to_session_config()
    }
}
