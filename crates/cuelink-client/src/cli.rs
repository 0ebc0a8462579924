//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ClientConfig;
use crate::controller::ConnectionParams;

/// cuelink - Remote control for QLab over OSC
#[derive(Debug, Parser)]
#[command(name = "cuelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CUELINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    // --- Connection flags ---
    /// QLab host name or IP address
    #[arg(long, env = "CUELINK_HOST")]
    pub host: Option<String>,

    /// QLab OSC port
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Workspace passcode
    #[arg(long, env = "CUELINK_PASSCODE", hide_env_values = true)]
    pub passcode: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Connection parameters: flags first, then the config file.
    pub fn connection_params(&self, config: &ClientConfig) -> ConnectionParams {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| config.connection.host.clone());
        let port = self.port.unwrap_or(config.connection.port);
        let passcode = self
            .passcode
            .clone()
            .or_else(|| config.connection.passcode.clone())
            .unwrap_or_default();
        ConnectionParams::new(host, port).with_passcode(passcode)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the cues around the playback position
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Follow the playback position until interrupted
    Watch {
        /// Refresh interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,
    },

    /// List the cues of the main cue list
    Cues,

    /// Fire the cue at the playhead
    Go,

    /// Move the playhead to the next cue
    Next,

    /// Move the playhead to the previous cue
    Previous,

    /// Stop all cues
    Panic,

    /// Pause all running cues
    Pause,

    /// Resume all paused cues
    Resume,

    /// Rename a cue
    Rename {
        /// Unique id of the cue
        cue_id: String,

        /// New cue name
        name: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
