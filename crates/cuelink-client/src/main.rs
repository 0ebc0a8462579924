//! cuelink CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use cuelink_client::cli::{Cli, Command, ConfigAction};
use cuelink_client::commands::{config, playback};
use cuelink_client::config::ClientConfig;
use cuelink_client::controller::CueController;
use cuelink_client::error::ClientResult;
use cuelink_core::{init_tracing, TracingConfig};
use cuelink_protocol::PlaybackCommand;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    // Config commands never touch the network.
    if let Command::Config { ref action } = cli.command {
        return match action {
            ConfigAction::Dump => config::dump(&config),
            ConfigAction::Path => config::path(),
        };
    }

    let controller = CueController::new(config.session_config());
    controller.connect(cli.connection_params(&config)).await?;

    let result = match cli.command {
        Command::Status { json } => playback::status(&controller, json).await,
        Command::Watch { interval } => {
            playback::watch(&controller, Duration::from_millis(interval.max(50))).await
        }
        Command::Cues => playback::cues(&controller).await,
        Command::Go => playback::playback(&controller, PlaybackCommand::Go).await,
        Command::Next => playback::playback(&controller, PlaybackCommand::Next).await,
        Command::Previous => playback::playback(&controller, PlaybackCommand::Previous).await,
        Command::Panic => playback::playback(&controller, PlaybackCommand::Panic).await,
        Command::Pause => playback::playback(&controller, PlaybackCommand::Pause).await,
        Command::Resume => playback::playback(&controller, PlaybackCommand::Resume).await,
        Command::Rename { ref cue_id, ref name } => {
            playback::rename(&controller, cue_id, name).await
        }
        Command::Config { .. } => Ok(()),
    };

    controller.disconnect().await;
    result
}
