//! Playback and status commands.
//!
//! Each command runs against an already connected [`CueController`].

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use cuelink_core::{Cue, CurrentCueInfo};
use cuelink_protocol::PlaybackCommand;

use crate::controller::{ConnectionInfo, CueController};
use crate::error::ClientResult;

/// Machine-readable output of `cuelink status --json`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub connection: Option<ConnectionInfo>,
    pub cue: CurrentCueInfo,
}

/// Print the cues around the playback position.
pub async fn status(controller: &CueController, json: bool) -> ClientResult<()> {
    let cue = controller.snapshot().await;

    if json {
        let report = StatusReport {
            connection: controller.connection_info().await,
            cue,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let title = controller
            .workspace_name()
            .await
            .unwrap_or_else(|| "QLab".to_string());
        println!("{}\n", title);
        println!("{}", cue);
    }
    Ok(())
}

/// Reprint the status whenever it changes, until Ctrl+C.
pub async fn watch(controller: &CueController, interval: Duration) -> ClientResult<()> {
    watch_until(controller, interval, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupted, stopping watch");
    })
    .await
}

/// Reprint the status on every tick until `stop` resolves or QLab closes
/// the session.
///
/// `stop` lives across ticks, so a signal caught while a snapshot is in
/// flight ends the watch on the next turn of the loop.
pub async fn watch_until(
    controller: &CueController,
    interval: Duration,
    stop: impl Future<Output = ()>,
) -> ClientResult<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut last: Option<CurrentCueInfo> = None;
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => break,
            _ = ticker.tick() => {
                if !controller.is_connected().await {
                    println!("connection closed by QLab");
                    break;
                }
                let cue = controller.snapshot().await;
                if last.as_ref() != Some(&cue) {
                    println!("{}\n", cue);
                    last = Some(cue);
                }
            }
        }
    }
    Ok(())
}

/// Print the main cue list.
pub async fn cues(controller: &CueController) -> ClientResult<()> {
    // Refreshes the position before the table is read.
    let _ = controller.snapshot().await;
    let cues = controller.cues().await;
    if cues.is_empty() {
        println!("No cues.");
        return Ok(());
    }
    let current = controller.current_cue_id().await;
    print!("{}", render_cue_table(&cues, current.as_deref()));
    Ok(())
}

/// Renders one line per cue, marking the cue with id `current_id`.
pub fn render_cue_table(cues: &[Cue], current_id: Option<&str>) -> String {
    let id_width = cues.iter().map(|cue| cue.id.len()).max().unwrap_or(0);

    cues.iter()
        .map(|cue| {
            let marker = if Some(cue.id.as_str()) == current_id { ">" } else { " " };
            let kind = if cue.kind().is_empty() {
                String::new()
            } else {
                format!("  [{}]", cue.kind())
            };
            format!(
                "{} {:<width$}  {}{}\n",
                marker,
                cue.id,
                cue.display_label(),
                kind,
                width = id_width
            )
        })
        .collect()
}

/// Send a playback command.
pub async fn playback(controller: &CueController, command: PlaybackCommand) -> ClientResult<()> {
    match command {
        PlaybackCommand::Go => controller.send_go().await?,
        PlaybackCommand::Next => controller.send_next().await?,
        PlaybackCommand::Previous => controller.send_previous().await?,
        PlaybackCommand::Pause => controller.send_pause().await?,
        PlaybackCommand::Resume => controller.send_resume().await?,
        PlaybackCommand::Panic => controller.send_panic().await?,
    }
    debug!(%command, "command sent");

    if command.refreshes_position() {
        println!("{}", controller.snapshot().await);
    } else {
        println!("{} sent", command);
    }
    Ok(())
}

/// Rename a cue.
pub async fn rename(controller: &CueController, cue_id: &str, name: &str) -> ClientResult<()> {
    controller.rename_cue(cue_id, name).await?;
    println!("renamed {} to {:?}", cue_id, name);
    Ok(())
}
