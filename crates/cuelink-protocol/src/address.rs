//! QLab OSC address book.
//!
//! Most commands exist both workspace-scoped (`/workspace/{id}/go`) and
//! unscoped (`/go`). The helpers here take the workspace id as an
//! `Option` and fall back to the unscoped form when it is not known yet.

use std::fmt;

/// Workspace listing query.
pub const WORKSPACES: &str = "/workspaces";

/// Prefix QLab adds to the address of every query reply.
pub const REPLY_PREFIX: &str = "/reply";

/// Prefix of unsolicited update notifications.
pub const UPDATE_PREFIX: &str = "/update";

/// Argument enabling update notifications.
pub const UPDATES_ON: &str = "1";

/// Argument disabling update notifications.
pub const UPDATES_OFF: &str = "0";

/// Argument-less playback commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Fire the cue at the playhead and advance.
    Go,
    /// Fade out and stop everything.
    Panic,
    /// Pause all running cues.
    Pause,
    /// Resume all paused cues.
    Resume,
    /// Move the playhead to the previous cue.
    Previous,
    /// Move the playhead to the next cue.
    Next,
}

impl PlaybackCommand {
    /// Path relative to the workspace.
    pub fn path(self) -> &'static str {
        match self {
            Self::Go => "/go",
            Self::Panic => "/panic",
            Self::Pause => "/pause",
            Self::Resume => "/resume",
            Self::Previous => "/playhead/previous",
            Self::Next => "/playhead/next",
        }
    }

    /// Whether the playback position is re-queried after sending.
    ///
    /// Panic stops cues but never moves the playhead.
    pub fn refreshes_position(self) -> bool {
        !matches!(self, Self::Panic)
    }
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Go => "go",
            Self::Panic => "panic",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Previous => "previous",
            Self::Next => "next",
        };
        f.write_str(name)
    }
}

/// Prefixes `path` with `/workspace/{id}` when the workspace is known.
pub fn scoped(workspace_id: Option<&str>, path: &str) -> String {
    match workspace_id {
        Some(id) => format!("/workspace/{}{}", id, path),
        None => path.to_string(),
    }
}

/// Authentication address; the passcode is the single argument.
pub fn connect(workspace_id: Option<&str>) -> String {
    scoped(workspace_id, "/connect")
}

/// Cue-list query. Unscoped, QLab answers for the front workspace.
pub fn cue_lists(workspace_id: Option<&str>) -> String {
    scoped(workspace_id, "/cueLists")
}

/// Children of a cue list, in playback order.
pub fn cue_children(workspace_id: Option<&str>, cue_list_id: &str) -> String {
    scoped(workspace_id, &format!("/cue_id/{}/children", cue_list_id))
}

/// Id of the cue at a cue list's playhead.
pub fn playback_position(workspace_id: Option<&str>, cue_list_id: &str) -> String {
    scoped(
        workspace_id,
        &format!("/cue_id/{}/playbackPositionId", cue_list_id),
    )
}

/// A playback command.
pub fn command(workspace_id: Option<&str>, command: PlaybackCommand) -> String {
    scoped(workspace_id, command.path())
}

/// Sets a cue's name; the new name is the single argument.
pub fn rename(workspace_id: Option<&str>, cue_id: &str) -> String {
    scoped(workspace_id, &format!("/cue_id/{}/name", cue_id))
}

/// Enables or disables update notifications with `"1"` / `"0"`.
pub fn updates(workspace_id: Option<&str>) -> String {
    scoped(workspace_id, "/updates")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_and_unscoped() {
        assert_eq!(connect(Some("W1")), "/workspace/W1/connect");
        assert_eq!(connect(None), "/connect");
        assert_eq!(cue_lists(Some("W1")), "/workspace/W1/cueLists");
        assert_eq!(cue_lists(None), "/cueLists");
        assert_eq!(updates(None), "/updates");
    }

    #[test]
    fn cue_scoped_addresses() {
        assert_eq!(
            cue_children(Some("W1"), "L1"),
            "/workspace/W1/cue_id/L1/children"
        );
        assert_eq!(
            playback_position(Some("W1"), "L1"),
            "/workspace/W1/cue_id/L1/playbackPositionId"
        );
        assert_eq!(rename(Some("W1"), "C9"), "/workspace/W1/cue_id/C9/name");
        assert_eq!(rename(None, "C9"), "/cue_id/C9/name");
    }

    #[test]
    fn playback_commands() {
        assert_eq!(command(Some("W1"), PlaybackCommand::Go), "/workspace/W1/go");
        assert_eq!(
            command(Some("W1"), PlaybackCommand::Previous),
            "/workspace/W1/playhead/previous"
        );
        assert_eq!(command(None, PlaybackCommand::Next), "/playhead/next");
        assert_eq!(command(None, PlaybackCommand::Panic), "/panic");
    }

    #[test]
    fn panic_skips_position_refresh() {
        assert!(!PlaybackCommand::Panic.refreshes_position());
        assert!(PlaybackCommand::Go.refreshes_position());
        assert!(PlaybackCommand::Pause.refreshes_position());
        assert_eq!(PlaybackCommand::Previous.to_string(), "previous");
    }
}
