//! Session state reconstructed from inbound packets.
//!
//! [`SessionState::apply`] is the only way inbound traffic changes state.
//! It never performs I/O: the messages a packet should trigger (the cue
//! lists after the workspace, children after the cue list, and so on) come
//! back as [`FollowUp`] values for the caller to send.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use cuelink_core::{Cue, CurrentCueInfo};
use cuelink_protocol::{Inbound, Reply, ReplyData, Update};

/// Where the connect handshake stands, derived from what is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakePhase {
    /// No workspace listing seen yet.
    AwaitingWorkspace,
    /// Workspace known, main cue list not yet.
    AwaitingCueList,
    /// Cue list known, no cue table received yet.
    AwaitingCues,
    /// Cue table loaded; only position changes are expected.
    Steady,
}

/// A message the session needs sent in response to an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Query the cue lists of the current workspace.
    RequestCueLists,
    /// Query the children of the main cue list.
    RequestCueChildren { cue_list_id: String },
    /// Query the playback position of the main cue list.
    RequestPlaybackPosition { cue_list_id: String },
    /// The server ended the session.
    Disconnect,
}

/// Everything known about the remote workspace.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connected: bool,
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub main_cue_list_id: Option<String>,
    /// Children of the main cue list, in server order.
    pub cues: Vec<Cue>,
    pub current_cue_id: Option<String>,
    /// Set once connect returned; later workspace listings cascade.
    pub handshake_complete: bool,
    /// Bumped every time a playback position is applied.
    pub position_epoch: u64,
    has_cue_table: bool,
}

impl SessionState {
    /// Empty state for a freshly opened connection.
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Current handshake phase.
    pub fn phase(&self) -> HandshakePhase {
        if self.workspace_id.is_none() && self.main_cue_list_id.is_none() {
            HandshakePhase::AwaitingWorkspace
        } else if self.main_cue_list_id.is_none() {
            HandshakePhase::AwaitingCueList
        } else if !self.has_cue_table {
            HandshakePhase::AwaitingCues
        } else {
            HandshakePhase::Steady
        }
    }

    /// Snapshot of the cue around the playback position.
    pub fn current_cue_info(&self) -> CurrentCueInfo {
        CurrentCueInfo::from_cues(&self.cues, self.current_cue_id.as_deref())
    }

    /// Applies one decoded packet and returns the messages it calls for.
    pub fn apply(&mut self, inbound: Inbound) -> Vec<FollowUp> {
        match inbound {
            Inbound::Reply(reply) => self.apply_reply(reply),
            Inbound::Update(update) => self.apply_update(update),
        }
    }

    fn apply_reply(&mut self, reply: Reply) -> Vec<FollowUp> {
        match reply.data {
            ReplyData::Workspaces(workspaces) => {
                let Some(first) = workspaces.into_iter().next() else {
                    return Vec::new();
                };
                let changed = self.workspace_id.as_deref() != Some(first.id.as_str());
                info!(
                    workspace = %first.id,
                    name = first.display_name.as_deref().unwrap_or(""),
                    "workspace found"
                );
                self.workspace_id = Some(first.id);
                self.workspace_name = first.display_name;

                if self.handshake_complete && (changed || self.main_cue_list_id.is_none()) {
                    vec![FollowUp::RequestCueLists]
                } else {
                    Vec::new()
                }
            }
            ReplyData::CueLists(lists) => {
                let Some(main) = lists.into_iter().next() else {
                    return Vec::new();
                };
                if self.workspace_id.is_none() {
                    self.workspace_id = reply.workspace_id;
                }
                info!(
                    cue_list = %main.id,
                    name = main.name.as_deref().unwrap_or(""),
                    "main cue list found"
                );
                self.main_cue_list_id = Some(main.id.clone());
                vec![FollowUp::RequestCueChildren {
                    cue_list_id: main.id,
                }]
            }
            ReplyData::Cues(cues) => {
                info!(count = cues.len(), "cue table loaded");
                self.cues = cues;
                self.has_cue_table = true;
                self.main_cue_list_id
                    .clone()
                    .map(|cue_list_id| FollowUp::RequestPlaybackPosition { cue_list_id })
                    .into_iter()
                    .collect()
            }
            ReplyData::PlaybackPosition(cue_id) => {
                self.set_position(cue_id);
                Vec::new()
            }
            ReplyData::Authentication { accepted } => {
                if accepted {
                    debug!(address = %reply.address, "passcode accepted");
                } else {
                    warn!(address = %reply.address, "passcode rejected");
                }
                Vec::new()
            }
            ReplyData::Rejected { status } => {
                warn!(address = %reply.address, status = %status, "request refused by server");
                Vec::new()
            }
            ReplyData::Unrecognized => {
                debug!(address = %reply.address, "ignoring reply");
                Vec::new()
            }
        }
    }

    fn apply_update(&mut self, update: Update) -> Vec<FollowUp> {
        if let (Some(theirs), Some(ours)) = (update.workspace_id(), self.workspace_id.as_deref())
            && theirs != ours
        {
            debug!(workspace = theirs, "ignoring update for another workspace");
            return Vec::new();
        }

        match update {
            Update::PlaybackPosition {
                cue_list_id,
                cue_id,
                ..
            } => {
                let is_main = self
                    .main_cue_list_id
                    .as_deref()
                    .is_none_or(|main| main == cue_list_id);
                if is_main {
                    self.set_position(cue_id);
                }
                Vec::new()
            }
            Update::WorkspaceChanged { .. } => vec![FollowUp::RequestCueLists],
            Update::CueChanged { cue_id, .. } => {
                let Some(main) = self.main_cue_list_id.clone() else {
                    return Vec::new();
                };
                let known = main == cue_id || self.cues.iter().any(|cue| cue.id == cue_id);
                if known {
                    vec![FollowUp::RequestCueChildren { cue_list_id: main }]
                } else {
                    Vec::new()
                }
            }
            Update::Disconnect { .. } => vec![FollowUp::Disconnect],
            Update::Other { address } => {
                debug!(%address, "ignoring update");
                Vec::new()
            }
        }
    }

    fn set_position(&mut self, cue_id: Option<String>) {
        debug!(cue = cue_id.as_deref().unwrap_or("none"), "playback position");
        self.current_cue_id = cue_id;
        self.position_epoch += 1;
    }
}

/// Shared session state plus a revision counter bumped on every change.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<SessionState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Creates a handle around an empty, disconnected state.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            revision: Arc::new(revision),
        }
    }

    /// Read access to the state.
    pub async fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Mutates the state and notifies subscribers.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let result = {
            let mut state = self.state.write().await;
            f(&mut state)
        };
        self.revision.send_modify(|revision| *revision += 1);
        result
    }

    /// Returns a receiver that changes whenever the state does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Waits until `predicate` holds, for at most `timeout`.
    ///
    /// Returns whether the predicate held before the timeout.
    pub async fn wait_until(
        &self,
        timeout: Duration,
        predicate: impl Fn(&SessionState) -> bool,
    ) -> bool {
        let mut revisions = self.subscribe();
        let wait = async {
            loop {
                revisions.mark_unchanged();
                if predicate(&*self.state.read().await) {
                    return true;
                }
                if revisions.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}
