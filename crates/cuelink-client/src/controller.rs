//! The command facade: connect, drive playback, read snapshots.
//!
//! A [`CueController`] owns at most one live connection. Replies are
//! applied to the shared [`SessionHandle`] by the transport's receive loop;
//! commands read the handle to pick workspace-scoped addresses and to build
//! [`CurrentCueInfo`] snapshots.
//!
//! # Example
//!
//! ```no_run
//! use cuelink_client::{ConnectionParams, CueController, SessionConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = CueController::new(SessionConfig::default());
//! controller.connect(ConnectionParams::new("192.168.1.20", 53000)).await?;
//! controller.send_go().await?;
//! println!("{}", controller.snapshot().await);
//! controller.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use cuelink_core::{Cue, CurrentCueInfo};
use cuelink_protocol::address::{self, PlaybackCommand, UPDATES_OFF, UPDATES_ON, WORKSPACES};
use cuelink_protocol::{interpret, DEFAULT_SERVER_PORT};

use crate::config::SessionConfig;
use crate::error::{ConnectError, SendError};
use crate::session::{FollowUp, HandshakePhase, SessionHandle, SessionState};
use crate::transport::{OscSender, ShutdownHandle, Transport};

/// Where to connect. Fixed for the lifetime of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub passcode: Option<String>,
}

impl ConnectionParams {
    /// Parameters for a workspace without a passcode.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            passcode: None,
        }
    }

    /// Builder: set the passcode. Empty passcodes are ignored.
    pub fn with_passcode(mut self, passcode: impl Into<String>) -> Self {
        let passcode = passcode.into();
        self.passcode = (!passcode.is_empty()).then_some(passcode);
        self
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_SERVER_PORT)
    }
}

/// Description of the live connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    #[serde(skip)]
    pub passcode: Option<String>,
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub reply_addr: SocketAddr,
    pub phase: HandshakePhase,
}

/// Sending half of the live connection.
#[derive(Debug, Clone)]
struct Link {
    sender: OscSender,
    params: ConnectionParams,
    connected_at: DateTime<Utc>,
    reply_addr: SocketAddr,
}

type SharedLink = Arc<RwLock<Option<Link>>>;

/// Remote control for one QLab workspace.
pub struct CueController {
    config: SessionConfig,
    session: SessionHandle,
    /// Serializes connect and disconnect; owns the transport.
    lifecycle: Mutex<Option<Transport>>,
    link: SharedLink,
}

impl Default for CueController {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl CueController {
    /// Creates a disconnected controller.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: SessionHandle::new(),
            lifecycle: Mutex::new(None),
            link: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connects to a QLab server, replacing any current connection.
    ///
    /// Success only means the sockets opened and the handshake went out;
    /// the session fills in as replies arrive.
    ///
    /// # Errors
    ///
    /// Returns an error when the host does not resolve, a socket cannot be
    /// opened, a handshake message cannot be sent, or QLab closes the
    /// session before the handshake is done. The controller is fully
    /// disconnected afterwards.
    pub async fn connect(&self, params: ConnectionParams) -> Result<(), ConnectError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(previous) = lifecycle.take() {
            info!("replacing existing connection");
            self.teardown(Some(previous)).await;
        }

        let mut transport = match Transport::open(&params.host, params.port, &self.config).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(host = %params.host, port = params.port, error = %e, "connect failed");
                return Err(e);
            }
        };

        self.session.update(|s| *s = SessionState::connected()).await;

        let sender = transport.sender();
        let receiver = ReceiveContext {
            session: self.session.clone(),
            link: self.link.clone(),
            sender: sender.clone(),
            shutdown: transport.shutdown_handle(),
        };
        transport.start(move |packet| {
            let receiver = receiver.clone();
            async move { receiver.handle(&packet).await }
        });

        *self.link.write().await = Some(Link {
            sender: sender.clone(),
            params: params.clone(),
            connected_at: Utc::now(),
            reply_addr: transport.local_reply_addr(),
        });
        *lifecycle = Some(transport);

        if let Err(e) = self.handshake(&sender, &params).await {
            warn!(error = %e, "handshake failed");
            self.teardown(lifecycle.take()).await;
            return Err(e.into());
        }

        if self.link.read().await.is_none() {
            warn!(host = %params.host, port = params.port, "server closed the session during connect");
            self.teardown(lifecycle.take()).await;
            return Err(ConnectError::ClosedByServer);
        }

        let state = self.session.read().await;
        info!(
            host = %params.host,
            port = params.port,
            workspace = state.workspace_id.as_deref().unwrap_or("unknown"),
            phase = ?state.phase(),
            "connected"
        );
        Ok(())
    }

    async fn handshake(&self, sender: &OscSender, params: &ConnectionParams) -> Result<(), SendError> {
        let passcode = params.passcode.as_deref();

        if let Some(passcode) = passcode {
            sender.send(&address::connect(None), Some(passcode)).await?;
            tokio::time::sleep(self.config.auth_settle).await;
        }

        sender.send(WORKSPACES, None).await?;
        let found = self
            .session
            .wait_until(self.config.workspace_wait, |s| s.workspace_id.is_some())
            .await;
        if !found {
            debug!("no workspace listing yet, using unscoped addresses");
        }

        let workspace_id = self.session.read().await.workspace_id.clone();
        let workspace = workspace_id.as_deref();

        if let (Some(passcode), Some(_)) = (passcode, workspace) {
            sender.send(&address::connect(workspace), Some(passcode)).await?;
        }

        sender.send(&address::updates(workspace), Some(UPDATES_ON)).await?;
        sender.send(&address::cue_lists(workspace), None).await?;

        self.session
            .wait_until(self.config.connect_settle, |s| {
                s.phase() == HandshakePhase::Steady
            })
            .await;
        self.session
            .update(|s| {
                if s.connected {
                    s.handshake_complete = true;
                }
            })
            .await;
        Ok(())
    }

    /// Disconnects: disables updates, stops the receive loop, closes the
    /// sockets and clears the session. Never fails.
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let transport = lifecycle.take();
        let was_open = transport.is_some();
        self.teardown(transport).await;
        if was_open {
            info!("disconnected");
        }
    }

    async fn teardown(&self, transport: Option<Transport>) {
        let link = self.link.write().await.take();
        let workspace_id = self.session.read().await.workspace_id.clone();

        if let Some(link) = link
            && let Err(e) = link
                .sender
                .send(&address::updates(workspace_id.as_deref()), Some(UPDATES_OFF))
                .await
        {
            debug!(error = %e, "could not disable updates");
        }

        if let Some(mut transport) = transport {
            transport.close().await;
        }

        self.session.update(|s| *s = SessionState::default()).await;
    }

    /// Returns true while a connection is open.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.connected
    }

    /// Describes the live connection, or `None` when disconnected.
    pub async fn connection_info(&self) -> Option<ConnectionInfo> {
        let link = self.link.read().await.clone()?;
        let state = self.session.read().await;
        Some(ConnectionInfo {
            host: link.params.host,
            port: link.params.port,
            passcode: link.params.passcode,
            workspace_id: state.workspace_id.clone(),
            workspace_name: state.workspace_name.clone(),
            connected_at: link.connected_at,
            reply_addr: link.reply_addr,
            phase: state.phase(),
        })
    }

    /// Display name of the connected workspace, once known.
    pub async fn workspace_name(&self) -> Option<String> {
        self.session.read().await.workspace_name.clone()
    }

    /// Copy of the main cue list, in playback order.
    pub async fn cues(&self) -> Vec<Cue> {
        self.session.read().await.cues.clone()
    }

    /// Id of the cue at the playback position, as last reported.
    pub async fn current_cue_id(&self) -> Option<String> {
        self.session.read().await.current_cue_id.clone()
    }

    /// Receiver that changes whenever session state does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.session.subscribe()
    }

    /// Fires the cue at the playhead.
    pub async fn send_go(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Go).await
    }

    /// Moves the playhead to the next cue.
    pub async fn send_next(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Next).await
    }

    /// Moves the playhead to the previous cue.
    pub async fn send_previous(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Previous).await
    }

    /// Pauses all running cues.
    pub async fn send_pause(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Pause).await
    }

    /// Resumes all paused cues.
    pub async fn send_resume(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Resume).await
    }

    /// Stops everything. The playback position is not re-queried.
    pub async fn send_panic(&self) -> Result<(), SendError> {
        self.send_playback(PlaybackCommand::Panic).await
    }

    /// Renames a cue.
    pub async fn rename_cue(&self, cue_id: &str, new_name: &str) -> Result<(), SendError> {
        let (sender, workspace_id) = self.live_sender().await?;
        let result = sender
            .send(&address::rename(workspace_id.as_deref(), cue_id), Some(new_name))
            .await;
        if let Err(ref e) = result {
            warn!(cue = cue_id, error = %e, "rename failed");
        }
        result
    }

    async fn send_playback(&self, command: PlaybackCommand) -> Result<(), SendError> {
        let (sender, workspace_id) = self.live_sender().await?;
        if let Err(e) = sender
            .send(&address::command(workspace_id.as_deref(), command), None)
            .await
        {
            warn!(%command, error = %e, "command failed");
            return Err(e);
        }

        if command.refreshes_position() {
            tokio::time::sleep(self.config.command_refresh_delay).await;
            if let Err(e) = self.request_position(&sender).await {
                debug!(%command, error = %e, "position refresh failed");
            }
        }
        Ok(())
    }

    /// Queries the playback position and returns a snapshot of the cues
    /// around it, waiting briefly for the reply.
    ///
    /// When disconnected or before the cue list is known this returns what
    /// is already there, usually an empty snapshot.
    pub async fn snapshot(&self) -> CurrentCueInfo {
        if let Ok((sender, _)) = self.live_sender().await {
            let epoch = self.session.read().await.position_epoch;
            match self.request_position(&sender).await {
                Ok(true) => {
                    self.session
                        .wait_until(self.config.snapshot_wait, |s| s.position_epoch > epoch)
                        .await;
                }
                Ok(false) => {}
                Err(e) => debug!(error = %e, "position query failed"),
            }
        }
        self.session.read().await.current_cue_info()
    }

    /// Sends a playback-position query for the main cue list, if known.
    async fn request_position(&self, sender: &OscSender) -> Result<bool, SendError> {
        let (workspace_id, cue_list_id) = {
            let state = self.session.read().await;
            (state.workspace_id.clone(), state.main_cue_list_id.clone())
        };
        let Some(cue_list_id) = cue_list_id else {
            return Ok(false);
        };
        sender
            .send(
                &address::playback_position(workspace_id.as_deref(), &cue_list_id),
                None,
            )
            .await?;
        Ok(true)
    }

    async fn live_sender(&self) -> Result<(OscSender, Option<String>), SendError> {
        let sender = self
            .link
            .read()
            .await
            .as_ref()
            .map(|link| link.sender.clone())
            .ok_or(SendError::NotConnected)?;
        let state = self.session.read().await;
        if !state.connected {
            return Err(SendError::NotConnected);
        }
        Ok((sender, state.workspace_id.clone()))
    }
}

/// What the receive loop needs to apply packets and send follow-ups.
#[derive(Clone)]
struct ReceiveContext {
    session: SessionHandle,
    link: SharedLink,
    sender: OscSender,
    shutdown: ShutdownHandle,
}

impl ReceiveContext {
    async fn handle(&self, packet: &[u8]) {
        let inbound = match interpret(packet) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "dropping packet");
                return;
            }
        };

        let (followups, workspace_id) = self
            .session
            .update(|s| (s.apply(inbound), s.workspace_id.clone()))
            .await;
        let workspace = workspace_id.as_deref();

        for followup in followups {
            let address = match followup {
                FollowUp::RequestCueLists => address::cue_lists(workspace),
                FollowUp::RequestCueChildren { cue_list_id } => {
                    address::cue_children(workspace, &cue_list_id)
                }
                FollowUp::RequestPlaybackPosition { cue_list_id } => {
                    address::playback_position(workspace, &cue_list_id)
                }
                FollowUp::Disconnect => {
                    info!("server closed the session");
                    self.link.write().await.take();
                    self.session
                        .update(|s| *s = SessionState::default())
                        .await;
                    self.shutdown.trigger();
                    return;
                }
            };
            if let Err(e) = self.sender.send(&address, None).await {
                warn!(error = %e, "follow-up query failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::net::UdpSocket;

    fn fast_config() -> SessionConfig {
        SessionConfig::default()
            .with_reply_port(0)
            .with_auth_settle(Duration::from_millis(5))
            .with_workspace_wait(Duration::from_millis(30))
            .with_connect_settle(Duration::from_millis(30))
            .with_command_refresh_delay(Duration::from_millis(5))
            .with_snapshot_wait(Duration::from_millis(30))
            .with_close_timeout(Duration::from_millis(200))
    }

    async fn silent_server() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[test]
    fn empty_passcode_is_no_passcode() {
        let params = ConnectionParams::new("stage", 53000).with_passcode("");
        assert_eq!(params.passcode, None);
        let params = params.with_passcode("1234");
        assert_eq!(params.passcode.as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn commands_fail_when_disconnected() {
        let controller = CueController::new(fast_config());
        assert!(!controller.is_connected().await);
        assert!(matches!(controller.send_go().await, Err(SendError::NotConnected)));
        assert!(matches!(
            controller.rename_cue("a", "Intro").await,
            Err(SendError::NotConnected)
        ));
        assert!(controller.connection_info().await.is_none());
        assert!(controller.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_without_connection_is_harmless() {
        let controller = CueController::new(fast_config());
        controller.disconnect().await;
        controller.disconnect().await;
        assert!(!controller.is_connected().await);
    }

    #[tokio::test]
    async fn silent_server_still_connects() {
        let (_server, port) = silent_server().await;
        let controller = CueController::new(fast_config());

        controller
            .connect(ConnectionParams::new("127.0.0.1", port))
            .await
            .unwrap();
        assert!(controller.is_connected().await);

        let info = controller.connection_info().await.unwrap();
        assert_eq!(info.port, port);
        assert_eq!(info.workspace_id, None);
        assert_eq!(info.phase, HandshakePhase::AwaitingWorkspace);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot, CurrentCueInfo::default());
        assert!(controller.send_go().await.is_ok());

        controller.disconnect().await;
        assert!(!controller.is_connected().await);
        assert!(controller.cues().await.is_empty());
    }

    #[tokio::test]
    async fn reconnect_replaces_connection() {
        let (_server, port) = silent_server().await;
        let controller = CueController::new(fast_config());
        let params = ConnectionParams::new("127.0.0.1", port);

        controller.connect(params.clone()).await.unwrap();
        let first = controller.connection_info().await.unwrap().connected_at;
        controller.connect(params).await.unwrap();
        let second = controller.connection_info().await.unwrap().connected_at;

        assert!(second >= first);
        assert!(controller.is_connected().await);
        controller.disconnect().await;
    }

    #[tokio::test]
    async fn server_closing_during_handshake_fails_connect() {
        let (server, port) = silent_server().await;
        let reply_port = {
            let spare = UdpSocket::bind("0.0.0.0:0").await.unwrap();
            spare.local_addr().unwrap().port()
        };
        let closer = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            server.recv_from(&mut buf).await.unwrap();
            let packet = cuelink_protocol::osc::encode("/update/workspace/W/disconnect", None);
            server
                .send_to(&packet, ("127.0.0.1", reply_port))
                .await
                .unwrap();
        });

        let controller = CueController::new(fast_config().with_reply_port(reply_port));
        let result = controller
            .connect(ConnectionParams::new("127.0.0.1", port))
            .await;
        closer.await.unwrap();

        assert!(matches!(result, Err(ConnectError::ClosedByServer)));
        assert!(!controller.is_connected().await);
        assert!(controller.connection_info().await.is_none());
        assert!(!controller.session.read().await.handshake_complete);
    }

    #[tokio::test]
    async fn busy_reply_port_fails_cleanly() {
        let (_server, port) = silent_server().await;
        let holder = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let busy = holder.local_addr().unwrap().port();

        let controller = CueController::new(fast_config().with_reply_port(busy));
        let result = controller
            .connect(ConnectionParams::new("127.0.0.1", port))
            .await;

        assert!(matches!(result, Err(ConnectError::Bind { .. })));
        assert!(!controller.is_connected().await);
        assert!(controller.connection_info().await.is_none());
    }
}
