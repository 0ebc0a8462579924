//! UDP transport to a QLab server.
//!
//! QLab answers on a fixed port rather than to the sender's address, so a
//! session needs two sockets: an unconnected outbound socket for commands
//! and an inbound socket bound to the reply port. The inbound socket is
//! moved into a background receive loop that runs until [`Transport::close`].

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cuelink_protocol::{osc, DecodeError};

use crate::config::SessionConfig;
use crate::error::{ConnectError, SendError};

/// Cheap, clonable handle for sending OSC messages to the server.
#[derive(Debug, Clone)]
pub struct OscSender {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl OscSender {
    /// Returns the server address datagrams are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Encodes and sends one message. Fire-and-forget: success only means
    /// the OS accepted the datagram.
    pub async fn send(&self, address: &str, arg: Option<&str>) -> Result<(), SendError> {
        let packet = osc::encode(address, arg);
        self.socket
            .send_to(&packet, self.target)
            .await
            .map_err(|source| SendError::Io {
                address: address.to_string(),
                target: self.target,
                source,
            })?;

        // Passcodes stay out of the logs.
        let shown = if address.ends_with("/connect") {
            arg.map(|_| "<redacted>")
        } else {
            arg
        };
        debug!(address, arg = ?shown, bytes = packet.len(), "sent");
        Ok(())
    }
}

/// An open pair of sockets plus the receive loop that drains the inbound one.
pub struct Transport {
    sender: OscSender,
    inbound: Option<UdpSocket>,
    local_addr: SocketAddr,
    max_packet_size: usize,
    close_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Resolves the server and opens both sockets.
    ///
    /// The receive loop is not started yet; see [`Transport::start`].
    ///
    /// # Errors
    ///
    /// Fails when the host does not resolve, the outbound socket cannot be
    /// created, or the reply port cannot be bound.
    pub async fn open(host: &str, port: u16, config: &SessionConfig) -> Result<Self, ConnectError> {
        let target = resolve(host, port).await?;

        let unspecified: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let outbound = UdpSocket::bind(unspecified)
            .await
            .map_err(ConnectError::Socket)?;

        let reply_addr = SocketAddr::new(unspecified.ip(), config.reply_port);
        let inbound = UdpSocket::bind(reply_addr)
            .await
            .map_err(|source| ConnectError::Bind {
                port: config.reply_port,
                source,
            })?;
        let local_addr = inbound.local_addr().map_err(|source| ConnectError::Bind {
            port: config.reply_port,
            source,
        })?;

        info!(%target, reply = %local_addr, "transport open");

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            sender: OscSender {
                socket: Arc::new(outbound),
                target,
            },
            inbound: Some(inbound),
            local_addr,
            max_packet_size: config.max_packet_size,
            close_timeout: config.close_timeout,
            shutdown_tx,
            task: None,
        })
    }

    /// Returns a sender for this transport.
    pub fn sender(&self) -> OscSender {
        self.sender.clone()
    }

    /// Returns the local address replies arrive on.
    pub fn local_reply_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns true while the receive loop task is alive.
    pub fn is_receiving(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Spawns the receive loop, calling `handler` with every datagram.
    ///
    /// Each handler future is awaited before the next receive, so a packet
    /// that has been received is always fully processed, even when close
    /// is requested meanwhile. Does nothing if the loop was already started.
    pub fn start<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(socket) = self.inbound.take() else {
            return;
        };
        let shutdown = self.shutdown_tx.subscribe();
        let max = self.max_packet_size;
        self.task = Some(tokio::spawn(receive_loop(socket, shutdown, max, handler)));
    }

    /// Returns a handle that stops the receive loop when triggered.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Stops the receive loop and releases both sockets. Idempotent.
    pub async fn close(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.inbound = None;

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(self.close_timeout, &mut task)
                .await
                .is_err()
            {
                warn!("receive loop did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
            info!(reply = %self.local_addr, "transport closed");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Stops a receive loop from inside its own handler.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Signals the receive loop to stop after the current datagram.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns true if shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ConnectError::resolve(host, port, e))?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ConnectError::NoAddress {
            host: host.to_string(),
            port,
        })
}

async fn receive_loop<F, Fut>(
    socket: UdpSocket,
    mut shutdown: watch::Receiver<bool>,
    max_packet_size: usize,
    handler: F,
) where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    // One spare byte tells an exactly-full packet from a truncated one.
    let mut buffer = vec![0u8; max_packet_size.saturating_add(1)];

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, from)) if len > max_packet_size => {
                    let err = DecodeError::PacketTooLarge { size: len, max: max_packet_size };
                    warn!(%from, error = %err, "dropping packet");
                }
                Ok((len, from)) => {
                    debug!(%from, bytes = len, "received");
                    handler(buffer[..len].to_vec()).await;
                }
                Err(e) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    warn!(error = %e, "receive failed");
                }
            },
        }
    }

    debug!("receive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_config() -> SessionConfig {
        SessionConfig::default()
            .with_reply_port(0)
            .with_close_timeout(Duration::from_millis(500))
    }

    async fn fake_server() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let (server, port) = fake_server().await;
        let transport = Transport::open("127.0.0.1", port, &test_config())
            .await
            .unwrap();

        transport.sender().send("/go", None).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"/go\0,\0\0\0");
    }

    #[tokio::test]
    async fn receive_loop_delivers_packets() {
        let (server, port) = fake_server().await;
        let mut transport = Transport::open("127.0.0.1", port, &test_config())
            .await
            .unwrap();
        let reply_port = transport.local_reply_addr().port();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        transport.start(move |packet| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(packet);
            }
        });
        assert!(transport.is_receiving());

        let packet = osc::encode("/update/workspace/W1", None);
        server
            .send_to(&packet, ("127.0.0.1", reply_port))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, packet);

        transport.close().await;
        assert!(!transport.is_receiving());
    }

    #[tokio::test]
    async fn oversize_packets_are_dropped() {
        let (server, port) = fake_server().await;
        let config = test_config().with_max_packet_size(16);
        let mut transport = Transport::open("127.0.0.1", port, &config).await.unwrap();
        let reply_port = transport.local_reply_addr().port();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        transport.start(move |packet| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(packet.len());
            }
        });

        let target = ("127.0.0.1", reply_port);
        server.send_to(&[b'x'; 17], target).await.unwrap();
        server.send_to(&[b'y'; 16], target).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        transport.close().await;
        assert_eq!(*seen.lock().unwrap(), vec![16]);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_the_port() {
        let (_server, port) = fake_server().await;
        let mut transport = Transport::open("127.0.0.1", port, &test_config())
            .await
            .unwrap();
        transport.start(|_packet| async {});
        let reply_port = transport.local_reply_addr().port();

        transport.close().await;
        transport.close().await;

        let config = test_config().with_reply_port(reply_port);
        let reopened = Transport::open("127.0.0.1", port, &config).await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn busy_reply_port_is_a_bind_error() {
        let (_server, port) = fake_server().await;
        let holder = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let busy = holder.local_addr().unwrap().port();

        let config = test_config().with_reply_port(busy);
        let result = Transport::open("127.0.0.1", port, &config).await;
        assert!(matches!(result, Err(ConnectError::Bind { port, .. }) if port == busy));
    }

    #[tokio::test]
    async fn shutdown_handle_stops_the_loop() {
        let (_server, port) = fake_server().await;
        let mut transport = Transport::open("127.0.0.1", port, &test_config())
            .await
            .unwrap();
        transport.start(|_packet| async {});

        let handle = transport.shutdown_handle();
        assert!(!handle.is_shutdown());
        handle.trigger();
        assert!(handle.is_shutdown());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!transport.is_receiving());
    }
}
