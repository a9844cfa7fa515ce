//! Control transport
//!
//! TCP server carrying length-prefixed JSON control messages to a
//! [`WfdServerAdapter`]. Every frame is dispatched on a blocking worker
//! because the controller runs the wireless control utility synchronously.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::adapter::{HasAdapterIdentity, ReceivesControlMessages, WfdServerAdapter};
use super::protocol::{encode_frame, ControlCommand, ControlMessage, ControlReply, LENGTH_PREFIX_SIZE};
use crate::error::ControlError;

/// Control channel server for one adapter
pub struct ControlServer {
    /// Bound listener
    listener: TcpListener,

    /// Adapter receiving the messages
    adapter: Arc<WfdServerAdapter>,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
}

impl ControlServer {
    /// Bind the listen address from the adapter's socket settings
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BindError` if the address cannot be bound.
    pub async fn bind(adapter: Arc<WfdServerAdapter>) -> Result<Self, ControlError> {
        let addr = adapter.socket().listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ControlError::BindError {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            adapter,
            shutdown_tx,
        })
    }

    /// Address the server is listening on
    ///
    /// # Errors
    ///
    /// Returns the socket error if the local address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr, ControlError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until shutdown
    ///
    /// Also polls the DHCP server's health at the configured interval so an
    /// unexpected exit is logged even when no peer is talking to us.
    pub async fn run(&self) -> Result<(), ControlError> {
        info!(
            "Control server for {} listening on {}",
            self.adapter.name(),
            self.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut health = tokio::time::interval(self.adapter.socket().health_poll_interval());
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let adapter = Arc::clone(&self.adapter);
                            let max_size = self.adapter.socket().max_message_size;

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, adapter, max_size).await {
                                    debug!("Control connection {} error: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Control accept error: {}", e);
                        }
                    }
                }
                _ = health.tick() => {
                    poll_dhcp_health(&self.adapter).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Control server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Get a shutdown signal sender
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Initiate shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn poll_dhcp_health(adapter: &Arc<WfdServerAdapter>) {
    let controller = Arc::clone(adapter.controller());
    match tokio::task::spawn_blocking(move || controller.lock().poll_dhcp()).await {
        Ok(Some(exit)) => debug!("Collected DHCP exit: {}", exit),
        Ok(None) => {}
        Err(e) => warn!("DHCP health poll failed: {}", e),
    }
}

/// Handle a single control connection
async fn handle_connection(
    mut stream: TcpStream,
    adapter: Arc<WfdServerAdapter>,
    max_message_size: usize,
) -> Result<(), ControlError> {
    debug!("New control connection");

    loop {
        let Some(payload) = read_frame(&mut stream, max_message_size).await? else {
            debug!("Control peer disconnected");
            return Ok(());
        };

        let message = ControlMessage {
            adapter_id: adapter.adapter_id(),
            payload,
        };

        let worker = Arc::clone(&adapter);
        let reply = tokio::task::spawn_blocking(move || {
            worker.on_receive_control_message(message.adapter_id, &message.payload)
        })
        .await;

        match reply {
            Ok(Some(reply)) => send_frame(&mut stream, &reply).await?,
            Ok(None) => {}
            Err(e) => error!("Control dispatch task failed: {}", e),
        }
    }
}

/// Read one frame body, `None` on clean EOF
///
/// An oversized frame cannot be skipped without reading it, so it closes
/// the connection.
async fn read_frame(
    stream: &mut TcpStream,
    max_message_size: usize,
) -> Result<Option<Vec<u8>>, ControlError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ControlError::from(e)),
    }

    let msg_len = u32::from_be_bytes(len_buf) as usize;
    if msg_len > max_message_size {
        warn!(
            "Control message too large: {} bytes (max {})",
            msg_len, max_message_size
        );
        return Err(ControlError::TooLarge {
            size: msg_len,
            max: max_message_size,
        });
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

async fn send_frame<T: serde::Serialize>(stream: &mut TcpStream, msg: &T) -> Result<(), ControlError> {
    let encoded = encode_frame(msg)?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;
    Ok(())
}

/// Control channel client
///
/// Keeps one connection open so a peer can issue several commands.
pub struct ControlClient {
    stream: TcpStream,
    max_message_size: usize,
}

impl ControlClient {
    /// Connect to a control server
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ControlError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            max_message_size: 64 * 1024,
        })
    }

    /// Send a command and wait for its reply
    pub async fn send(&mut self, command: &ControlCommand) -> Result<ControlReply, ControlError> {
        send_frame(&mut self.stream, command).await?;
        self.recv().await
    }

    /// Send an arbitrary frame body without waiting for a reply
    pub async fn send_raw(&mut self, body: &[u8]) -> Result<(), ControlError> {
        let len = u32::try_from(body.len()).map_err(|_| ControlError::TooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        })?;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next reply
    pub async fn recv(&mut self) -> Result<ControlReply, ControlError> {
        let body = read_frame(&mut self.stream, self.max_message_size)
            .await?
            .ok_or_else(|| {
                ControlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "control server closed the connection",
                ))
            })?;
        serde_json::from_slice(&body).map_err(|e| ControlError::parse(e.to_string()))
    }
}
