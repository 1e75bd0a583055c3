//! IPC transport state machine
//!
//! The transport owns the socket for one connection. `Transport::connect`
//! runs socket discovery, sends the handshake, and spawns a task that
//! drives the framed read/write loop; the task interprets opcodes and
//! republishes what the correlation layer needs as [`TransportEvent`]s.
//!
//! Lifecycle: Connecting -> Handshaking -> Ready -> Closing -> Closed.
//! Any socket error or EOF short-circuits to Closed, emitting `Error` and
//! `Close` events on the way out.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use drpc_protocol::{Command, Frame, FrameCodec, Handshake, Opcode, RpcMessage};

use crate::config::ClientConfig;
use crate::discovery::{self, IpcStream};
use crate::error::RpcError;

/// Capacity for transport events flowing up to the correlation layer
const TRANSPORT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Socket discovery in progress
    Connecting,
    /// Socket open, handshake sent, awaiting the ready dispatch
    Handshaking,
    /// Ready dispatch observed
    Ready,
    /// Close requested, CLOSE frame sent
    Closing,
    /// Socket gone
    Closed,
}

/// Events published by the transport task
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// Socket opened and handshake sent
    Open,
    /// Decoded MESSAGE frame for the correlation layer
    Message(RpcMessage),
    /// HTTP endpoint resolved after an authorize exchange
    Endpoint(String),
    /// Non-fatal or fatal error; fatal ones are followed by `Close`
    Error(RpcError),
    /// Connection terminated, with the peer's reason when one was sent
    Close(Option<Value>),
}

enum TransportCommand {
    /// Write a frame to the socket
    Send(Frame),
    /// Send a CLOSE frame and shut the socket down
    Shutdown,
}

/// Handle to a running transport task
#[derive(Debug)]
pub(crate) struct Transport {
    cmd_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl Transport {
    /// Discover the IPC socket, perform the handshake, and start the
    /// read/write loop
    ///
    /// Returns the transport handle and the event stream. The HANDSHAKE
    /// frame is written before this function returns.
    pub(crate) async fn connect(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), RpcError> {
        let state = ConnectionState::Connecting;
        tracing::debug!(?state, client_id = %config.client_id, "Connecting to IPC socket");

        let stream = discovery::connect_ipc(config).await?;
        let mut framed = Framed::new(stream, FrameCodec::new());

        let (event_tx, event_rx) = mpsc::channel(TRANSPORT_EVENT_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let _ = event_tx.send(TransportEvent::Open).await;

        let handshake = Frame::json(Opcode::Handshake, &Handshake::new(config.client_id.as_str()))?;
        framed.send(handshake).await?;
        tracing::debug!("Handshake sent");

        let base_port = config.base_port;
        tokio::spawn(async move {
            run_loop(framed, cmd_rx, event_tx, base_port).await;
        });

        Ok((Self { cmd_tx }, event_rx))
    }

    /// Queue a frame for writing
    pub(crate) fn send(&self, frame: Frame) -> Result<(), RpcError> {
        self.cmd_tx
            .send(TransportCommand::Send(frame))
            .map_err(|_| RpcError::ConnectionClosed)
    }

    /// Request a graceful shutdown
    ///
    /// The `Close` event fires once teardown completes.
    pub(crate) fn shutdown(&self) {
        let _ = self.cmd_tx.send(TransportCommand::Shutdown);
    }
}

async fn run_loop(
    mut framed: Framed<IpcStream, FrameCodec>,
    mut cmd_rx: mpsc::UnboundedReceiver<TransportCommand>,
    event_tx: mpsc::Sender<TransportEvent>,
    base_port: u16,
) {
    let mut state = ConnectionState::Handshaking;
    tracing::trace!(?state, "Transport loop started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Send(frame)) => {
                    if let Err(e) = framed.send(frame).await {
                        tracing::warn!(error = %e, "Write failed");
                        let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                        let _ = event_tx.send(TransportEvent::Close(None)).await;
                        break;
                    }
                }
                // A dropped handle closes the connection like an explicit
                // shutdown request
                Some(TransportCommand::Shutdown) | None => {
                    state = ConnectionState::Closing;
                    tracing::debug!(?state, "Shutting down transport");
                    let _ = framed.send(Frame::new(Opcode::Close, "{}".to_string())).await;
                    let _ = framed.close().await;
                    let _ = event_tx.send(TransportEvent::Close(None)).await;
                    break;
                }
            },

            frame = framed.next() => match frame {
                Some(Ok(frame)) => {
                    if handle_frame(frame, &mut framed, &event_tx, &mut state, base_port)
                        .await
                        .is_break()
                    {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Decode failed");
                    let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                    let _ = event_tx.send(TransportEvent::Close(None)).await;
                    break;
                }
                None => {
                    tracing::debug!("Socket closed by peer");
                    let _ = event_tx.send(TransportEvent::Close(None)).await;
                    break;
                }
            },
        }
    }

    state = ConnectionState::Closed;
    tracing::trace!(?state, "Transport loop ended");
}

async fn handle_frame(
    frame: Frame,
    framed: &mut Framed<IpcStream, FrameCodec>,
    event_tx: &mpsc::Sender<TransportEvent>,
    state: &mut ConnectionState,
    base_port: u16,
) -> std::ops::ControlFlow<()> {
    match frame.opcode {
        Opcode::Ping => {
            // Echo the payload straight back
            let pong = Frame::new(Opcode::Pong, frame.payload);
            if let Err(e) = framed.send(pong).await {
                tracing::warn!(error = %e, "Pong write failed");
                let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                let _ = event_tx.send(TransportEvent::Close(None)).await;
                return std::ops::ControlFlow::Break(());
            }
        }

        Opcode::Message => {
            let message: RpcMessage = match serde_json::from_str(&frame.payload) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping unparseable MESSAGE payload");
                    return std::ops::ControlFlow::Continue(());
                }
            };

            if message.is_ready_dispatch() && *state == ConnectionState::Handshaking {
                *state = ConnectionState::Ready;
                tracing::debug!(?state, "Ready dispatch observed");
            }

            // A successful authorize reply means the peer's local HTTP
            // server is up; resolve its endpoint in the background
            if message.cmd == Command::Authorize && !message.is_error_reply() {
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    match discovery::discover_endpoint(base_port).await {
                        Ok(endpoint) => {
                            let _ = event_tx.send(TransportEvent::Endpoint(endpoint)).await;
                        }
                        Err(e) => {
                            let _ = event_tx.send(TransportEvent::Error(e)).await;
                        }
                    }
                });
            }

            let _ = event_tx.send(TransportEvent::Message(message)).await;
        }

        Opcode::Close => {
            let reason: Option<Value> = serde_json::from_str(&frame.payload).ok();
            tracing::debug!(?reason, "Peer sent CLOSE");
            let _ = event_tx.send(TransportEvent::Close(reason)).await;
            return std::ops::ControlFlow::Break(());
        }

        Opcode::Pong | Opcode::Handshake => {
            tracing::trace!(opcode = ?frame.opcode, "Ignoring frame");
        }
    }

    std::ops::ControlFlow::Continue(())
}
