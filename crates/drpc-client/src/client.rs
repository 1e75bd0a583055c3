//! RPC client: request correlation and event dispatch
//!
//! [`RpcClient`] is a cloneable handle to a background dispatch actor. The
//! actor owns the transport, the pending-call table, and the subscription
//! table, and is the only context that mutates them; handles communicate
//! with it over an unbounded channel, and notifications flow out on the
//! bounded [`ClientEvent`] channel returned from [`RpcClient::new`].
//!
//! Correlation is by nonce alone. Replies may arrive in any order and
//! unsolicited dispatch events may interleave with pending replies.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use drpc_protocol::{Command, EventName, Frame, Opcode, RpcMessage};

use crate::config::ClientConfig;
use crate::error::RpcError;
use crate::events::{ClientEvent, User};
use crate::registration;
use crate::subscription::{subscription_key, EventHandler, Subscription};
use crate::transport::{Transport, TransportEvent};

/// Commands sent from handles to the dispatch actor
enum ActorCommand {
    Connect(oneshot::Sender<Result<(), RpcError>>),
    Send {
        cmd: Command,
        args: Option<Value>,
        evt: Option<EventName>,
        reply: oneshot::Sender<Result<Value, RpcError>>,
    },
    RegisterHandler {
        key: String,
        handler: EventHandler,
    },
    RemoveHandler {
        key: String,
    },
    Ping(oneshot::Sender<Result<(), RpcError>>),
    Authenticated {
        user: Option<User>,
    },
    GetEndpoint(oneshot::Sender<Option<String>>),
    GetUser(oneshot::Sender<Option<User>>),
    Destroy(oneshot::Sender<Result<(), RpcError>>),
}

/// Connection state owned by the actor
enum Conn {
    /// No socket was ever opened
    Idle,
    /// Socket open, handshake sent, awaiting the ready dispatch
    Connecting { transport: Transport },
    /// Ready dispatch observed
    Ready { transport: Transport },
    /// Close requested, awaiting teardown
    Closing {
        // Kept alive so the transport task sees the shutdown through
        _transport: Transport,
    },
    /// Connection is gone; calls fail fast
    Closed,
}

impl Conn {
    fn transport(&self) -> Option<&Transport> {
        match self {
            Conn::Connecting { transport } | Conn::Ready { transport } => Some(transport),
            _ => None,
        }
    }
}

/// Handle to the RPC dispatch actor
///
/// # Example
///
/// ```rust,ignore
/// let config = ClientConfig::new("609314057199288320");
/// let (client, mut events) = RpcClient::new(config);
///
/// let user = client.login("access-token").await?;
///
/// while let Some(event) = events.recv().await {
///     match event {
///         ClientEvent::Dispatch { event, data } => { /* ... */ }
///         ClientEvent::Disconnected => break,
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RpcClient {
    actor_tx: mpsc::UnboundedSender<ActorCommand>,
    connect_timeout: std::time::Duration,
}

impl RpcClient {
    /// Create a client and spawn its dispatch actor
    ///
    /// Returns the handle and the event channel. No socket is opened until
    /// [`connect`](Self::connect) or [`login`](Self::login) is called.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (actor_tx, actor_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let connect_timeout = config.connect_timeout;

        let actor = ClientActor {
            config,
            actor_rx,
            events_tx,
            conn: Conn::Idle,
            transport_events: None,
            pending: HashMap::new(),
            handlers: HashMap::new(),
            connect_waiters: Vec::new(),
            destroy_waiters: Vec::new(),
            endpoint: None,
            user: None,
        };
        tokio::spawn(actor.run());

        (
            Self {
                actor_tx,
                connect_timeout,
            },
            events_rx,
        )
    }

    /// Connect to the desktop client
    ///
    /// Idempotent: concurrent calls join the same in-flight attempt, and a
    /// call on an established connection returns immediately. Resolves when
    /// the ready dispatch is observed, or fails with
    /// [`RpcError::ConnectionTimeout`] after the configured timeout.
    pub async fn connect(&self) -> Result<(), RpcError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(ActorCommand::Connect(tx))?;

        match tokio::time::timeout(self.connect_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => Err(RpcError::ConnectionTimeout),
        }
    }

    /// Connect, then authenticate with the given access token
    ///
    /// Emits [`ClientEvent::Ready`] and returns the authenticated identity
    /// on success.
    pub async fn login(&self, access_token: impl Into<String>) -> Result<Option<User>, RpcError> {
        self.connect().await?;

        let args = serde_json::json!({ "access_token": access_token.into() });
        let data = self
            .send_command(Command::Authenticate, Some(args), None)
            .await?;

        let user = data
            .get("user")
            .cloned()
            .and_then(|u| serde_json::from_value(u).ok());
        self.send_to_actor(ActorCommand::Authenticated { user: user.clone() })?;

        Ok(user)
    }

    /// Send a command and await its correlated reply
    ///
    /// A fresh nonce is generated per call; the returned future settles
    /// when a reply carrying that nonce arrives. A reply with the `ERROR`
    /// sentinel rejects with [`RpcError::RemoteRejected`].
    pub async fn send_command(
        &self,
        cmd: Command,
        args: Option<Value>,
        evt: Option<EventName>,
    ) -> Result<Value, RpcError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(ActorCommand::Send {
            cmd,
            args,
            evt,
            reply: tx,
        })?;
        rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }

    /// Subscribe to a dispatch event
    ///
    /// The handler runs on the dispatch actor for every matching event.
    /// Subscribing again with the same (event, args) replaces the handler.
    pub async fn subscribe(
        &self,
        event: EventName,
        args: Option<Value>,
        handler: impl FnMut(Value) + Send + Sync + 'static,
    ) -> Result<Subscription, RpcError> {
        self.send_command(Command::Subscribe, args.clone(), Some(event.clone()))
            .await?;

        let key = subscription_key(&event, args.as_ref());
        self.send_to_actor(ActorCommand::RegisterHandler {
            key,
            handler: Box::new(handler),
        })?;

        Ok(Subscription::new(self.clone(), event, args))
    }

    /// Unsubscribe from a dispatch event
    pub async fn unsubscribe(
        &self,
        event: EventName,
        args: Option<Value>,
    ) -> Result<(), RpcError> {
        self.send_command(Command::Unsubscribe, args.clone(), Some(event.clone()))
            .await?;

        let key = subscription_key(&event, args.as_ref());
        self.send_to_actor(ActorCommand::RemoveHandler { key })?;
        Ok(())
    }

    /// Send a PING frame carrying a fresh nonce payload
    pub async fn ping(&self) -> Result<(), RpcError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(ActorCommand::Ping(tx))?;
        rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }

    /// API endpoint resolved by HTTP discovery, if any
    pub async fn api_endpoint(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        if self.send_to_actor(ActorCommand::GetEndpoint(tx)).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Identity recorded from the ready dispatch or authentication
    pub async fn user(&self) -> Option<User> {
        let (tx, rx) = oneshot::channel();
        if self.send_to_actor(ActorCommand::GetUser(tx)).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Close the connection
    ///
    /// Sends a CLOSE frame, tears the socket down, and resolves once the
    /// transport reports closure; every pending call fails with
    /// [`RpcError::ConnectionClosed`]. Fails with [`RpcError::NotConnected`]
    /// if no socket was ever opened.
    pub async fn destroy(&self) -> Result<(), RpcError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(ActorCommand::Destroy(tx))?;
        rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }

    fn send_to_actor(&self, cmd: ActorCommand) -> Result<(), RpcError> {
        self.actor_tx
            .send(cmd)
            .map_err(|_| RpcError::ConnectionClosed)
    }
}

/// The dispatch actor
struct ClientActor {
    config: ClientConfig,
    actor_rx: mpsc::UnboundedReceiver<ActorCommand>,
    events_tx: mpsc::Sender<ClientEvent>,
    conn: Conn,
    transport_events: Option<mpsc::Receiver<TransportEvent>>,
    /// Pending calls keyed by nonce
    pending: HashMap<String, oneshot::Sender<Result<Value, RpcError>>>,
    /// Subscription handlers keyed by (event, args)
    handlers: HashMap<String, EventHandler>,
    /// Callers awaiting the in-flight connect attempt
    connect_waiters: Vec<oneshot::Sender<Result<(), RpcError>>>,
    /// Callers awaiting teardown
    destroy_waiters: Vec<oneshot::Sender<Result<(), RpcError>>>,
    endpoint: Option<String>,
    user: Option<User>,
}

impl ClientActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.actor_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // Every handle dropped: shut down
                    None => {
                        if let Some(transport) = self.conn.transport() {
                            transport.shutdown();
                        }
                        break;
                    }
                },

                Some(event) = recv_transport(&mut self.transport_events) => {
                    self.handle_transport_event(event).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: ActorCommand) {
        match cmd {
            ActorCommand::Connect(reply) => self.handle_connect(reply).await,

            ActorCommand::Send {
                cmd,
                args,
                evt,
                reply,
            } => self.handle_send(cmd, args, evt, reply),

            ActorCommand::RegisterHandler { key, handler } => {
                // Latest registration wins
                self.handlers.insert(key, handler);
            }

            ActorCommand::RemoveHandler { key } => {
                self.handlers.remove(&key);
            }

            ActorCommand::Ping(reply) => {
                let result = match self.conn.transport() {
                    Some(transport) => {
                        Frame::json(Opcode::Ping, &Uuid::new_v4().to_string())
                            .map_err(RpcError::from)
                            .and_then(|frame| transport.send(frame))
                    }
                    None => Err(self.not_connected_error()),
                };
                let _ = reply.send(result);
            }

            ActorCommand::Authenticated { user } => {
                if user.is_some() {
                    self.user = user.clone();
                }
                self.emit(ClientEvent::Ready { user }).await;
            }

            ActorCommand::GetEndpoint(reply) => {
                let _ = reply.send(self.endpoint.clone());
            }

            ActorCommand::GetUser(reply) => {
                let _ = reply.send(self.user.clone());
            }

            ActorCommand::Destroy(reply) => self.handle_destroy(reply),
        }
    }

    fn handle_destroy(&mut self, reply: oneshot::Sender<Result<(), RpcError>>) {
        match std::mem::replace(&mut self.conn, Conn::Closed) {
            Conn::Idle => {
                self.conn = Conn::Idle;
                let _ = reply.send(Err(RpcError::NotConnected));
            }
            Conn::Closed => {
                let _ = reply.send(Ok(()));
            }
            Conn::Closing { _transport } => {
                self.conn = Conn::Closing { _transport };
                self.destroy_waiters.push(reply);
            }
            Conn::Connecting { transport } | Conn::Ready { transport } => {
                transport.shutdown();
                self.conn = Conn::Closing {
                    _transport: transport,
                };
                self.destroy_waiters.push(reply);
            }
        }
    }

    async fn handle_connect(&mut self, reply: oneshot::Sender<Result<(), RpcError>>) {
        match &self.conn {
            Conn::Ready { .. } => {
                let _ = reply.send(Ok(()));
            }
            Conn::Connecting { .. } => {
                self.connect_waiters.push(reply);
            }
            Conn::Closing { .. } | Conn::Closed => {
                let _ = reply.send(Err(RpcError::ConnectionClosed));
            }
            Conn::Idle => {
                self.connect_waiters.push(reply);

                if let Some(registrar) = &self.config.registrar {
                    let scheme = registration::uri_scheme(&self.config.client_id);
                    if let Err(e) = registrar.register(&scheme) {
                        tracing::warn!(scheme = %scheme, error = %e, "Scheme registration failed");
                    }
                }

                match Transport::connect(&self.config).await {
                    Ok((transport, events)) => {
                        self.conn = Conn::Connecting { transport };
                        self.transport_events = Some(events);
                        // Waiters settle when the ready dispatch arrives
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Connect attempt failed");
                        for waiter in self.connect_waiters.drain(..) {
                            let _ = waiter.send(Err(replicate_error(&e)));
                        }
                        // Discovery never opened a socket; a later connect
                        // may retry
                        self.conn = Conn::Idle;
                    }
                }
            }
        }
    }

    fn handle_send(
        &mut self,
        cmd: Command,
        args: Option<Value>,
        evt: Option<EventName>,
        reply: oneshot::Sender<Result<Value, RpcError>>,
    ) {
        let Some(transport) = self.conn.transport() else {
            let _ = reply.send(Err(self.not_connected_error()));
            return;
        };

        let nonce = Uuid::new_v4().to_string();
        let message = RpcMessage::command(cmd, args, evt, nonce.clone());

        let frame = match Frame::json(Opcode::Message, &message) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        if let Err(e) = transport.send(frame) {
            let _ = reply.send(Err(e));
            return;
        }

        self.pending.insert(nonce, reply);
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                tracing::debug!("Transport open");
            }

            TransportEvent::Message(message) => self.route_message(message).await,

            TransportEvent::Endpoint(endpoint) => {
                tracing::debug!(endpoint = %endpoint, "API endpoint resolved");
                self.endpoint = Some(endpoint);
            }

            TransportEvent::Error(e) => {
                self.emit(ClientEvent::Error(e)).await;
            }

            TransportEvent::Close(reason) => {
                tracing::debug!(?reason, "Transport closed");
                self.teardown().await;
            }
        }
    }

    /// Inbound routing: ready dispatch, then nonce correlation, then
    /// unsolicited dispatch
    async fn route_message(&mut self, message: RpcMessage) {
        if message.is_ready_dispatch() {
            if let Some(user) = message
                .data
                .as_ref()
                .and_then(|d| d.get("user"))
                .and_then(|u| serde_json::from_value(u.clone()).ok())
            {
                self.user = Some(user);
            }

            if let Conn::Connecting { .. } = self.conn {
                let conn = std::mem::replace(&mut self.conn, Conn::Closed);
                if let Conn::Connecting { transport } = conn {
                    self.conn = Conn::Ready { transport };
                }
            }

            self.emit(ClientEvent::Connected).await;
            for waiter in self.connect_waiters.drain(..) {
                let _ = waiter.send(Ok(()));
            }
            return;
        }

        if let Some(nonce) = &message.nonce {
            if let Some(reply) = self.pending.remove(nonce) {
                let result = if message.is_error_reply() {
                    Err(RpcError::RemoteRejected {
                        message: message
                            .error_message()
                            .unwrap_or("Unknown error")
                            .to_string(),
                    })
                } else {
                    Ok(message.data.unwrap_or(Value::Null))
                };
                let _ = reply.send(result);
                return;
            }
        }

        let Some(event) = message.evt else {
            tracing::trace!(cmd = %message.cmd.as_str(), "Dropping uncorrelated message");
            return;
        };

        let data = message.data.unwrap_or(Value::Null);
        let key = subscription_key(&event, message.args.as_ref());
        if let Some(handler) = self.handlers.get_mut(&key) {
            handler(data.clone());
        }

        self.emit(ClientEvent::Dispatch { event, data }).await;
    }

    /// Fail all outstanding work and mark the connection closed
    async fn teardown(&mut self) {
        self.conn = Conn::Closed;
        self.transport_events = None;

        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(RpcError::ConnectionClosed));
        }
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(RpcError::ConnectionClosed));
        }
        for waiter in self.destroy_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }

        self.emit(ClientEvent::Disconnected).await;
    }

    fn not_connected_error(&self) -> RpcError {
        match self.conn {
            Conn::Idle => RpcError::NotConnected,
            _ => RpcError::ConnectionClosed,
        }
    }

    /// Emit a client event
    ///
    /// Lifecycle events are always delivered; dispatch and error events are
    /// dropped with a warning when the consumer falls behind, so a slow
    /// consumer cannot wedge the dispatch loop.
    async fn emit(&self, event: ClientEvent) {
        let droppable = matches!(
            event,
            ClientEvent::Dispatch { .. } | ClientEvent::Error(_)
        );

        if droppable {
            if let Err(mpsc::error::TrySendError::Full(event)) = self.events_tx.try_send(event) {
                tracing::warn!(?event, "Event channel full, dropping event");
            }
        } else {
            let _ = self.events_tx.send(event).await;
        }
    }
}

async fn recv_transport(
    rx: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Reproduce an error for fan-out to several waiters
///
/// `RpcError` is not `Clone` because of its I/O sources; waiters beyond the
/// first get a value-preserving reconstruction.
fn replicate_error(e: &RpcError) -> RpcError {
    match e {
        RpcError::ConnectionTimeout => RpcError::ConnectionTimeout,
        RpcError::TransportUnavailable(n) => RpcError::TransportUnavailable(*n),
        RpcError::EndpointDiscoveryFailed(n) => RpcError::EndpointDiscoveryFailed(*n),
        RpcError::RemoteRejected { message } => RpcError::RemoteRejected {
            message: message.clone(),
        },
        RpcError::ConnectionClosed => RpcError::ConnectionClosed,
        RpcError::NotConnected => RpcError::NotConnected,
        other => RpcError::Io(std::io::Error::other(other.to_string())),
    }
}
