//! Socket lifecycle, authorization and inbound dispatch.
//!
//! A single reader task owns the read half of the websocket together with
//! the [`FrameAssembler`], and is the only writer of authorization decisions,
//! reply slots and event slots. A writer task owns the sink; callers queue
//! frames on a channel so [`Connection::send`] never blocks.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};
use xswd_core::{
    AppInfo, ConnectionState, Entity, EventType, FrameAssembler, Inbound, RpcRequest, RpcResponse,
};

use crate::config::ConnectionConfig;
use crate::correlator::Correlator;
use crate::error::{ConnectionError, Result};
use crate::events::EventSlots;
use crate::lock;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How an [`initialize`](Connection::initialize) call ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized,
    /// The wallet said no, or closed the socket before deciding.
    Refused,
}

impl AuthOutcome {
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

enum Decision {
    Accepted(bool),
    Closed,
    Failed(String),
}

/// Socket-side state, replaced on every `initialize`.
#[derive(Default)]
struct Link {
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    decision: Option<oneshot::Sender<Decision>>,
    /// Bumped per `initialize` so a reader left over from an earlier socket
    /// cannot touch the current one.
    generation: u64,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn decide(&mut self, decision: Decision) {
        if let Some(tx) = self.decision.take() {
            let _ = tx.send(decision);
        }
    }
}

struct Inner {
    app_info: AppInfo,
    config: ConnectionConfig,
    link: Mutex<Link>,
    correlator: Correlator,
    events: EventSlots,
}

/// A client connection to an XSWD wallet.
///
/// Cheap to clone; clones share the socket, pending requests and event
/// slots. Dropping the last clone closes the socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(app_info: AppInfo) -> Self {
        Self::with_config(app_info, ConnectionConfig::default())
    }

    pub fn with_config(app_info: AppInfo, config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                app_info,
                config,
                link: Mutex::new(Link::default()),
                correlator: Correlator::new(),
                events: EventSlots::new(),
            }),
        }
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.inner.app_info
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link().state
    }

    /// Requests sent whose replies have not been consumed yet.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Last value pushed for `event`, whether or not it was consumed.
    pub fn latest_event(&self, event: EventType) -> Value {
        self.inner.events.latest(event)
    }

    /// Open the websocket and ask the wallet to authorize this application.
    ///
    /// A socket closed before the wallet decides counts as a refusal. On
    /// timeout the socket is left open in [`ConnectionState::WaitingAuth`];
    /// a late decision still updates the state.
    pub async fn initialize(&self) -> Result<AuthOutcome> {
        let auth = serde_json::to_string(&self.inner.app_info)?;

        let generation = {
            let mut link = self.inner.link();
            if link.is_alive() {
                return Err(ConnectionError::AlreadyConnected);
            }
            link.state = ConnectionState::Initializing;
            link.generation += 1;
            link.generation
        };

        let url = self.inner.config.url();
        debug!(%url, "opening websocket");
        let socket = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                warn!(%url, error = %e, "failed to open websocket");
                self.inner.with_link(generation, |link| link.state = ConnectionState::Closed);
                return Err(ConnectionError::TransportOpen(e));
            }
        };

        let (sink, stream) = socket.split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let (decision_tx, decision_rx) = oneshot::channel();
        {
            let mut link = self.inner.link();
            if link.generation != generation {
                // Another initialize started while this one was connecting.
                return Err(ConnectionError::AlreadyConnected);
            }
            link.outbound = Some(outbound.clone());
            link.decision = Some(decision_tx);
            link.state = ConnectionState::WaitingAuth;
        }

        tokio::spawn(write_loop(sink, queue));
        tokio::spawn(read_loop(Arc::downgrade(&self.inner), stream, generation));

        debug!(app = %self.inner.app_info.name, "websocket opened, authorizing");
        if outbound.send(Message::text(auth)).is_err() {
            return Err(ConnectionError::Transport("websocket writer closed".to_string()));
        }

        match tokio::time::timeout(self.inner.config.auth_timeout(), decision_rx).await {
            Err(_) => Err(ConnectionError::AuthorizationTimeout),
            Ok(Ok(Decision::Accepted(true))) => Ok(AuthOutcome::Authorized),
            Ok(Ok(Decision::Accepted(false) | Decision::Closed)) => Ok(AuthOutcome::Refused),
            Ok(Ok(Decision::Failed(e))) => Err(ConnectionError::Transport(e)),
            Ok(Err(_)) => Ok(AuthOutcome::Refused),
        }
    }

    /// Send a request without waiting for its reply. Returns its id.
    pub fn send(&self, entity: Entity, method: &str, params: impl Serialize) -> Result<u64> {
        let outbound = {
            let link = self.inner.link();
            match (&link.outbound, link.state) {
                (Some(outbound), ConnectionState::Accepted) => outbound.clone(),
                _ => return Err(ConnectionError::NotConnected),
            }
        };

        let params = serde_json::to_value(params)?;
        let id = self.inner.correlator.next_id();
        let frame = serde_json::to_string(&RpcRequest::new(id, method, params))?;

        debug!(%entity, method, id, "request");
        self.inner.correlator.register(id);
        if outbound.send(Message::text(frame)).is_err() {
            self.inner.correlator.forget(id);
            return Err(ConnectionError::Transport("websocket writer closed".to_string()));
        }
        Ok(id)
    }

    /// Wait for the reply to a request issued with [`send`](Self::send).
    pub async fn wait_response(&self, id: u64) -> Result<RpcResponse> {
        let response = self
            .inner
            .correlator
            .wait(id, self.inner.config.request_timeout())
            .await?;
        debug!(id, error = response.is_error(), "response");
        Ok(response)
    }

    /// Send a request and wait for its reply.
    ///
    /// With `wait_on` set, also waits for that push event after the reply
    /// arrives. Error-shaped replies are returned, not raised.
    pub async fn send_sync(
        &self,
        entity: Entity,
        method: &str,
        params: impl Serialize,
        wait_on: Option<EventType>,
    ) -> Result<RpcResponse> {
        let id = self.send(entity, method, params)?;
        let response = self.wait_response(id).await?;
        if let Some(event) = wait_on {
            debug!(id, %event, "waiting on event");
            self.wait_for(event).await?;
        }
        Ok(response)
    }

    /// Wait for the next unconsumed push of `event` and consume it.
    pub async fn wait_for(&self, event: EventType) -> Result<Value> {
        self.inner
            .events
            .wait(event, self.inner.config.event_timeout())
            .await
    }

    /// Ask the peer to close the socket. The reader observes the close like
    /// any other.
    pub fn close(&self) {
        if let Some(outbound) = &self.inner.link().outbound {
            let _ = outbound.send(Message::Close(None));
        }
    }
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Link> {
        lock(&self.link)
    }

    fn with_link(&self, generation: u64, f: impl FnOnce(&mut Link)) {
        let mut link = self.link();
        if link.generation == generation {
            f(&mut link);
        }
    }

    fn handle_frame(&self, assembler: &mut FrameAssembler, frame: &str, generation: u64) {
        let Some(document) = assembler.push(frame) else {
            debug!(buffered = assembler.buffered_len(), "partial frame");
            return;
        };

        match Inbound::classify(document) {
            Inbound::Authorization { accepted } => self.with_link(generation, |link| {
                link.state = if accepted {
                    debug!("connection accepted");
                    ConnectionState::Accepted
                } else {
                    debug!("connection refused");
                    ConnectionState::Refused
                };
                link.decide(Decision::Accepted(accepted));
            }),
            Inbound::Response { id, response } => {
                if let Some(e) = &response.error {
                    error!(id, code = ?e.code, "{}", e.message);
                }
                if !self.correlator.resolve(id, response) {
                    warn!(id, "dropping reply for unknown or expired request");
                }
            }
            Inbound::Event { event, value } => {
                debug!(%event, "push event");
                self.events.publish(event, value);
            }
            Inbound::Unrecognized(value) => debug!(%value, "dropping unrecognized frame"),
        }
    }

    fn on_close(&self, generation: u64) {
        self.with_link(generation, |link| {
            debug!("connection closed");
            link.state = ConnectionState::Initializing;
            link.outbound = None;
            link.decide(Decision::Closed);
        });
    }

    fn on_error(&self, generation: u64, e: String) {
        self.with_link(generation, |link| {
            link.state = ConnectionState::Closed;
            link.outbound = None;
            link.decide(Decision::Failed(e));
        });
    }
}

async fn read_loop(inner: Weak<Inner>, mut stream: SplitStream<Socket>, generation: u64) {
    let mut assembler = FrameAssembler::new();

    while let Some(message) = stream.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match message {
            Ok(Message::Text(text)) => {
                inner.handle_frame(&mut assembler, text.as_str(), generation)
            }
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => inner.handle_frame(&mut assembler, text, generation),
                Err(_) => debug!(len = bytes.len(), "dropping non-utf8 binary frame"),
            },
            // The peer may hold TCP open after its close frame. Keep polling
            // so the close reply gets flushed.
            Ok(Message::Close(frame)) => {
                debug!(?frame, "close frame received");
                inner.on_close(generation);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "websocket error");
                inner.on_error(generation, e.to_string());
                return;
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.on_close(generation);
    }
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut queue: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = queue.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "websocket write failed");
            return;
        }
        if closing {
            return;
        }
    }

    // Every handle to the socket is gone.
    if let Err(e) = sink.close().await {
        debug!(error = %e, "websocket close failed");
    }
}
