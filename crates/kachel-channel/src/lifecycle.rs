//! Connection lifecycle driver.
//!
//! The driver is a task that exclusively owns the connector, the current
//! connection and the pending-call table. It loops through
//!
//! ```text
//! Connecting ──ok──▶ Open ──error──▶ Errored ──close──▶ Closed
//!     ▲   └──failed──────────────remote close──────────▶  │
//!     └──────────────── reconnect_delay ◀─────────────────┘
//! ```
//!
//! and never stops on its own. It exits when every [`Channel`] handle is
//! gone or one of them asks it to shut down.
//!
//! [`Channel`]: crate::Channel

use std::fmt;
use std::sync::Arc;

use kachel_envelope::{decode_inbound_with_config, encode_call, CallEnvelope, Inbound, ResponseEnvelope};
use kachel_transport::{Connector, MessageConnection, TransportError};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::channel::{PendingCall, TableStats};
use crate::config::{ChannelConfig, DisconnectPolicy};
use crate::correlator::Correlator;
use crate::error::{ChannelError, Result};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A connection attempt is in progress.
    Connecting,
    /// Connected; calls may be issued.
    Open,
    /// A transport error occurred; the connection is being closed.
    Errored,
    /// Disconnected; a reconnect is scheduled.
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Connecting => "connecting",
            LinkState::Open => "open",
            LinkState::Errored => "errored",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot published on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: LinkState,
    /// Number of successful connects so far; the current connection's
    /// generation while `Open`.
    pub generation: u64,
}

impl Status {
    pub(crate) fn initial() -> Self {
        Self {
            state: LinkState::Connecting,
            generation: 0,
        }
    }
}

pub(crate) type Completion = oneshot::Sender<Result<Value>>;

pub(crate) enum Request {
    Issue {
        command: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        reply: oneshot::Sender<Result<PendingCall>>,
    },
    Stats {
        reply: oneshot::Sender<TableStats>,
    },
    Shutdown,
}

enum Link<T> {
    Connecting,
    Open(T),
    Errored(T, TransportError),
    Closed,
}

pub(crate) struct Driver<C: Connector> {
    connector: Arc<C>,
    address: String,
    config: ChannelConfig,
    requests: mpsc::Receiver<Request>,
    status: watch::Sender<Status>,
    correlator: Correlator<Completion>,
    generation: u64,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        connector: C,
        address: String,
        config: ChannelConfig,
        requests: mpsc::Receiver<Request>,
        status: watch::Sender<Status>,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            address,
            config,
            requests,
            status,
            correlator: Correlator::new(),
            generation: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut link = Link::Connecting;
        loop {
            let next = match link {
                Link::Connecting => self.connecting().await,
                Link::Open(conn) => self.open(conn).await,
                Link::Errored(conn, err) => Some(self.errored(conn, err).await),
                Link::Closed => self.closed().await,
            };
            match next {
                Some(next) => link = next,
                None => break,
            }
        }
        self.finish();
    }

    async fn connecting(&mut self) -> Option<Link<C::Connection>> {
        self.publish(LinkState::Connecting);
        debug!(address = %self.address, "connecting");

        let connector = Arc::clone(&self.connector);
        let address = self.address.clone();
        let attempt = async move { connector.connect(&address).await };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return Some(match result {
                        Ok(conn) => self.established(conn),
                        Err(err) => {
                            warn!(address = %self.address, error = %err, "connection attempt failed");
                            Link::Closed
                        }
                    });
                }
                request = self.requests.recv() => self.serve_offline(request)?,
            }
        }
    }

    fn established(&mut self, conn: C::Connection) -> Link<C::Connection> {
        self.generation += 1;
        let previous = std::mem::replace(&mut self.correlator, Correlator::new());
        let abandoned = previous.outstanding();
        if abandoned > 0 {
            debug!(
                abandoned,
                generation = self.generation - 1,
                "discarding calls from previous connection"
            );
        }
        drop(previous);

        info!(address = %self.address, generation = self.generation, "connected");
        self.publish(LinkState::Open);
        Link::Open(conn)
    }

    async fn open(&mut self, mut conn: C::Connection) -> Option<Link<C::Connection>> {
        loop {
            tokio::select! {
                inbound = conn.recv() => match inbound {
                    Some(Ok(text)) => self.on_message(&text),
                    Some(Err(err)) => return Some(Link::Errored(conn, err)),
                    None => {
                        info!(generation = self.generation, "connection closed by remote");
                        return Some(Link::Closed);
                    }
                },
                request = self.requests.recv() => match request {
                    Some(Request::Issue { command, args, kwargs, reply }) => {
                        if let Err(err) = self.issue(&mut conn, command, args, kwargs, reply).await {
                            return Some(Link::Errored(conn, err));
                        }
                    }
                    Some(Request::Stats { reply }) => {
                        let _ = reply.send(self.stats());
                    }
                    None | Some(Request::Shutdown) => {
                        if let Err(err) = conn.close().await {
                            debug!(error = %err, "close during shutdown failed");
                        }
                        return None;
                    }
                },
            }
        }
    }

    async fn errored(&mut self, mut conn: C::Connection, err: TransportError) -> Link<C::Connection> {
        self.publish(LinkState::Errored);
        warn!(generation = self.generation, error = %err, "transport error, closing connection");
        if let Err(err) = conn.close().await {
            debug!(error = %err, "close after transport error failed");
        }
        Link::Closed
    }

    async fn closed(&mut self) -> Option<Link<C::Connection>> {
        self.publish(LinkState::Closed);
        self.on_disconnect();

        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return Some(Link::Connecting),
                request = self.requests.recv() => self.serve_offline(request)?,
            }
        }
    }

    /// Answer a request while no connection is open. `None` means shut down.
    fn serve_offline(&mut self, request: Option<Request>) -> Option<()> {
        match request? {
            Request::Issue { command, reply, .. } => {
                debug!(command = %command, "call issued while not connected");
                let _ = reply.send(Err(ChannelError::NotConnected));
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Request::Shutdown => return None,
        }
        Some(())
    }

    async fn issue(
        &mut self,
        conn: &mut C::Connection,
        command: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        reply: oneshot::Sender<Result<PendingCall>>,
    ) -> std::result::Result<(), TransportError> {
        let sequence = self.correlator.next_sequence();
        let call = CallEnvelope {
            command,
            args,
            kwargs,
            sequence,
        };
        let text = match encode_call(&call) {
            Ok(text) => text,
            Err(err) => {
                let _ = reply.send(Err(err.into()));
                return Ok(());
            }
        };

        let (completion, pending) = oneshot::channel();
        self.correlator.allocate(completion);
        debug!(command = %call.command, sequence, "SND");

        let sent = conn.send(text).await;
        let _ = reply.send(Ok(PendingCall::new(
            call.command,
            sequence,
            self.generation,
            pending,
        )));
        sent
    }

    fn on_message(&mut self, text: &str) {
        match decode_inbound_with_config(text, &self.config.envelope) {
            Ok(Inbound::Response(response)) => self.on_response(response),
            Ok(Inbound::Unknown { kind }) => {
                warn!(kind = kind.as_deref().unwrap_or("<none>"), "unknown message type dropped");
            }
            Err(err) => warn!(error = %err, "undecodable message dropped"),
        }
    }

    fn on_response(&mut self, response: ResponseEnvelope) {
        debug!(command = %response.command, sequence = response.sequence, "RCV");
        match self.correlator.resolve(response.sequence) {
            Ok(completion) => {
                // The caller may have dropped its PendingCall; the slot is reclaimed either way.
                let _ = completion.send(Ok(response.value));
            }
            Err(err) => warn!(
                generation = self.generation,
                command = %response.command,
                error = %err,
                "response does not match an outstanding call"
            ),
        }
    }

    fn on_disconnect(&mut self) {
        match self.config.disconnect_policy {
            DisconnectPolicy::Abandon => {
                let outstanding = self.correlator.outstanding();
                if outstanding > 0 {
                    warn!(
                        outstanding,
                        generation = self.generation,
                        "connection lost with calls in flight; they will not complete"
                    );
                }
            }
            DisconnectPolicy::Reject => {
                let generation = self.generation;
                for (sequence, completion) in self.correlator.drain() {
                    debug!(sequence, generation, "rejecting call on disconnect");
                    let _ = completion.send(Err(ChannelError::ConnectionLost { generation }));
                }
            }
        }
    }

    fn finish(&mut self) {
        for (_, completion) in self.correlator.drain() {
            let _ = completion.send(Err(ChannelError::Shutdown));
        }
        self.publish(LinkState::Closed);
        info!(address = %self.address, "channel shut down");
    }

    fn stats(&self) -> TableStats {
        TableStats {
            generation: self.generation,
            len: self.correlator.len(),
            outstanding: self.correlator.outstanding(),
        }
    }

    fn publish(&self, state: LinkState) {
        self.status.send_replace(Status {
            state,
            generation: self.generation,
        });
    }
}
