use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use kachel_transport::Connector;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::lifecycle::{Driver, LinkState, Request, Status};

/// Handle to a reconnecting RPC channel.
///
/// Cheap to clone; every clone talks to the same driver task. The driver
/// keeps reconnecting until all handles are dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Debug, Clone)]
pub struct Channel {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<Status>,
}

impl Channel {
    /// Start a channel that connects to `address` through `connector`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<C: Connector>(
        connector: C,
        address: impl Into<String>,
        config: ChannelConfig,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(config.command_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(Status::initial());
        let driver = Driver::new(connector, address.into(), config, requests_rx, status_tx);
        tokio::spawn(driver.run());
        Self {
            requests: requests_tx,
            status: status_rx,
        }
    }

    /// Issue a remote call.
    ///
    /// Resolves once the call has been numbered and handed to the connection;
    /// the returned [`PendingCall`] completes with the remote return value.
    /// Fails with [`ChannelError::NotConnected`] unless the channel is open.
    pub async fn issue(
        &self,
        command: impl Into<String>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<PendingCall> {
        let (reply, ticket) = oneshot::channel();
        self.requests
            .send(Request::Issue {
                command: command.into(),
                args,
                kwargs,
                reply,
            })
            .await
            .map_err(|_| ChannelError::Shutdown)?;
        ticket.await.map_err(|_| ChannelError::Shutdown)?
    }

    /// Issue a remote call and wait for its return value.
    pub async fn call(
        &self,
        command: impl Into<String>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        self.issue(command, args, kwargs).await?.await
    }

    /// Like [`call`](Self::call), but give up waiting after `timeout`.
    ///
    /// The call itself stays outstanding; a late reply is still matched and
    /// discarded.
    pub async fn call_with_timeout(
        &self,
        command: impl Into<String>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let pending = self.issue(command, args, kwargs).await?;
        tokio::time::timeout(timeout, pending)
            .await
            .map_err(|_| ChannelError::Timeout(timeout))?
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Watch every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Wait until the channel is open and return the connection generation.
    pub async fn connected(&self) -> Result<u64> {
        let mut status = self.status.clone();
        let open = status
            .wait_for(|status| status.state == LinkState::Open)
            .await
            .map_err(|_| ChannelError::Shutdown)?;
        Ok(open.generation)
    }

    /// Notifications for every successful (re)connect.
    pub fn connect_events(&self) -> ConnectEvents {
        ConnectEvents {
            status: self.status.clone(),
            last_seen: 0,
        }
    }

    /// Snapshot of the pending-call table.
    pub async fn table_stats(&self) -> Result<TableStats> {
        let (reply, stats) = oneshot::channel();
        self.requests
            .send(Request::Stats { reply })
            .await
            .map_err(|_| ChannelError::Shutdown)?;
        stats.await.map_err(|_| ChannelError::Shutdown)
    }

    /// Stop the driver. Outstanding calls fail with [`ChannelError::Shutdown`].
    pub async fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown).await;
    }
}

/// Pending-call table snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Current connection generation.
    pub generation: u64,
    /// Logical table length (the next sequence number).
    pub len: u64,
    /// Calls still awaiting a reply.
    pub outstanding: usize,
}

/// An issued call awaiting its reply.
///
/// There is no cancel operation: dropping a `PendingCall` only discards the
/// reply when it arrives.
#[derive(Debug)]
pub struct PendingCall {
    command: String,
    sequence: u64,
    generation: u64,
    completion: oneshot::Receiver<Result<Value>>,
}

impl PendingCall {
    pub(crate) fn new(
        command: String,
        sequence: u64,
        generation: u64,
        completion: oneshot::Receiver<Result<Value>>,
    ) -> Self {
        Self {
            command,
            sequence,
            generation,
            completion,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sequence number assigned to this call.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Connection generation the call was sent on.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Take the outcome if it is already available.
    ///
    /// Once this returns `Some`, the call must not be awaited.
    pub fn try_result(&mut self) -> Option<Result<Value>> {
        match self.completion.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ChannelError::Abandoned {
                generation: self.generation,
            })),
        }
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let generation = self.generation;
        match Pin::new(&mut self.completion).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ChannelError::Abandoned { generation })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Yields the generation of each new connection exactly once.
///
/// Transitions that happen faster than they are observed coalesce: only the
/// latest open generation is reported.
#[derive(Debug)]
pub struct ConnectEvents {
    status: watch::Receiver<Status>,
    last_seen: u64,
}

impl ConnectEvents {
    /// Wait for the next successful connect. `None` once the channel has shut down.
    pub async fn next(&mut self) -> Option<u64> {
        loop {
            let current = *self.status.borrow_and_update();
            if current.state == LinkState::Open && current.generation > self.last_seen {
                self.last_seen = current.generation;
                return Some(current.generation);
            }
            self.status.changed().await.ok()?;
        }
    }
}
