//! The sync channel state machine.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use ezpass_config::SyncConfig;
use ezpass_protocols::wire::decode_answer;
use ezpass_protocols::{
    CredentialAnswer, CredentialRecord, CredentialService, FieldLocator, Frame, OriginKey, Role,
    SyncError,
};

use crate::connector::{Connection, Connector, FrameSink, FrameStream, WsConnector};
use crate::policy::ReconnectPolicy;

/// Capacity of the answer broadcast.
const ANSWER_BROADCAST_CAPACITY: usize = 16;

/// Observable channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    /// The bounded policy gave up; operations fail fast until [`SyncChannel::reset`].
    Exhausted,
}

/// Channel tuning.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Upper bound for an operation waiting on a fresh connection.
    pub connect_timeout: Duration,
    /// Upper bound for a fetch waiting on its answer.
    pub response_timeout: Duration,
    pub policy: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            policy: ReconnectPolicy::Lazy,
        }
    }
}

impl ChannelConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            policy: ReconnectPolicy::from_config(&config.reconnect),
        }
    }
}

type SharedSink = Arc<tokio::sync::Mutex<FrameSink>>;

/// A frame waiting for the channel to open.
struct QueuedFrame {
    kind: &'static str,
    text: String,
    ack: oneshot::Sender<Result<(), SyncError>>,
}

/// The fetch currently awaiting an answer.
struct AnswerWaiter {
    seq: u64,
    tx: oneshot::Sender<Result<CredentialAnswer, SyncError>>,
}

struct Inner {
    state: ChannelState,
    /// Bumped on every successful open; stale readers compare against it.
    generation: u64,
    sink: Option<SharedSink>,
    queue: VecDeque<QueuedFrame>,
    waiter: Option<AnswerWaiter>,
    next_seq: u64,
    failed_attempts: u32,
    reader: Option<JoinHandle<()>>,
    connector_task: Option<JoinHandle<()>>,
}

struct Shared {
    endpoint: String,
    connector: Arc<dyn Connector>,
    config: ChannelConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ChannelState>,
    answers: broadcast::Sender<CredentialAnswer>,
    attempts: AtomicU64,
}

/// Where an outbound frame goes right now.
enum Route {
    Direct { sink: SharedSink, generation: u64 },
    Queued(oneshot::Receiver<Result<(), SyncError>>),
}

/// Single logical connection to the local credential service.
pub struct SyncChannel {
    shared: Arc<Shared>,
}

impl SyncChannel {
    /// Create a WebSocket channel for `endpoint` (`ws://` or `wss://`).
    ///
    /// No connection is made until the first operation.
    pub fn new(endpoint: &str, config: ChannelConfig) -> Result<Self, SyncError> {
        let parsed =
            url::Url::parse(endpoint).map_err(|e| SyncError::InvalidEndpoint(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(SyncError::InvalidEndpoint(format!(
                "{}: expected ws:// or wss://",
                endpoint
            )));
        }
        Ok(Self::with_connector(endpoint, config, Arc::new(WsConnector)))
    }

    /// Build from the `[sync]` configuration section.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::new(&config.endpoint, ChannelConfig::from_config(config))
    }

    /// Create a channel over an arbitrary transport.
    pub fn with_connector(
        endpoint: impl Into<String>,
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (answers, _) = broadcast::channel(ANSWER_BROADCAST_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                endpoint: endpoint.into(),
                connector,
                config,
                inner: Mutex::new(Inner {
                    state: ChannelState::Disconnected,
                    generation: 0,
                    sink: None,
                    queue: VecDeque::new(),
                    waiter: None,
                    next_seq: 0,
                    failed_attempts: 0,
                    reader: None,
                    connector_task: None,
                }),
                state_tx,
                answers,
                attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn state(&self) -> ChannelState {
        self.shared.inner.lock().state
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Every decoded inbound answer, whether or not a fetch claimed it.
    pub fn subscribe_answers(&self) -> broadcast::Receiver<CredentialAnswer> {
        self.shared.answers.subscribe()
    }

    /// Total connection attempts made so far.
    pub fn connection_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Leave the `Exhausted` state so the next operation connects again.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state == ChannelState::Exhausted {
            inner.state = ChannelState::Disconnected;
            inner.failed_attempts = 0;
            drop(inner);
            info!("Sync channel reset after exhausted reconnects");
            self.shared.publish(ChannelState::Disconnected);
        }
    }

    /// Drop the current connection, if any.
    pub async fn close(&self) {
        let sink = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            if let Some(reader) = inner.reader.take() {
                reader.abort();
            }
            if let Some(task) = inner.connector_task.take() {
                task.abort();
            }
            for queued in inner.queue.drain(..) {
                let _ = queued.ack.send(Err(SyncError::Closed));
            }
            if let Some(waiter) = inner.waiter.take() {
                let _ = waiter.tx.send(Err(SyncError::Closed));
            }
            inner.state = ChannelState::Disconnected;
            inner.sink.take()
        };
        if let Some(sink) = sink {
            let mut sink = sink.lock().await;
            if let Err(e) = sink.close().await {
                debug!("Error while closing sync connection: {}", e);
            }
        }
        self.shared.publish(ChannelState::Disconnected);
        info!("Sync channel closed");
    }

    /// Send one frame, connecting first when necessary.
    async fn dispatch(&self, frame: Frame) -> Result<(), SyncError> {
        let kind = frame.kind();
        let text = frame.encode();

        match self.shared.route(kind, text.clone())? {
            Route::Direct { sink, generation } => {
                trace!("Sync send ({}): {} bytes", kind, text.len());
                let result = sink.lock().await.send(text).await;
                if let Err(e) = result {
                    error!("Failed to send {} frame: {}", kind, e);
                    self.shared.handle_disconnect(generation, Some(e.to_string()));
                    return Err(e);
                }
                Ok(())
            }
            Route::Queued(ack) => {
                let timeout = self.shared.config.connect_timeout;
                match tokio::time::timeout(timeout, ack).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(SyncError::Closed),
                    Err(_) => {
                        warn!(
                            "Sync channel did not open within {} ms; {} frame dropped",
                            timeout.as_millis(),
                            kind
                        );
                        Err(SyncError::ConnectionTimeout(timeout.as_millis() as u64))
                    }
                }
            }
        }
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        if let Some(task) = inner.connector_task.take() {
            task.abort();
        }
    }
}

impl Shared {
    fn publish(&self, state: ChannelState) {
        self.state_tx.send_replace(state);
    }

    /// Decide how to deliver a frame, queueing it (and starting a connect)
    /// when the channel is not open.
    fn route(self: &Arc<Self>, kind: &'static str, text: String) -> Result<Route, SyncError> {
        let mut inner = self.inner.lock();
        match inner.state {
            ChannelState::Open => match inner.sink.clone() {
                Some(sink) => Ok(Route::Direct {
                    sink,
                    generation: inner.generation,
                }),
                None => Err(SyncError::NotConnected),
            },
            ChannelState::Exhausted => Err(SyncError::RetriesExhausted {
                attempts: inner.failed_attempts,
            }),
            ChannelState::Connecting => {
                debug!("Sync channel connecting; queueing {} frame", kind);
                let (ack, rx) = oneshot::channel();
                inner.queue.push_back(QueuedFrame { kind, text, ack });
                Ok(Route::Queued(rx))
            }
            ChannelState::Disconnected => {
                info!("Sync channel not connected, connecting to {}", self.endpoint);
                let (ack, rx) = oneshot::channel();
                inner.queue.push_back(QueuedFrame { kind, text, ack });
                inner.state = ChannelState::Connecting;
                inner.connector_task = Some(self.spawn_connect(None));
                drop(inner);
                self.publish(ChannelState::Connecting);
                Ok(Route::Queued(rx))
            }
        }
    }

    fn spawn_connect(self: &Arc<Self>, delay: Option<Duration>) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.connect_loop(delay).await })
    }

    async fn connect_loop(self: Arc<Self>, mut delay: Option<Duration>) {
        loop {
            if let Some(d) = delay.take() {
                tokio::time::sleep(d).await;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Connecting to {} (attempt {})", self.endpoint, attempt);

            let timeout = self.config.connect_timeout;
            let result =
                match tokio::time::timeout(timeout, self.connector.connect(&self.endpoint)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::ConnectionTimeout(timeout.as_millis() as u64)),
                };

            match result {
                Ok(connection) => {
                    self.open(connection).await;
                    return;
                }
                Err(e) => match self.connect_failed(e) {
                    Some(next) => delay = Some(next),
                    None => return,
                },
            }
        }
    }

    /// Record a failed connect. Returns the delay before retrying, if the
    /// policy retries.
    fn connect_failed(&self, err: SyncError) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.failed_attempts += 1;
        let failed = inner.failed_attempts;

        let retry = if err.is_retryable() {
            self.config.policy.next_attempt(failed)
        } else {
            None
        };
        if let Some(delay) = retry {
            warn!(
                "Connection to {} failed ({}); retrying in {:?}",
                self.endpoint, err, delay
            );
            return Some(delay);
        }

        let (state, outcome) = match self.config.policy {
            ReconnectPolicy::Lazy => {
                inner.failed_attempts = 0;
                (ChannelState::Disconnected, err.clone())
            }
            ReconnectPolicy::Bounded { .. } => (
                ChannelState::Exhausted,
                SyncError::RetriesExhausted { attempts: failed },
            ),
        };
        inner.state = state;
        inner.connector_task = None;
        for queued in inner.queue.drain(..) {
            let _ = queued.ack.send(Err(outcome.clone()));
        }
        drop(inner);

        match state {
            ChannelState::Exhausted => error!(
                "Giving up on {} after {} attempts: {}",
                self.endpoint, failed, err
            ),
            _ => warn!("Connection to {} failed: {}", self.endpoint, err),
        }
        self.publish(state);
        None
    }

    /// Install a fresh connection, start reading, and flush the queue.
    async fn open(self: &Arc<Self>, connection: Connection) {
        let Connection { sink, stream } = connection;
        let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));

        // Hold the sink across the flush so direct sends line up behind the queue.
        let mut guard = sink.lock().await;

        let (queued, generation) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = ChannelState::Open;
            inner.failed_attempts = 0;
            inner.sink = Some(Arc::clone(&sink));
            inner.connector_task = None;
            let generation = inner.generation;
            inner.reader = Some(self.spawn_reader(stream, generation));
            (inner.queue.drain(..).collect::<Vec<_>>(), generation)
        };
        info!("Connected to credential service at {}", self.endpoint);
        self.publish(ChannelState::Open);

        let mut failure: Option<SyncError> = None;
        for queued in queued {
            if let Some(err) = &failure {
                let _ = queued.ack.send(Err(err.clone()));
                continue;
            }
            if queued.ack.is_closed() {
                debug!("Caller gave up on queued {} frame; not sending", queued.kind);
                continue;
            }
            trace!("Sync flush ({}): {} bytes", queued.kind, queued.text.len());
            match guard.send(queued.text).await {
                Ok(()) => {
                    let _ = queued.ack.send(Ok(()));
                }
                Err(e) => {
                    error!("Failed to flush {} frame: {}", queued.kind, e);
                    let _ = queued.ack.send(Err(e.clone()));
                    failure = Some(e);
                }
            }
        }
        drop(guard);

        if let Some(err) = failure {
            self.handle_disconnect(generation, Some(err.to_string()));
        }
    }

    fn spawn_reader(self: &Arc<Self>, stream: FrameStream, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.read_loop(stream, generation).await })
    }

    async fn read_loop(self: Arc<Self>, mut stream: FrameStream, generation: u64) {
        let mut reason = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => self.handle_inbound(&text),
                Err(SyncError::Closed) => break,
                Err(e) => {
                    reason = Some(e.to_string());
                    break;
                }
            }
        }
        self.handle_disconnect(generation, reason);
    }

    fn handle_inbound(&self, text: &str) {
        trace!("Sync recv: {} bytes", text.len());
        let answer = match decode_answer(text) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Ignoring malformed answer frame: {}", e);
                return;
            }
        };
        debug!(
            "Answer received: {} preferences, {} candidates",
            answer.preferences.len(),
            answer.multiple_accounts.as_ref().map_or(0, Vec::len)
        );

        let waiter = self.inner.lock().waiter.take();
        match waiter {
            Some(waiter) => {
                if waiter.tx.send(Ok(answer.clone())).is_err() {
                    debug!("Fetch {} no longer waiting for its answer", waiter.seq);
                }
            }
            None => debug!("Answer arrived with no pending fetch"),
        }
        let _ = self.answers.send(answer);
    }

    /// Transition an open connection of `generation` to `Disconnected`.
    /// `reason` is `None` for a clean close.
    fn handle_disconnect(self: &Arc<Self>, generation: u64, reason: Option<String>) {
        let reconnect = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != ChannelState::Open {
                return;
            }
            inner.sink = None;
            inner.reader = None;
            inner.state = ChannelState::Disconnected;
            if let Some(waiter) = inner.waiter.take() {
                let _ = waiter.tx.send(Err(SyncError::Closed));
            }
            let delay = self.config.policy.reconnect_after_drop();
            if delay.is_some() {
                inner.state = ChannelState::Connecting;
            }
            delay
        };

        match &reason {
            Some(err) => warn!("Sync connection errored: {}", err),
            None => info!("Sync connection closed"),
        }
        self.publish(ChannelState::Disconnected);

        if let Some(delay) = reconnect {
            info!("Reconnecting to {} in {:?}", self.endpoint, delay);
            self.publish(ChannelState::Connecting);
            let task = self.spawn_connect(Some(delay));
            self.inner.lock().connector_task = Some(task);
        }
    }

    /// Register the next fetch; any pending fetch is superseded. An
    /// exhausted channel fails fast and leaves the pending fetch alone.
    fn register_waiter(
        &self,
    ) -> Result<
        (
            u64,
            oneshot::Receiver<Result<CredentialAnswer, SyncError>>,
        ),
        SyncError,
    > {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Exhausted {
            return Err(SyncError::RetriesExhausted {
                attempts: inner.failed_attempts,
            });
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        if let Some(previous) = inner.waiter.replace(AnswerWaiter { seq, tx }) {
            debug!("Fetch {} superseded by fetch {}", previous.seq, seq);
            let _ = previous.tx.send(Err(SyncError::Superseded));
        }
        Ok((seq, rx))
    }

    fn clear_waiter(&self, seq: u64) {
        let mut inner = self.inner.lock();
        if inner.waiter.as_ref().is_some_and(|w| w.seq == seq) {
            inner.waiter = None;
        }
    }
}

#[async_trait]
impl CredentialService for SyncChannel {
    async fn request_credentials(&self, origin: &OriginKey) -> Result<CredentialAnswer, SyncError> {
        let (seq, answer) = self.shared.register_waiter()?;
        debug!("Fetch {} for {}", seq, origin);

        if let Err(e) = self
            .dispatch(Frame::Fetch {
                origin: origin.clone(),
            })
            .await
        {
            self.shared.clear_waiter(seq);
            return Err(e);
        }

        let timeout = self.shared.config.response_timeout;
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SyncError::Closed),
            Err(_) => {
                self.shared.clear_waiter(seq);
                warn!("No answer for {} within {} ms", origin, timeout.as_millis());
                Err(SyncError::ResponseTimeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn save_credential(&self, record: CredentialRecord) -> Result<(), SyncError> {
        info!(
            "Saving credential for {} (user {})",
            record.origin, record.username
        );
        self.dispatch(Frame::SaveCredential(record)).await
    }

    async fn save_preference(
        &self,
        origin: &OriginKey,
        locator: &FieldLocator,
        role: Role,
    ) -> Result<(), SyncError> {
        debug!("Saving preference {} -> {} for {}", role, locator, origin);
        self.dispatch(Frame::SavePreference {
            origin: origin.clone(),
            locator: locator.clone(),
            role,
        })
        .await
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
