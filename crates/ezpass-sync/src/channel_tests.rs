use super::*;

use std::sync::atomic::AtomicU32;

use futures::channel::mpsc;

const ANSWER: &str = r##"{"preferences":[{"role":"Username","selector":"#u"},{"role":"Password","selector":"#p"}],"username_email":"a@b.com","password":"secret"}"##;

/// In-process service double. Every connect creates a fresh duplex pair;
/// outbound frames are recorded and fetches are answered with `ANSWER`.
#[derive(Default)]
struct FakeService {
    attempts: AtomicU32,
    /// Number of leading connect attempts that fail.
    fail_first: AtomicU32,
    connect_delay: Mutex<Option<Duration>>,
    /// Answer fetches automatically.
    auto_reply: std::sync::atomic::AtomicBool,
    sent: Arc<Mutex<Vec<String>>>,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Result<String, SyncError>>>>>,
}

impl FakeService {
    fn replying() -> Arc<Self> {
        let service = Self::default();
        service.auto_reply.store(true, Ordering::SeqCst);
        Arc::new(service)
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Push a raw frame to the most recent connection.
    fn push(&self, text: &str) {
        if let Some(peer) = self.peers.lock().last() {
            let _ = peer.unbounded_send(Ok(text.to_string()));
        }
    }

    /// Close every live connection from the service side.
    fn drop_connections(&self) {
        self.peers.lock().clear();
    }
}

fn is_fetch(text: &str) -> bool {
    !text.starts_with("ADD_PASSWORD|") && !text.starts_with("PREF:")
}

#[async_trait]
impl Connector for FakeService {
    async fn connect(&self, _endpoint: &str) -> Result<Connection, SyncError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if attempt <= self.fail_first.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("refused".to_string()));
        }

        let (client_tx, mut client_rx) = mpsc::unbounded::<String>();
        let (server_tx, server_rx) = mpsc::unbounded::<Result<String, SyncError>>();
        // Only the peer list holds the service side, so clearing it closes the stream.
        self.peers.lock().push(server_tx);

        let sent = Arc::clone(&self.sent);
        let peers = Arc::clone(&self.peers);
        let auto_reply = self.auto_reply.load(Ordering::SeqCst);
        tokio::spawn(async move {
            while let Some(text) = client_rx.next().await {
                sent.lock().push(text.clone());
                if auto_reply && is_fetch(&text) {
                    if let Some(peer) = peers.lock().last() {
                        let _ = peer.unbounded_send(Ok(ANSWER.to_string()));
                    }
                }
            }
        });

        Ok(Connection {
            sink: Box::pin(client_tx.sink_map_err(|e| SyncError::SendFailed(e.to_string()))),
            stream: server_rx.boxed(),
        })
    }
}

fn config() -> ChannelConfig {
    ChannelConfig {
        connect_timeout: Duration::from_millis(500),
        response_timeout: Duration::from_millis(500),
        policy: ReconnectPolicy::Lazy,
    }
}

fn channel(service: &Arc<FakeService>, config: ChannelConfig) -> SyncChannel {
    SyncChannel::with_connector("ws://127.0.0.1:9001", config, service.clone())
}

fn origin(s: &str) -> OriginKey {
    OriginKey::from_normalized(s)
}

async fn wait_for_state(channel: &SyncChannel, wanted: ChannelState) {
    let mut rx = channel.state_changes();
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if *rx.borrow_and_update() == wanted {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "channel never reached {:?}", wanted);
}

#[test]
fn test_new_rejects_non_websocket_endpoint() {
    let result = SyncChannel::new("http://127.0.0.1:9001", ChannelConfig::default());
    assert!(matches!(result, Err(SyncError::InvalidEndpoint(_))));

    let result = SyncChannel::new("not a url", ChannelConfig::default());
    assert!(matches!(result, Err(SyncError::InvalidEndpoint(_))));
}

#[tokio::test]
async fn test_new_accepts_ws_endpoint_without_connecting() {
    let channel = SyncChannel::new("ws://127.0.0.1:9001", ChannelConfig::default()).unwrap();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.connection_attempts(), 0);
    assert_eq!(channel.endpoint(), "ws://127.0.0.1:9001");
}

#[test]
fn test_channel_config_from_sync_config() {
    let sync = SyncConfig::default();
    let config = ChannelConfig::from_config(&sync);
    assert_eq!(
        config.connect_timeout,
        Duration::from_millis(sync.connect_timeout_ms)
    );
    assert_eq!(
        config.response_timeout,
        Duration::from_millis(sync.response_timeout_ms)
    );
    assert_eq!(config.policy, ReconnectPolicy::Lazy);
}

#[tokio::test]
async fn test_fetch_connects_and_returns_answer() {
    let service = FakeService::replying();
    let channel = channel(&service, config());

    let answer = channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();

    assert_eq!(answer.username_email.as_deref(), Some("a@b.com"));
    assert_eq!(answer.password.as_deref(), Some("secret"));
    assert_eq!(answer.preferences.len(), 2);
    assert_eq!(channel.state(), ChannelState::Open);
    assert_eq!(service.sent(), vec!["example.com".to_string()]);
}

#[tokio::test]
async fn test_concurrent_operations_share_one_connect() {
    let service = FakeService::silent();
    *service.connect_delay.lock() = Some(Duration::from_millis(50));
    let channel = channel(&service, config());
    let o = origin("example.com");
    let user = FieldLocator::new("#u");
    let pass = FieldLocator::new("#p");

    let (a, b, c) = tokio::join!(
        channel.save_preference(&o, &user, Role::Username),
        channel.save_preference(&o, &pass, Role::Password),
        channel.save_credential(CredentialRecord {
            origin: o.clone(),
            username: "alice".to_string(),
            password: "pw".to_string(),
            username_locator: FieldLocator::new("#u"),
            password_locator: FieldLocator::new("#p"),
        }),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(service.attempts(), 1);
    assert_eq!(channel.connection_attempts(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        service.sent(),
        vec![
            "PREF:example.com|#u|Username".to_string(),
            "PREF:example.com|#p|Password".to_string(),
            "ADD_PASSWORD|example.com|alice|pw|#u|#p".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_open_channel_sends_directly() {
    let service = FakeService::replying();
    let channel = channel(&service, config());
    let o = origin("example.com");

    channel.request_credentials(&o).await.unwrap();
    channel
        .save_preference(&o, &FieldLocator::new("#u"), Role::Username)
        .await
        .unwrap();

    assert_eq!(service.attempts(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(service.sent().len(), 2);
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let service = FakeService::silent();
    let channel = channel(&service, config());
    let mut answers = channel.subscribe_answers();

    let origin_ = origin("example.com");
    let pending = channel.request_credentials(&origin_);
    let inject = async {
        wait_for_state(&channel, ChannelState::Open).await;
        service.push("this is not json");
        service.push(ANSWER);
    };
    let (result, ()) = tokio::join!(pending, inject);

    let answer = result.unwrap();
    assert_eq!(answer.password.as_deref(), Some("secret"));
    assert_eq!(channel.state(), ChannelState::Open);

    let broadcast = answers.recv().await.unwrap();
    assert_eq!(broadcast, answer);
}

#[tokio::test]
async fn test_newer_fetch_supersedes_pending_one() {
    let service = FakeService::silent();
    let channel = channel(&service, config());

    let origin_a = origin("a.com");
    let first = channel.request_credentials(&origin_a);
    let second = async {
        wait_for_state(&channel, ChannelState::Open).await;
        let origin_b = origin("b.com");
        let pending = channel.request_credentials(&origin_b);
        let reply = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            service.push(ANSWER);
        };
        let (result, ()) = tokio::join!(pending, reply);
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap_err(), SyncError::Superseded);
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_response_timeout() {
    let service = FakeService::silent();
    let mut config = config();
    config.response_timeout = Duration::from_millis(50);
    let channel = channel(&service, config);

    let result = channel.request_credentials(&origin("example.com")).await;
    assert_eq!(result.unwrap_err(), SyncError::ResponseTimeout(50));
    // The connection survives a slow service.
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test]
async fn test_connect_timeout_fails_queued_operation() {
    let service = FakeService::silent();
    *service.connect_delay.lock() = Some(Duration::from_millis(300));
    let mut config = config();
    config.connect_timeout = Duration::from_millis(50);
    let channel = channel(&service, config);

    let result = channel
        .save_preference(&origin("a.com"), &FieldLocator::new("#u"), Role::Username)
        .await;
    assert_eq!(result.unwrap_err(), SyncError::ConnectionTimeout(50));
}

#[tokio::test]
async fn test_lazy_failure_returns_to_disconnected_and_retries_on_next_operation() {
    let service = FakeService::replying();
    service.fail_first.store(1, Ordering::SeqCst);
    let channel = channel(&service, config());

    let first = channel.request_credentials(&origin("example.com")).await;
    assert!(matches!(first, Err(SyncError::ConnectionFailed(_))));
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(service.attempts(), 1);

    let second = channel.request_credentials(&origin("example.com")).await;
    assert!(second.is_ok());
    assert_eq!(service.attempts(), 2);
}

#[tokio::test]
async fn test_lazy_does_not_reconnect_until_needed() {
    let service = FakeService::replying();
    let channel = channel(&service, config());

    channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();
    service.drop_connections();
    wait_for_state(&channel, ChannelState::Disconnected).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.attempts(), 1);

    channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();
    assert_eq!(service.attempts(), 2);
}

#[tokio::test]
async fn test_disconnect_fails_pending_fetch() {
    let service = FakeService::silent();
    let channel = channel(&service, config());

    let origin_ = origin("example.com");
    let pending = channel.request_credentials(&origin_);
    let drop_it = async {
        wait_for_state(&channel, ChannelState::Open).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.drop_connections();
    };
    let (result, ()) = tokio::join!(pending, drop_it);
    assert_eq!(result.unwrap_err(), SyncError::Closed);
}

#[tokio::test]
async fn test_bounded_reconnects_after_drop() {
    let service = FakeService::replying();
    let mut config = config();
    config.policy = ReconnectPolicy::Bounded {
        max_attempts: 3,
        delay: Duration::from_millis(10),
    };
    let channel = channel(&service, config);

    channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();
    service.drop_connections();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.attempts(), 2);
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test]
async fn test_bounded_exhaustion_fails_fast() {
    let service = FakeService::replying();
    service.fail_first.store(u32::MAX, Ordering::SeqCst);
    let mut config = config();
    config.policy = ReconnectPolicy::Bounded {
        max_attempts: 2,
        delay: Duration::from_millis(5),
    };
    let channel = channel(&service, config);

    let result = channel.request_credentials(&origin("example.com")).await;
    assert_eq!(
        result.unwrap_err(),
        SyncError::RetriesExhausted { attempts: 2 }
    );
    assert_eq!(channel.state(), ChannelState::Exhausted);
    let attempts = service.attempts();

    // Fails immediately without another connect.
    let result = channel
        .save_preference(&origin("example.com"), &FieldLocator::new("#u"), Role::Username)
        .await;
    assert!(matches!(result, Err(SyncError::RetriesExhausted { .. })));
    assert_eq!(service.attempts(), attempts);

    channel.reset();
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_exhausted_fetch_leaves_pending_fetch_alone() {
    let service = FakeService::replying();
    service.fail_first.store(u32::MAX, Ordering::SeqCst);
    let mut config = config();
    config.policy = ReconnectPolicy::Bounded {
        max_attempts: 1,
        delay: Duration::from_millis(5),
    };
    let channel = channel(&service, config);
    let _ = channel.request_credentials(&origin("example.com")).await;
    assert_eq!(channel.state(), ChannelState::Exhausted);

    let (tx, mut pending) = oneshot::channel();
    channel.shared.inner.lock().waiter = Some(AnswerWaiter { seq: 99, tx });

    let result = channel.request_credentials(&origin("example.com")).await;

    assert!(matches!(result, Err(SyncError::RetriesExhausted { .. })));
    assert!(matches!(
        pending.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    ));
    let inner = channel.shared.inner.lock();
    assert_eq!(inner.waiter.as_ref().map(|w| w.seq), Some(99));
}

#[tokio::test]
async fn test_close_returns_to_disconnected() {
    let service = FakeService::replying();
    let channel = channel(&service, config());

    channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();
    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Disconnected);

    channel
        .request_credentials(&origin("example.com"))
        .await
        .unwrap();
    assert_eq!(service.attempts(), 2);
}
