//! 포워더 클라이언트 -- 브로커 세션 추상화와 발행 정책
//!
//! [`BrokerSession`] trait은 전송 계층을 추상화하여 프로덕션에서는
//! [`MqttSession`](crate::mqtt::MqttSession)을, 테스트에서는 모의 세션을 사용할 수 있게 합니다.
//!
//! # 연결 수명주기
//! ```text
//! Connecting --connack--> Connected --error--> Lost
//!                              |
//!                              +--disconnect--> Closed
//! ```
//! - `Connected` 진입 시 `on_connect` 핸들러가 정확히 한 번 호출됩니다.
//! - `Lost` 진입 시 `on_connection_lost` 핸들러가 한 번 호출되고,
//!   [`ConnectionWatch`]를 통해 코디네이터에 에러가 전달됩니다. 재연결은 하지 않습니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

use logbridge_core::metrics as m;

use crate::config::{PublishFailurePolicy, PublishSettings};
use crate::error::ForwarderError;
use crate::message::Message;

/// 재시도 사이의 기본 대기 시간 (시도 횟수에 비례하여 증가)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// 브로커 세션 trait
///
/// 한 프로세스에는 최대 하나의 활성 세션만 존재합니다.
pub trait BrokerSession: Send + Sync + 'static {
    /// 세션의 클라이언트 식별자
    fn client_id(&self) -> &str;

    /// 페이로드를 토픽에 가장 낮은 전달 보장 수준(QoS 0, retain 없음)으로 발행합니다.
    ///
    /// 전송 계층이 요청을 받아들일 때까지 대기하며, 브로커 확인 응답은 기다리지 않습니다.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), ForwarderError>> + Send;

    /// 전송 중인 메시지를 최대 `grace` 동안 기다린 뒤 연결을 종료합니다.
    fn disconnect(self, grace: Duration) -> impl Future<Output = Result<(), ForwarderError>> + Send;
}

/// 연결 성공 콜백
pub type ConnectHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// 연결 끊김 콜백
pub type ConnectionLostHandler = Arc<dyn Fn(&ForwarderError) + Send + Sync>;

/// 연결 이벤트 핸들러
///
/// 기본 핸들러는 `tracing`으로 이벤트를 기록합니다.
#[derive(Clone)]
pub struct ConnectionHandlers {
    on_connect: ConnectHandler,
    on_connection_lost: ConnectionLostHandler,
}

impl ConnectionHandlers {
    /// 기본 로깅 핸들러를 생성합니다.
    pub fn new() -> Self {
        Self {
            on_connect: Arc::new(|client_id| {
                info!(client_id, "connected to MQTT server");
            }),
            on_connection_lost: Arc::new(|err| {
                error!(error = %err, "connection to MQTT server lost");
            }),
        }
    }

    /// 연결 성공 핸들러를 교체합니다.
    pub fn on_connect(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_connect = Arc::new(handler);
        self
    }

    /// 연결 끊김 핸들러를 교체합니다.
    pub fn on_connection_lost(
        mut self,
        handler: impl Fn(&ForwarderError) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_lost = Arc::new(handler);
        self
    }
}

impl Default for ConnectionHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandlers").finish_non_exhaustive()
    }
}

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Connected,
    /// 연결이 끊어짐
    Lost,
    /// 정상 종료됨
    Closed,
}

/// 연결 수명주기를 추적하고 핸들러를 호출합니다.
///
/// 전송 계층의 이벤트 루프가 소유하며, 상태 전이마다 핸들러를 최대 한 번 호출합니다.
pub struct ConnectionMonitor {
    client_id: String,
    state: ConnectionState,
    handlers: ConnectionHandlers,
    lost_tx: Option<oneshot::Sender<ForwarderError>>,
}

impl ConnectionMonitor {
    /// 새 모니터와 코디네이터가 사용할 감시 핸들을 생성합니다.
    pub fn new(
        client_id: impl Into<String>,
        handlers: ConnectionHandlers,
    ) -> (Self, ConnectionWatch) {
        let (lost_tx, lost_rx) = oneshot::channel();
        let monitor = Self {
            client_id: client_id.into(),
            state: ConnectionState::Connecting,
            handlers,
            lost_tx: Some(lost_tx),
        };
        (monitor, ConnectionWatch::new(lost_rx))
    }

    /// 연결 성공을 기록합니다. 상태가 바뀐 경우 `true`를 반환합니다.
    pub fn connected(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        metrics::gauge!(m::BROKER_CONNECTED).set(1.0);
        (self.handlers.on_connect)(&self.client_id);
        true
    }

    /// 연결 끊김을 기록하고 감시 핸들에 에러를 전달합니다.
    pub fn lost(&mut self, err: ForwarderError) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.state = ConnectionState::Lost;
        metrics::gauge!(m::BROKER_CONNECTED).set(0.0);
        (self.handlers.on_connection_lost)(&err);
        if let Some(tx) = self.lost_tx.take() {
            // 코디네이터가 이미 종료된 경우 수신측이 없을 수 있음
            let _ = tx.send(err);
        }
        true
    }

    /// 정상 종료를 기록합니다.
    pub fn closed(&mut self) {
        if self.state == ConnectionState::Connected {
            metrics::gauge!(m::BROKER_CONNECTED).set(0.0);
        }
        self.state = ConnectionState::Closed;
        self.lost_tx.take();
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 클라이언트 식별자를 반환합니다.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// 연결 끊김을 기다리는 코디네이터 측 핸들
#[derive(Debug)]
pub struct ConnectionWatch {
    rx: oneshot::Receiver<ForwarderError>,
    fired: bool,
}

impl ConnectionWatch {
    fn new(rx: oneshot::Receiver<ForwarderError>) -> Self {
        Self { rx, fired: false }
    }

    /// 연결이 끊어질 때까지 기다립니다.
    ///
    /// 취소에 안전하므로 `tokio::select!`에서 반복 호출할 수 있습니다.
    /// 모니터가 에러 없이 사라진 경우에도 연결 끊김으로 간주합니다.
    pub async fn lost(&mut self) -> ForwarderError {
        if self.fired {
            return std::future::pending().await;
        }
        let result = (&mut self.rx).await;
        self.fired = true;
        result.unwrap_or_else(|_| {
            ForwarderError::ConnectionLost("connection event loop stopped".to_owned())
        })
    }
}

/// 발행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 전송 성공
    Published,
    /// 재시도 소진 후 버려짐
    Dropped,
}

/// 포워더 클라이언트
///
/// 로그 라인을 [`Message`]로 감싸 고정 토픽에 순차적으로 발행합니다.
pub struct ForwarderClient<S> {
    session: S,
    settings: PublishSettings,
    published: u64,
    dropped: u64,
}

impl<S: BrokerSession> ForwarderClient<S> {
    /// 연결된 세션으로 클라이언트를 생성합니다.
    pub fn new(session: S, settings: PublishSettings) -> Self {
        Self {
            session,
            settings,
            published: 0,
            dropped: 0,
        }
    }

    /// 라인 하나를 발행합니다.
    ///
    /// 실패 시 `retries`만큼 재시도하고, 그래도 실패하면 정책에 따라
    /// 라인을 버리거나(`Drop`) 에러를 반환합니다(`Fatal`).
    pub async fn publish(&mut self, line: &str) -> Result<PublishOutcome, ForwarderError> {
        let payload = Message::encode(line)?;
        let mut attempt: u32 = 0;

        loop {
            let err = match self
                .session
                .publish(&self.settings.topic, payload.clone())
                .await
            {
                Ok(()) => {
                    self.published += 1;
                    metrics::counter!(m::LINES_PUBLISHED_TOTAL).increment(1);
                    return Ok(PublishOutcome::Published);
                }
                Err(err) => err,
            };

            metrics::counter!(m::PUBLISH_FAILURES_TOTAL).increment(1);

            if attempt < self.settings.retries {
                attempt += 1;
                warn!(attempt, error = %err, "publish failed, retrying");
                tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                continue;
            }

            return match self.settings.failure_policy {
                PublishFailurePolicy::Drop => {
                    self.dropped += 1;
                    metrics::counter!(m::LINES_DROPPED_TOTAL).increment(1);
                    warn!(
                        error = %err,
                        retries = self.settings.retries,
                        "publish failed, dropping line"
                    );
                    Ok(PublishOutcome::Dropped)
                }
                PublishFailurePolicy::Fatal => {
                    error!(
                        error = %err,
                        retries = self.settings.retries,
                        "publish failed after retries"
                    );
                    Err(err)
                }
            };
        }
    }

    /// 연결을 정상 종료합니다.
    pub async fn disconnect(self, grace: Duration) -> Result<(), ForwarderError> {
        info!(
            client_id = self.session.client_id(),
            published = self.published,
            dropped = self.dropped,
            "disconnecting from broker"
        );
        self.session.disconnect(grace).await
    }

    /// 세션의 클라이언트 식별자를 반환합니다.
    pub fn client_id(&self) -> &str {
        self.session.client_id()
    }

    /// 발행 토픽을 반환합니다.
    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    /// 발행에 성공한 라인 수를 반환합니다.
    pub fn published_count(&self) -> u64 {
        self.published
    }

    /// 버려진 라인 수를 반환합니다.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// 세션에 대한 참조를 반환합니다.
    pub fn session(&self) -> &S {
        &self.session
    }
}
