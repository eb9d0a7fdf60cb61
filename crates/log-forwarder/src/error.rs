//! 로그 포워더 에러 타입
//!
//! [`ForwarderError`]는 포워더 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<ForwarderError> for BridgeError` 변환이 구현되어 있어
//! 데몬에서 장애 분류(설정/연결/소스/발행)에 따라 종료 정책을 결정할 수 있습니다.

use logbridge_core::error::{
    BridgeError, ConfigError, ConnectionError, PublishError, SourceError,
};

/// 로그 포워더 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 로그 소스 프로세스 실행 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 로그 소스의 표준 출력을 열 수 없음
    #[error("stdout of '{0}' is unavailable")]
    StdoutUnavailable(String),

    /// 스트림 종료 후 로그 소스가 비정상 종료됨
    #[error("log source '{program}' exited with {status}")]
    SourceExited {
        /// 실행한 프로그램
        program: String,
        /// 종료 상태
        status: String,
    },

    /// 브로커 최초 연결 실패
    #[error("connect error: {0}")]
    Connect(String),

    /// 브로커 연결이 끊어짐 (재연결하지 않음)
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// 메시지 발행 실패
    #[error("publish error: {0}")]
    Publish(String),

    /// 메시지 인코딩/디코딩 실패
    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ForwarderError> for BridgeError {
    fn from(err: ForwarderError) -> Self {
        match err {
            ForwarderError::Config { field, reason } => {
                BridgeError::Config(ConfigError::InvalidValue { field, reason })
            }
            ForwarderError::Spawn { .. } => {
                BridgeError::Source(SourceError::SpawnFailed(err.to_string()))
            }
            ForwarderError::StdoutUnavailable(_) => {
                BridgeError::Source(SourceError::StreamUnavailable(err.to_string()))
            }
            ForwarderError::SourceExited { .. } | ForwarderError::Channel(_) => {
                BridgeError::Source(SourceError::Exited(err.to_string()))
            }
            ForwarderError::Connect(reason) => {
                BridgeError::Connection(ConnectionError::ConnectFailed(reason))
            }
            ForwarderError::ConnectionLost(reason) => {
                BridgeError::Connection(ConnectionError::Lost(reason))
            }
            ForwarderError::Publish(reason) => {
                BridgeError::Publish(PublishError::SendFailed(reason))
            }
            ForwarderError::Codec(e) => BridgeError::Publish(PublishError::Encode(e.to_string())),
            ForwarderError::Io(e) => BridgeError::Io(e),
        }
    }
}
