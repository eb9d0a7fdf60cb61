//! 에러 타입 — 장애 분류별 에러 정의
//!
//! 모든 치명적 조건은 프로세스를 바로 종료하지 않고 [`BridgeError`]로
//! 상위 계층(코디네이터, 데몬)까지 전파됩니다. 종료 여부는 데몬이 결정합니다.

/// logbridge 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 브로커 연결 에러
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// 로그 소스 에러
    #[error("log source error: {0}")]
    Source(#[from] SourceError),

    /// 메시지 발행 에러
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 필수 설정 값 누락
    #[error("{field} is required (set {env_key})")]
    Missing { field: String, env_key: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 브로커 연결 에러
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// 최초 연결 실패
    #[error("failed to connect to broker: {0}")]
    ConnectFailed(String),

    /// 연결 이후 비동기적으로 연결이 끊어짐
    #[error("connection to broker lost: {0}")]
    Lost(String),
}

/// 로그 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 외부 프로세스 실행 실패
    #[error("failed to spawn log source: {0}")]
    SpawnFailed(String),

    /// 표준 출력 스트림을 열 수 없음
    #[error("log source stdout unavailable: {0}")]
    StreamUnavailable(String),

    /// 스트림 종료 후 비정상 종료 코드로 종료됨
    #[error("log source exited abnormally: {0}")]
    Exited(String),
}

/// 메시지 발행 에러
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// 전송 시도 실패
    #[error("send failed: {0}")]
    SendFailed(String),

    /// 페이로드 인코딩 실패
    #[error("encode failed: {0}")]
    Encode(String),
}
