//! logbridge 공통 타입 — 에러, 설정, 메트릭 이름
//!
//! 로그 포워더 크레이트와 데몬이 함께 사용하는 기반 모듈입니다.
//!
//! - [`config`]: `logbridge.toml` + 환경변수 설정
//! - [`error`]: 장애 분류별 에러 타입
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{BridgeError, ConfigError, ConnectionError, PublishError, SourceError};

// 설정
pub use config::{
    BridgeConfig, BrokerConfig, GeneralConfig, MetricsConfig, SourceConfig, SplitterConfig,
};
