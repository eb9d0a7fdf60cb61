//! logbridge 로그 포워더 -- systemd 유닛 로그를 MQTT 브로커로 전달
//!
//! # 모듈 구성
//!
//! - [`source`]: 외부 프로세스(`journalctl`) 표준 출력을 원시 청크로 읽기
//! - [`splitter`]: 청크를 로그 라인으로 분할 (버퍼링/청크 단위)
//! - [`message`]: `{"message": "..."}` JSON 페이로드
//! - [`client`]: 브로커 세션 trait, 연결 수명주기, 발행 재시도 정책
//! - [`mqtt`]: `rumqttc` 기반 MQTT 세션
//! - [`pipeline`]: 소스 -> 분할기 -> 클라이언트 흐름 오케스트레이션
//! - [`config`]: 포워더 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! journalctl -u <unit> -f -n 0
//!     | stdout (<= read_chunk_size bytes)
//!     v
//! ProcessSource -> mpsc -> LineSplitter -> ForwarderClient -> MQTT "logs/submit" (QoS 0)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod mqtt;
pub mod pipeline;
pub mod source;
pub mod splitter;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{ForwardPipeline, ForwardPipelineBuilder, PipelineExit, PipelineStats};

// 설정
pub use config::{
    BrokerSettings, ForwarderConfig, PublishFailurePolicy, PublishSettings, SplitMode,
};

// 에러
pub use error::ForwarderError;

// 소스
pub use source::{LogSource, ProcessSource, ReaderSource, SourceCommand};

// 분할기
pub use splitter::LineSplitter;

// 클라이언트
pub use client::{
    BrokerSession, ConnectionHandlers, ConnectionMonitor, ConnectionState, ConnectionWatch,
    ForwarderClient, PublishOutcome,
};
pub use mqtt::MqttSession;

// 메시지
pub use message::Message;
