//! 포워더 설정
//!
//! [`ForwarderConfig`]는 core의 [`BridgeConfig`](logbridge_core::config::BridgeConfig)에서
//! 파생되며, 문자열로 검증된 값을 타입이 있는 정책으로 변환합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logbridge_core::config::BridgeConfig;
//! use logbridge_forwarder::ForwarderConfig;
//!
//! let core_config = BridgeConfig::from_env()?;
//! let config = ForwarderConfig::from_core(&core_config)?;
//! ```

use std::time::Duration;

use logbridge_core::config::{BridgeConfig, DEFAULT_TOPIC};

use crate::error::ForwarderError;

/// 라인 분할 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplitMode {
    /// 청크 경계를 넘어 잔여 라인을 보관하고 완성된 라인만 내보냄 (기본값)
    #[default]
    Buffered,
    /// 청크마다 독립적으로 분할 (청크 경계에 걸친 라인은 두 조각으로 발행됨)
    PerChunk,
}

impl std::str::FromStr for SplitMode {
    type Err = ForwarderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buffered" => Ok(Self::Buffered),
            "per_chunk" => Ok(Self::PerChunk),
            other => Err(ForwarderError::Config {
                field: "splitter.mode".to_owned(),
                reason: format!("unknown split mode '{other}'"),
            }),
        }
    }
}

/// 재시도 후에도 발행에 실패한 라인의 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishFailurePolicy {
    /// 경고 로그를 남기고 라인을 버림 (기본값)
    #[default]
    Drop,
    /// 에러를 반환하여 데몬을 종료시킴
    Fatal,
}

impl std::str::FromStr for PublishFailurePolicy {
    type Err = ForwarderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "fatal" => Ok(Self::Fatal),
            other => Err(ForwarderError::Config {
                field: "broker.publish_failure".to_owned(),
                reason: format!("unknown publish failure policy '{other}'"),
            }),
        }
    }
}

/// 브로커 세션 설정
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// 브로커 URL
    pub url: String,
    /// MQTT keep-alive 간격
    pub keep_alive: Duration,
    /// 최초 연결 타임아웃
    pub connect_timeout: Duration,
    /// 연결 종료 유예 시간
    pub disconnect_grace: Duration,
    /// 클라이언트 요청 큐 용량
    pub request_capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            disconnect_grace: Duration::from_millis(250),
            request_capacity: 1,
        }
    }
}

/// 발행 정책 설정
#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// 발행 토픽
    pub topic: String,
    /// 발행 실패 시 재시도 횟수
    pub retries: u32,
    /// 재시도 소진 후 정책
    pub failure_policy: PublishFailurePolicy,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_owned(),
            retries: 2,
            failure_policy: PublishFailurePolicy::Drop,
        }
    }
}

/// 포워더 전체 설정
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// 로그를 수집할 systemd 유닛
    pub unit: String,
    /// 로그 스트림 제공 프로그램
    pub program: String,
    /// 한 번에 읽을 최대 바이트 수
    pub read_chunk_size: usize,
    /// 핸드오프 채널 용량
    pub channel_capacity: usize,
    /// 라인 분할 방식
    pub split_mode: SplitMode,
    /// 버퍼링 모드의 최대 라인 길이
    pub max_line_bytes: usize,
    /// 브로커 세션 설정
    pub broker: BrokerSettings,
    /// 발행 정책
    pub publish: PublishSettings,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            unit: String::new(),
            program: "journalctl".to_owned(),
            read_chunk_size: 1024,
            channel_capacity: 1,
            split_mode: SplitMode::default(),
            max_line_bytes: 64 * 1024,
            broker: BrokerSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl ForwarderConfig {
    /// core 설정에서 포워더 설정을 생성합니다.
    ///
    /// core 설정은 이미 검증되었다고 가정하지만, 정책 문자열은 여기서 다시 변환합니다.
    pub fn from_core(core: &BridgeConfig) -> Result<Self, ForwarderError> {
        let config = Self {
            unit: core.source.unit.clone(),
            program: core.source.program.clone(),
            read_chunk_size: core.source.read_chunk_size,
            channel_capacity: core.source.channel_capacity,
            split_mode: core.splitter.mode.parse()?,
            max_line_bytes: core.splitter.max_line_bytes,
            broker: BrokerSettings {
                url: core.broker.url.clone(),
                keep_alive: Duration::from_secs(core.broker.keep_alive_secs),
                connect_timeout: Duration::from_secs(core.broker.connect_timeout_secs),
                disconnect_grace: Duration::from_millis(core.broker.disconnect_grace_ms),
                request_capacity: core.broker.request_capacity,
            },
            publish: PublishSettings {
                topic: core.broker.topic.clone(),
                retries: core.broker.publish_retries,
                failure_policy: core.broker.publish_failure.parse()?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ForwarderError> {
        if self.unit.trim().is_empty() {
            return Err(ForwarderError::Config {
                field: "source.unit".to_owned(),
                reason: "unit must not be empty".to_owned(),
            });
        }

        if self.read_chunk_size == 0 {
            return Err(ForwarderError::Config {
                field: "source.read_chunk_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        // tokio mpsc 채널은 용량 0을 허용하지 않음
        if self.channel_capacity == 0 {
            return Err(ForwarderError::Config {
                field: "source.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_line_bytes == 0 {
            return Err(ForwarderError::Config {
                field: "splitter.max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}
