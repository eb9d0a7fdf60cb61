//! 포워딩 파이프라인 -- 소스 청크를 라인으로 분할하여 브로커에 발행합니다.
//!
//! # 내부 아키텍처
//! ```text
//! LogSource (task) -> mpsc(channel_capacity) -> LineSplitter -> ForwarderClient -> broker
//! ```
//!
//! 청크는 수신 순서대로 하나씩 처리되며, 한 청크의 라인을 모두 발행한 뒤에
//! 다음 청크를 받습니다. 소스는 채널 슬롯을 확보한 뒤에만 읽으므로, 채널 용량이
//! 1이면 처리 중인 청크보다 최대 한 청크만 앞서 읽습니다.
//!
//! # 종료 조건
//! - 소스 스트림 종료: 잔여 라인을 플러시하고 소스 태스크의 결과를 확인한 뒤
//!   [`PipelineExit::SourceClosed`] 반환
//! - 종료 신호: [`PipelineExit::Shutdown`] 반환 (소스 태스크는 중단)
//! - 연결 끊김 또는 치명적 발행 실패: 에러 반환 (청크 중간이라도 즉시)

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{BrokerSession, ConnectionWatch, ForwarderClient, PublishOutcome};
use crate::config::ForwarderConfig;
use crate::error::ForwarderError;
use crate::source::LogSource;
use crate::splitter::LineSplitter;

/// 파이프라인 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineExit {
    /// 로그 소스 스트림이 닫힘
    SourceClosed,
    /// 종료 신호를 받음
    Shutdown,
}

/// 파이프라인 처리 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 수신한 청크 수
    pub chunks: u64,
    /// 분할된 라인 수
    pub lines: u64,
    /// 발행된 라인 수
    pub published: u64,
    /// 버려진 라인 수
    pub dropped: u64,
}

/// 포워딩 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logbridge_forwarder::{ForwardPipelineBuilder, ProcessSource, SourceCommand};
///
/// let mut pipeline = ForwardPipelineBuilder::new(client)
///     .config(config)
///     .build()?;
///
/// let source = ProcessSource::spawn(SourceCommand::journalctl(&unit)?, 1024)?;
/// let exit = pipeline.run(source, &mut watch, &shutdown).await?;
/// pipeline.shutdown().await?;
/// ```
pub struct ForwardPipeline<S> {
    config: ForwarderConfig,
    client: ForwarderClient<S>,
    splitter: LineSplitter,
    stats: PipelineStats,
}

impl<S: BrokerSession> ForwardPipeline<S> {
    /// 소스가 닫히거나, 연결이 끊기거나, 종료 신호를 받을 때까지 라인을 전달합니다.
    pub async fn run<L: LogSource>(
        &mut self,
        source: L,
        connection: &mut ConnectionWatch,
        shutdown: &CancellationToken,
    ) -> Result<PipelineExit, ForwarderError> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        info!(
            source = %source.describe(),
            topic = self.client.topic(),
            mode = ?self.splitter.mode(),
            "forwarding log lines"
        );
        let producer = tokio::spawn(source.stream(tx));

        let result = self.forward(rx, connection, shutdown).await;
        match result {
            Ok(PipelineExit::SourceClosed) => {
                join_producer(producer).await?;
                info!(
                    chunks = self.stats.chunks,
                    published = self.stats.published,
                    dropped = self.stats.dropped,
                    "log source stream closed"
                );
                Ok(PipelineExit::SourceClosed)
            }
            other => {
                // 소스 태스크가 드롭되면서 자식 프로세스도 종료됨
                producer.abort();
                other
            }
        }
    }

    async fn forward(
        &mut self,
        mut rx: mpsc::Receiver<bytes::Bytes>,
        connection: &mut ConnectionWatch,
        shutdown: &CancellationToken,
    ) -> Result<PipelineExit, ForwarderError> {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping pipeline");
                    return Ok(PipelineExit::Shutdown);
                }
                err = connection.lost() => {
                    return Err(err);
                }
                chunk = rx.recv() => match chunk {
                    Some(chunk) => {
                        self.stats.chunks += 1;
                        let lines = self.splitter.push(&chunk);
                        if let Some(exit) = self.publish_lines(lines, connection, shutdown).await? {
                            return Ok(exit);
                        }
                    }
                    None => {
                        let rest = self.splitter.finish();
                        if let Some(exit) = self.publish_lines(rest, connection, shutdown).await? {
                            return Ok(exit);
                        }
                        return Ok(PipelineExit::SourceClosed);
                    }
                },
            }
        }
    }

    /// 라인을 순서대로 발행합니다.
    ///
    /// 각 발행(재시도 대기 포함)은 연결 끊김, 종료 신호와 경쟁하므로
    /// 청크 중간에 연결이 끊기면 남은 라인을 시도하지 않고 즉시 에러를 반환합니다.
    async fn publish_lines(
        &mut self,
        lines: Vec<String>,
        connection: &mut ConnectionWatch,
        shutdown: &CancellationToken,
    ) -> Result<Option<PipelineExit>, ForwarderError> {
        for line in lines {
            self.stats.lines += 1;
            let outcome = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown requested while publishing, stopping pipeline");
                    return Ok(Some(PipelineExit::Shutdown));
                }
                err = connection.lost() => return Err(err),
                outcome = self.client.publish(&line) => outcome?,
            };
            match outcome {
                PublishOutcome::Published => self.stats.published += 1,
                PublishOutcome::Dropped => self.stats.dropped += 1,
            }
        }
        Ok(None)
    }

    /// 처리 통계를 반환합니다.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// 클라이언트에 대한 참조를 반환합니다.
    pub fn client(&self) -> &ForwarderClient<S> {
        &self.client
    }

    /// 파이프라인을 해체하고 클라이언트를 반환합니다.
    pub fn into_client(self) -> ForwarderClient<S> {
        self.client
    }

    /// 설정된 유예 시간으로 브로커 연결을 종료합니다.
    pub async fn shutdown(self) -> Result<(), ForwarderError> {
        let grace = self.config.broker.disconnect_grace;
        debug!(grace_ms = grace.as_millis() as u64, "closing broker session");
        self.client.disconnect(grace).await
    }
}

async fn join_producer(
    producer: JoinHandle<Result<(), ForwarderError>>,
) -> Result<(), ForwarderError> {
    producer
        .await
        .map_err(|e| ForwarderError::Channel(format!("log source task failed: {e}")))?
}

/// 포워딩 파이프라인 빌더
pub struct ForwardPipelineBuilder<S> {
    config: ForwarderConfig,
    client: ForwarderClient<S>,
}

impl<S: BrokerSession> ForwardPipelineBuilder<S> {
    /// 연결된 클라이언트로 새 빌더를 생성합니다.
    pub fn new(client: ForwarderClient<S>) -> Self {
        Self {
            config: ForwarderConfig::default(),
            client,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: ForwarderConfig) -> Self {
        self.config = config;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 빌드 전에 설정을 검증합니다. 기본 설정은 유닛이 비어 있으므로
    /// 반드시 [`config`](Self::config)로 설정을 지정해야 합니다.
    pub fn build(self) -> Result<ForwardPipeline<S>, ForwarderError> {
        self.config.validate()?;

        let splitter = LineSplitter::new(self.config.split_mode, self.config.max_line_bytes);

        Ok(ForwardPipeline {
            config: self.config,
            client: self.client,
            splitter,
            stats: PipelineStats::default(),
        })
    }
}
