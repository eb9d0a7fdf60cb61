//! 통합 테스트 -- 소스부터 발행까지의 전체 포워딩 흐름 검증
//!
//! 브로커 대신 발행된 페이로드를 기록하는 모의 세션을 사용합니다.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use logbridge_forwarder::{
    BrokerSession, ConnectionHandlers, ConnectionMonitor, ForwardPipelineBuilder,
    ForwarderClient, ForwarderConfig, ForwarderError, LogSource, PipelineExit,
    PublishFailurePolicy, PublishSettings, ReaderSource, SplitMode,
};

/// 발행된 (토픽, 페이로드)를 기록하는 모의 세션
#[derive(Clone, Default)]
struct RecordingSession {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingSession {
    fn payloads(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl BrokerSession for RecordingSession {
    fn client_id(&self) -> &str {
        "integration"
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ForwarderError> {
        if self.fail {
            return Err(ForwarderError::Publish("broker rejected publish".to_owned()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((topic.to_owned(), String::from_utf8(payload).unwrap()));
        Ok(())
    }

    async fn disconnect(self, _grace: Duration) -> Result<(), ForwarderError> {
        Ok(())
    }
}

/// 청크를 하나씩 따로 보내는 소스 (각 청크가 별도의 읽기에 해당)
struct ChunkSource {
    chunks: Vec<&'static [u8]>,
    result: Result<(), &'static str>,
}

impl ChunkSource {
    fn new(chunks: Vec<&'static [u8]>) -> Self {
        Self {
            chunks,
            result: Ok(()),
        }
    }

    fn failing(chunks: Vec<&'static [u8]>, status: &'static str) -> Self {
        Self {
            chunks,
            result: Err(status),
        }
    }
}

impl LogSource for ChunkSource {
    fn describe(&self) -> String {
        format!("{} chunks", self.chunks.len())
    }

    async fn stream(self, tx: mpsc::Sender<Bytes>) -> Result<(), ForwarderError> {
        for chunk in self.chunks {
            if tx.send(Bytes::from_static(chunk)).await.is_err() {
                return Ok(());
            }
        }
        drop(tx);
        self.result.map_err(|status| ForwarderError::SourceExited {
            program: "journalctl".to_owned(),
            status: status.to_owned(),
        })
    }
}

/// 청크 하나를 보낸 뒤 영원히 대기하는 소스
struct StallingSource;

impl LogSource for StallingSource {
    fn describe(&self) -> String {
        "stalling".to_owned()
    }

    async fn stream(self, tx: mpsc::Sender<Bytes>) -> Result<(), ForwarderError> {
        let _ = tx.send(Bytes::from_static(b"first\n")).await;
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// 첫 발행에서 영원히 멈추는 세션
#[derive(Clone, Default)]
struct StuckSession {
    attempts: Arc<AtomicUsize>,
}

impl BrokerSession for StuckSession {
    fn client_id(&self) -> &str {
        "stuck"
    }

    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), ForwarderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn disconnect(self, _grace: Duration) -> Result<(), ForwarderError> {
        Ok(())
    }
}

/// 발행 도중 연결 끊김을 보고하고 실패하는 세션
#[derive(Clone)]
struct DisconnectingSession {
    monitor: Arc<Mutex<ConnectionMonitor>>,
    attempts: Arc<AtomicUsize>,
}

impl BrokerSession for DisconnectingSession {
    fn client_id(&self) -> &str {
        "disconnecting"
    }

    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), ForwarderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.monitor
            .lock()
            .unwrap()
            .lost(ForwarderError::ConnectionLost("socket closed".to_owned()));
        Err(ForwarderError::Publish("not connected".to_owned()))
    }

    async fn disconnect(self, _grace: Duration) -> Result<(), ForwarderError> {
        Ok(())
    }
}

/// 읽을 때마다 한 라인을 돌려주고 읽기 횟수를 세는 리더
struct CountingReader {
    reads: Arc<AtomicUsize>,
}

impl AsyncRead for CountingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        let line = format!("reading {n}\n");
        let len = line.len().min(buf.remaining());
        buf.put_slice(&line.as_bytes()[..len]);
        Poll::Ready(Ok(()))
    }
}

fn forwarder_config(mode: SplitMode) -> ForwarderConfig {
    ForwarderConfig {
        unit: "pi-sensor.service".to_owned(),
        split_mode: mode,
        ..Default::default()
    }
}

async fn forward(
    mode: SplitMode,
    source: impl LogSource,
) -> (Result<PipelineExit, ForwarderError>, RecordingSession) {
    let session = RecordingSession::default();
    let client = ForwarderClient::new(session.clone(), PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(mode))
        .build()
        .expect("valid config");

    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let result = pipeline
        .run(source, &mut watch, &CancellationToken::new())
        .await;
    drop(monitor);
    (result, session)
}

/// 한 청크에 두 라인 -> 두 메시지가 순서대로 발행됨
#[tokio::test]
async fn two_lines_in_one_chunk_are_published_in_order() {
    for mode in [SplitMode::Buffered, SplitMode::PerChunk] {
        let (result, session) = forward(mode, ChunkSource::new(vec![b"hello\nworld\n"])).await;

        assert_eq!(result.unwrap(), PipelineExit::SourceClosed);
        assert_eq!(
            session.payloads(),
            vec![r#"{"message":"hello"}"#, r#"{"message":"world"}"#],
            "mode {mode:?}"
        );
        assert!(
            session
                .sent
                .lock()
                .unwrap()
                .iter()
                .all(|(topic, _)| topic == "logs/submit")
        );
    }
}

/// 청크 경계에 걸친 라인 -- 버퍼링 방식은 하나의 라인으로 합침
#[tokio::test]
async fn split_line_is_joined_in_buffered_mode() {
    let (result, session) =
        forward(SplitMode::Buffered, ChunkSource::new(vec![b"foo", b"bar\n"])).await;

    assert_eq!(result.unwrap(), PipelineExit::SourceClosed);
    assert_eq!(session.payloads(), vec![r#"{"message":"foobar"}"#]);
}

/// 청크 경계에 걸친 라인 -- 청크 단위 방식은 두 조각으로 발행
#[tokio::test]
async fn split_line_is_forwarded_as_fragments_in_per_chunk_mode() {
    let (result, session) =
        forward(SplitMode::PerChunk, ChunkSource::new(vec![b"foo", b"bar\n"])).await;

    assert_eq!(result.unwrap(), PipelineExit::SourceClosed);
    assert_eq!(
        session.payloads(),
        vec![r#"{"message":"foo"}"#, r#"{"message":"bar"}"#]
    );
}

/// 빈 라인만 있는 스트림 -> 발행 없음
#[tokio::test]
async fn lone_newline_publishes_nothing() {
    for mode in [SplitMode::Buffered, SplitMode::PerChunk] {
        let (result, session) = forward(mode, ChunkSource::new(vec![b"\n"])).await;

        assert_eq!(result.unwrap(), PipelineExit::SourceClosed);
        assert!(session.payloads().is_empty(), "mode {mode:?}");
    }
}

/// JSON 특수 문자가 포함된 라인도 올바르게 이스케이프됨
#[tokio::test]
async fn special_characters_are_json_escaped() {
    let (result, session) = forward(
        SplitMode::Buffered,
        ChunkSource::new(vec![b"say \"hi\"\ttab\n"]),
    )
    .await;

    result.unwrap();
    assert_eq!(
        session.payloads(),
        vec![r#"{"message":"say \"hi\"\ttab"}"#]
    );
}

/// 리더 기반 소스도 같은 흐름으로 동작
#[tokio::test]
async fn reader_source_flushes_trailing_line() {
    let source = ReaderSource::new(
        std::io::Cursor::new(b"boot ok\nsensor ready".to_vec()),
        4,
        "cursor",
    );
    let (result, session) = forward(SplitMode::Buffered, source).await;

    assert_eq!(result.unwrap(), PipelineExit::SourceClosed);
    assert_eq!(
        session.payloads(),
        vec![r#"{"message":"boot ok"}"#, r#"{"message":"sensor ready"}"#]
    );
}

/// 소스 프로세스의 비정상 종료는 라인을 모두 발행한 뒤 에러로 전달됨
#[tokio::test]
async fn source_failure_is_reported_after_draining() {
    let (result, session) = forward(
        SplitMode::Buffered,
        ChunkSource::failing(vec![b"last words\n"], "exit status: 1"),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, ForwarderError::SourceExited { .. }));
    assert_eq!(session.payloads(), vec![r#"{"message":"last words"}"#]);
}

/// 연결 끊김은 파이프라인을 에러로 중단시킴
#[tokio::test]
async fn connection_loss_aborts_pipeline() {
    let session = RecordingSession::default();
    let client = ForwarderClient::new(session.clone(), PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();

    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let cancel = CancellationToken::new();
    let run = pipeline.run(StallingSource, &mut watch, &cancel);
    let lose = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.lost(ForwarderError::ConnectionLost("socket closed".to_owned()));
    };
    let (result, ()) = tokio::join!(run, lose);

    assert!(matches!(result, Err(ForwarderError::ConnectionLost(_))));
    assert_eq!(session.payloads(), vec![r#"{"message":"first"}"#]);
}

/// 종료 신호는 정상 종료로 처리됨
#[tokio::test]
async fn shutdown_signal_stops_pipeline() {
    let session = RecordingSession::default();
    let client = ForwarderClient::new(session.clone(), PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();

    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let run = pipeline.run(StallingSource, &mut watch, &shutdown);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    };
    let (result, ()) = tokio::join!(run, stop);

    assert_eq!(result.unwrap(), PipelineExit::Shutdown);
    pipeline.shutdown().await.unwrap();
    drop(monitor);
}

/// 발행 실패는 기본 정책(Drop)에서 파이프라인을 중단시키지 않음
#[tokio::test(start_paused = true)]
async fn publish_failures_are_dropped_by_default() {
    let session = RecordingSession {
        fail: true,
        ..Default::default()
    };
    let client = ForwarderClient::new(session, PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();
    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let exit = pipeline
        .run(
            ChunkSource::new(vec![b"a\nb\n"]),
            &mut watch,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(exit, PipelineExit::SourceClosed);
    assert_eq!(pipeline.stats().dropped, 2);
    assert_eq!(pipeline.stats().published, 0);
    drop(monitor);
}

/// Fatal 정책에서는 발행 실패가 파이프라인을 중단시킴
#[tokio::test(start_paused = true)]
async fn publish_failure_is_fatal_when_configured() {
    let session = RecordingSession {
        fail: true,
        ..Default::default()
    };
    let settings = PublishSettings {
        retries: 0,
        failure_policy: PublishFailurePolicy::Fatal,
        ..Default::default()
    };
    let client = ForwarderClient::new(session, settings);
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();
    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let result = pipeline
        .run(
            ChunkSource::new(vec![b"a\n"]),
            &mut watch,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ForwarderError::Publish(_))));
    drop(monitor);
}

/// 발행이 멈춘 동안 소스는 처리 중인 청크보다 한 청크만 더 읽음
#[tokio::test(start_paused = true)]
async fn source_reads_at_most_one_chunk_ahead_of_stuck_publish() {
    let session = StuckSession::default();
    let attempts = Arc::clone(&session.attempts);
    let client = ForwarderClient::new(session, PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();
    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();

    let reads = Arc::new(AtomicUsize::new(0));
    let source = ReaderSource::new(
        CountingReader {
            reads: Arc::clone(&reads),
        },
        64,
        "counting",
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    let run = pipeline.run(source, &mut watch, &shutdown);
    let observe = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let seen = reads.load(Ordering::SeqCst);
        trigger.cancel();
        seen
    };
    let (result, reads_while_stuck) = tokio::join!(run, observe);

    // 처리 중인 청크 1개 + 채널에 대기 중인 청크 1개
    assert_eq!(reads_while_stuck, 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    // 멈춘 발행 중에도 종료 신호는 처리됨
    assert_eq!(result.unwrap(), PipelineExit::Shutdown);
    drop(monitor);
}

/// 청크 중간의 연결 끊김은 남은 라인을 재시도하거나 버리지 않고 즉시 에러가 됨
#[tokio::test(start_paused = true)]
async fn connection_loss_mid_chunk_stops_immediately() {
    let (mut monitor, mut watch) = ConnectionMonitor::new("integration", ConnectionHandlers::new());
    monitor.connected();
    let session = DisconnectingSession {
        monitor: Arc::new(Mutex::new(monitor)),
        attempts: Arc::new(AtomicUsize::new(0)),
    };
    let attempts = Arc::clone(&session.attempts);
    let client = ForwarderClient::new(session, PublishSettings::default());
    let mut pipeline = ForwardPipelineBuilder::new(client)
        .config(forwarder_config(SplitMode::Buffered))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let result = pipeline
        .run(
            ChunkSource::new(vec![b"1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n"]),
            &mut watch,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ForwarderError::ConnectionLost(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.stats().dropped, 0);
    assert_eq!(pipeline.stats().published, 0);
    // 재시도 대기(100ms)를 기다리지 않음
    assert!(started.elapsed() < Duration::from_millis(100));
}
