//! 로그 소스 -- 외부 프로세스의 표준 출력을 원시 청크로 읽기
//!
//! [`ProcessSource`]는 `journalctl -u <unit> -f -n 0`처럼 계속 실행되는 외부 명령을
//! 실행하고, 표준 출력을 최대 `chunk_size` 바이트 단위로 읽어 채널로 전달합니다.
//!
//! # 종료 규칙
//! - EOF 또는 읽기 에러: 읽기를 멈추고 송신측을 드롭하여 소비자에게 스트림 종료를 알림
//! - 스트림 종료 후 프로세스가 0이 아닌 상태로 종료: [`ForwarderError::SourceExited`]
//! - 소비자가 먼저 종료: 자식 프로세스를 종료시키고 정상 반환
//!
//! 프로세스 외의 소스(테스트용 버퍼, 파이프 등)는 [`ReaderSource`]로 같은 읽기 루프를 사용합니다.

use std::future::Future;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use logbridge_core::metrics as m;

use crate::error::ForwarderError;

/// 청크 스트림을 생산하는 로그 소스
///
/// 파이프라인은 소스를 별도 태스크에서 실행하고, 송신측이 드롭되면
/// 스트림 종료로 간주합니다.
pub trait LogSource: Send + 'static {
    /// 소스 설명 (로그용)
    fn describe(&self) -> String;

    /// 스트림이 끝날 때까지 청크를 채널로 전송합니다.
    fn stream(
        self,
        tx: mpsc::Sender<Bytes>,
    ) -> impl Future<Output = Result<(), ForwarderError>> + Send + 'static;
}

/// 읽기 루프가 끝난 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// 스트림이 정상적으로 닫힘
    Eof,
    /// 읽기 에러로 중단됨
    ReadError,
    /// 소비자가 채널을 닫음
    ConsumerClosed,
}

/// 리더에서 최대 `chunk_size` 바이트씩 읽어 채널로 전송합니다.
///
/// 채널 슬롯을 먼저 확보한 뒤에 읽으므로, 용량 1 채널에서 소스는
/// 소비자가 처리 중인 청크보다 최대 한 청크만 앞서 읽습니다.
/// 읽기 에러는 반환하지 않고 스트림 종료로 처리합니다.
pub async fn pump_chunks<R>(
    reader: &mut R,
    chunk_size: usize,
    tx: &mpsc::Sender<Bytes>,
) -> StreamEnd
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let Ok(permit) = tx.reserve().await else {
            debug!("chunk receiver dropped, stopping reader");
            return StreamEnd::ConsumerClosed;
        };

        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("log source stream closed");
                return StreamEnd::Eof;
            }
            Ok(n) => {
                metrics::counter!(m::CHUNKS_RECEIVED_TOTAL).increment(1);
                metrics::counter!(m::BYTES_RECEIVED_TOTAL).increment(n as u64);
                permit.send(Bytes::copy_from_slice(&buf[..n]));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "read error from log source, closing stream");
                return StreamEnd::ReadError;
            }
        }
    }
}

/// 로그 소스로 실행할 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCommand {
    program: String,
    args: Vec<String>,
}

impl SourceCommand {
    /// 임의의 프로그램과 인자로 명령을 생성합니다.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `journalctl -u <unit> -f -n 0` 명령을 생성합니다.
    ///
    /// 과거 로그 없이 호출 시점 이후의 로그만 따라갑니다.
    pub fn journalctl(unit: &str) -> Result<Self, ForwarderError> {
        Self::journal_follow("journalctl", unit)
    }

    /// journalctl과 호환되는 인자를 받는 다른 프로그램으로 명령을 생성합니다.
    pub fn journal_follow(program: &str, unit: &str) -> Result<Self, ForwarderError> {
        if unit.trim().is_empty() {
            return Err(ForwarderError::Config {
                field: "source.unit".to_owned(),
                reason: "unit must not be empty".to_owned(),
            });
        }
        Ok(Self::new(program, ["-u", unit, "-f", "-n", "0"]))
    }

    /// 실행할 프로그램을 반환합니다.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// 프로그램 인자를 반환합니다.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// 외부 프로세스 기반 로그 소스
///
/// 데몬 수명 동안 자식 프로세스 하나를 소유합니다. 핸들이 드롭되면
/// 자식 프로세스도 함께 종료됩니다.
pub struct ProcessSource {
    command: SourceCommand,
    child: Child,
    stdout: ChildStdout,
    chunk_size: usize,
}

impl ProcessSource {
    /// 명령을 실행하고 표준 출력을 엽니다.
    ///
    /// # Errors
    /// - [`ForwarderError::Spawn`]: 프로세스를 실행할 수 없음
    /// - [`ForwarderError::StdoutUnavailable`]: 표준 출력 파이프를 얻을 수 없음
    pub fn spawn(command: SourceCommand, chunk_size: usize) -> Result<Self, ForwarderError> {
        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ForwarderError::Spawn {
                program: command.program().to_owned(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ForwarderError::StdoutUnavailable(command.program().to_owned()))?;

        info!(
            program = command.program(),
            args = ?command.args(),
            pid = child.id(),
            "log source started"
        );

        Ok(Self {
            command,
            child,
            stdout,
            chunk_size,
        })
    }

    /// 자식 프로세스 ID를 반환합니다 (이미 종료된 경우 None).
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

impl LogSource for ProcessSource {
    fn describe(&self) -> String {
        format!("{} {}", self.command.program(), self.command.args().join(" "))
    }

    async fn stream(self, tx: mpsc::Sender<Bytes>) -> Result<(), ForwarderError> {
        let Self {
            command,
            mut child,
            mut stdout,
            chunk_size,
        } = self;

        let end = pump_chunks(&mut stdout, chunk_size, &tx).await;
        // 자식 프로세스를 기다리기 전에 소비자에게 스트림 종료를 알림
        drop(tx);
        drop(stdout);

        if end == StreamEnd::ConsumerClosed {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "log source already exited");
            }
        }

        let status = child.wait().await?;
        if status.success() || end == StreamEnd::ConsumerClosed {
            info!(program = command.program(), %status, "log source exited");
            Ok(())
        } else {
            Err(ForwarderError::SourceExited {
                program: command.program().to_owned(),
                status: status.to_string(),
            })
        }
    }
}

/// 임의의 비동기 리더 기반 로그 소스
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    label: String,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// 새 리더 소스를 생성합니다.
    pub fn new(reader: R, chunk_size: usize, label: impl Into<String>) -> Self {
        Self {
            reader,
            chunk_size,
            label: label.into(),
        }
    }
}

impl<R> LogSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn stream(mut self, tx: mpsc::Sender<Bytes>) -> Result<(), ForwarderError> {
        let end = pump_chunks(&mut self.reader, self.chunk_size, &tx).await;
        debug!(source = %self.label, ?end, "reader source finished");
        Ok(())
    }
}
