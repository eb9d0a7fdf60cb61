//! 라인 분할 -- 원시 청크를 로그 라인으로 재조립
//!
//! 로그 소스의 읽기 경계는 라인 경계와 일치하지 않습니다. 한 청크에 여러 라인이
//! 들어 있거나, 한 라인이 두 청크에 걸쳐 있을 수 있습니다.
//!
//! # 분할 방식
//! - [`SplitMode::Buffered`]: 마지막 개행 이후의 잔여 바이트를 다음 청크까지 보관하고,
//!   완성된 라인만 내보냅니다. 잔여 바이트는 스트림 종료 시 [`LineSplitter::finish`]로 플러시됩니다.
//! - [`SplitMode::PerChunk`]: 청크마다 독립적으로 분할합니다. 청크 경계에 걸친 라인은
//!   두 개의 조각으로 발행됩니다.
//!
//! # 이스케이프 규칙
//! 두 방식 모두 개행 문자를 두 글자 시퀀스 `\n`으로 치환한 뒤 그 시퀀스로 분할하고,
//! 빈 조각은 버립니다. 따라서 원본 로그에 이미 들어 있는 리터럴 `\n` 텍스트도
//! 라인 경계로 취급됩니다. 이 모호성은 의도적으로 유지합니다.

use bytes::BytesMut;

use crate::config::SplitMode;

/// 개행 문자를 대체하는 두 글자 이스케이프 시퀀스
pub const ESCAPED_NEWLINE: &str = "\\n";

/// 청크 스트림을 로그 라인으로 분할합니다.
///
/// 라인 순서는 입력 바이트 순서와 동일하며, 빈 라인은 절대 내보내지 않습니다.
#[derive(Debug)]
pub struct LineSplitter {
    /// 분할 방식
    mode: SplitMode,
    /// 잔여 라인의 최대 길이 (바이트)
    max_line_bytes: usize,
    /// 아직 개행을 만나지 못한 잔여 바이트 (Buffered 전용)
    pending: BytesMut,
    /// 최대 길이를 넘어 강제로 플러시된 횟수
    truncated_count: u64,
}

impl LineSplitter {
    /// 새 라인 분할기를 생성합니다.
    pub fn new(mode: SplitMode, max_line_bytes: usize) -> Self {
        Self {
            mode,
            max_line_bytes: max_line_bytes.max(1),
            pending: BytesMut::new(),
            truncated_count: 0,
        }
    }

    /// 청크 하나를 처리하고 완성된 라인을 순서대로 반환합니다.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        match self.mode {
            SplitMode::PerChunk => split_escaped(&String::from_utf8_lossy(chunk)),
            SplitMode::Buffered => self.push_buffered(chunk),
        }
    }

    fn push_buffered(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        if let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') {
            let complete = self.pending.split_to(last_newline + 1);
            lines.extend(split_escaped(&String::from_utf8_lossy(&complete)));
        }

        while self.pending.len() > self.max_line_bytes {
            let cut = utf8_boundary(&self.pending, self.max_line_bytes);
            let head = self.pending.split_to(cut);
            self.truncated_count += 1;
            metrics::counter!(logbridge_core::metrics::LINES_TRUNCATED_TOTAL).increment(1);
            tracing::warn!(
                max_line_bytes = self.max_line_bytes,
                "line exceeds maximum length, flushing partial line"
            );
            lines.extend(split_escaped(&String::from_utf8_lossy(&head)));
        }

        lines
    }

    /// 스트림 종료 시 남은 잔여 라인을 플러시합니다.
    ///
    /// `PerChunk` 방식은 잔여 바이트를 보관하지 않으므로 항상 빈 Vec을 반환합니다.
    pub fn finish(&mut self) -> Vec<String> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let rest = self.pending.split();
        split_escaped(&String::from_utf8_lossy(&rest))
    }

    /// 보관 중인 잔여 바이트 수를 반환합니다.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 최대 길이 초과로 강제 플러시된 횟수를 반환합니다.
    pub fn truncated_count(&self) -> u64 {
        self.truncated_count
    }

    /// 분할 방식을 반환합니다.
    pub fn mode(&self) -> SplitMode {
        self.mode
    }
}

/// 개행을 이스케이프 시퀀스로 치환한 뒤 그 시퀀스로 분할하고 빈 조각을 버립니다.
pub fn split_escaped(text: &str) -> Vec<String> {
    text.replace('\n', ESCAPED_NEWLINE)
        .split(ESCAPED_NEWLINE)
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `limit` 이하에서 UTF-8 문자 경계가 되는 가장 큰 위치를 찾습니다.
fn utf8_boundary(buf: &[u8], limit: usize) -> usize {
    let mut cut = limit.min(buf.len());
    while cut > 0 && cut < buf.len() && (buf[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    if cut == 0 { limit.min(buf.len()) } else { cut }
}
