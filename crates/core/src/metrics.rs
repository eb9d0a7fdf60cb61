//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 레코더가 설치되지 않은 경우 `metrics` 매크로 호출은 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logbridge_`
//! - 접미어: `_total` (counter), 없음 (gauge)

/// 로그 소스에서 읽은 청크 수 (counter)
pub const CHUNKS_RECEIVED_TOTAL: &str = "logbridge_chunks_received_total";

/// 로그 소스에서 읽은 바이트 수 (counter)
pub const BYTES_RECEIVED_TOTAL: &str = "logbridge_bytes_received_total";

/// 브로커에 발행된 라인 수 (counter)
pub const LINES_PUBLISHED_TOTAL: &str = "logbridge_lines_published_total";

/// 발행 시도 실패 수, 재시도 포함 (counter)
pub const PUBLISH_FAILURES_TOTAL: &str = "logbridge_publish_failures_total";

/// 재시도 후에도 발행되지 못하고 버려진 라인 수 (counter)
pub const LINES_DROPPED_TOTAL: &str = "logbridge_lines_dropped_total";

/// 최대 길이를 넘어 강제로 분할된 라인 수 (counter)
pub const LINES_TRUNCATED_TOTAL: &str = "logbridge_lines_truncated_total";

/// 브로커 연결 상태 (gauge, 1 = connected)
pub const BROKER_CONNECTED: &str = "logbridge_broker_connected";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        CHUNKS_RECEIVED_TOTAL,
        "Total number of raw chunks read from the log source"
    );
    describe_counter!(
        BYTES_RECEIVED_TOTAL,
        "Total number of bytes read from the log source"
    );
    describe_counter!(
        LINES_PUBLISHED_TOTAL,
        "Total number of log lines published to the broker"
    );
    describe_counter!(
        PUBLISH_FAILURES_TOTAL,
        "Total number of failed publish attempts, including retries"
    );
    describe_counter!(
        LINES_DROPPED_TOTAL,
        "Total number of log lines dropped after exhausting publish retries"
    );
    describe_counter!(
        LINES_TRUNCATED_TOTAL,
        "Total number of lines force-flushed for exceeding the maximum line length"
    );
    describe_gauge!(
        BROKER_CONNECTED,
        "Whether the broker connection is established (1) or not (0)"
    );
}
