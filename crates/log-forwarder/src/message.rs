//! 와이어 페이로드 -- `{"message": "<line>"}` JSON 인코딩
//!
//! 라인 내용은 `serde_json`으로 직렬화되므로 따옴표, 백슬래시, 제어 문자가 모두
//! 올바르게 이스케이프됩니다.

use serde::{Deserialize, Serialize};

use crate::error::ForwarderError;

/// 브로커에 발행되는 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 로그 라인
    pub message: String,
}

impl Message {
    /// 라인을 메시지로 감쌉니다.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            message: line.into(),
        }
    }

    /// 라인을 JSON 페이로드로 인코딩합니다.
    pub fn encode(line: &str) -> Result<Vec<u8>, ForwarderError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            message: &'a str,
        }
        Ok(serde_json::to_vec(&Borrowed { message: line })?)
    }

    /// JSON 페이로드를 디코딩합니다.
    pub fn decode(payload: &[u8]) -> Result<Self, ForwarderError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
