//! 수집 모듈 오류 타입.

use thiserror::Error;

/// 수집 관련 오류.
#[derive(Debug, Error)]
pub enum IngestError {
    /// 브로커 연결/명령 오류
    #[error("Broker error: {0}")]
    Broker(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 연결되지 않은 상태에서 호출
    #[error("Not connected: {0}")]
    NotConnected(String),
}

impl IngestError {
    /// 재연결로 복구할 수 있는 오류인지 확인합니다.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, IngestError::Broker(_) | IngestError::NotConnected(_))
    }
}

impl From<redis::RedisError> for IngestError {
    fn from(err: redis::RedisError) -> Self {
        IngestError::Broker(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
