//! 라이브 레이더 공통 에러 타입.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum RadarError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type RadarResult<T> = Result<T, RadarError>;

impl From<serde_json::Error> for RadarError {
    fn from(err: serde_json::Error) -> Self {
        RadarError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RadarError {
    fn from(err: config::ConfigError) -> Self {
        RadarError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let radar: RadarError = err.into();
        assert!(matches!(radar, RadarError::Serialization(_)));
    }
}
