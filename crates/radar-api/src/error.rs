//! API 에러 응답 타입.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// API 에러 응답.
///
/// ```json
/// {"code": "NOT_FOUND", "message": "콜사인을 찾을 수 없습니다: UAL100", "timestamp": 1772366400}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "NOT_FOUND", "NOT_READY")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new("NOT_FOUND", format!("콜사인을 찾을 수 없습니다: {}", what))
    }

    /// 상태 코드와 함께 응답으로 변환합니다.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
