//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템에서 사용됩니다. 첫 전체 동기화 전까지는
//! 월드 상태가 불완전하므로 `/health/ready`가 503을 반환합니다.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// 월드 상태 (전체 동기화 여부)
    pub world_state: ComponentStatus,

    /// 푸시 채널
    pub push_channel: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down")
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }
}

/// 단순 헬스 체크. 프로세스가 살아 있으면 200.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크.
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;

    let (overall_status, status_code, world_status) = match snapshot.synced_at() {
        Some(synced_at) => (
            "healthy",
            StatusCode::OK,
            ComponentStatus::up_with_info(format!(
                "{} entities, version {}, synced at {}",
                snapshot.len(),
                snapshot.version(),
                synced_at.to_rfc3339()
            )),
        ),
        None => (
            "degraded",
            StatusCode::SERVICE_UNAVAILABLE,
            ComponentStatus::down("전체 동기화 대기 중"),
        ),
    };

    let push_status = ComponentStatus::up_with_info(format!(
        "{} connections, {} tracked callsigns",
        state.push.connection_count().await,
        state.push.registry().callsign_count().await
    ));

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            world_state: world_status,
            push_channel: push_status,
        },
    };

    (status_code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    async fn ready(state: Arc<AppState>) -> (StatusCode, HealthResponse) {
        let app = Router::new()
            .route("/health/ready", get(health_ready))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let app = Router::new().route("/health", get(health_check));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_before_sync() {
        let state = Arc::new(create_test_state());
        let (status, health) = ready(state).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.components.world_state.status, "down");
        assert_eq!(health.components.push_channel.status, "up");
    }

    #[tokio::test]
    async fn test_health_ready_after_sync() {
        let state = Arc::new(create_test_state());
        state.store.replace_all(Vec::new(), Vec::new(), Utc::now()).await;

        let (status, health) = ready(state).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "healthy");
    }
}
