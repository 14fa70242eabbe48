//! REST API 라우트.
//!
//! - `/health` - 헬스 체크
//! - `/api/v1/live` - 월드 상태 조회

pub mod health;
pub mod live;

use axum::Router;
use std::sync::Arc;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use live::{live_router, LivePilot, LiveSnapshotResponse};

use crate::state::AppState;

/// 전체 API 라우터를 생성합니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/live", live_router())
}
