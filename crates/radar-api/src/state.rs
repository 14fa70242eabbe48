//! 애플리케이션 공유 상태.

use chrono::{DateTime, Utc};
use radar_core::SharedWorldStore;

use crate::websocket::SharedPushManager;

/// 모든 HTTP 핸들러가 공유하는 상태.
#[derive(Clone)]
pub struct AppState {
    /// 월드 상태 저장소
    pub store: SharedWorldStore,
    /// 푸시 채널 관리자
    pub push: SharedPushManager,
    /// 서버 버전
    pub version: String,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: SharedWorldStore, push: SharedPushManager) -> Self {
        Self {
            store,
            push,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 빈 저장소와 기본 푸시 설정으로 만든 상태. 테스트용입니다.
pub fn create_test_state() -> AppState {
    let store = radar_core::create_world_store();
    let push = crate::websocket::create_push_manager(radar_core::PushConfig::default());
    AppState::new(store, push)
}
