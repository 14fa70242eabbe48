//! 월드 상태 조회 endpoint.
//!
//! - `GET /api/v1/live` - 전체 스냅샷 (파일럿은 비행계획 포함)
//! - `GET /api/v1/live/{callsign}` - 한 콜사인의 프로젝션 (푸시 프레임과 같은 형태)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use radar_core::{Atc, FlightPlan, Pilot, Projection};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 비행계획을 붙인 파일럿.
#[derive(Debug, Serialize)]
pub struct LivePilot {
    #[serde(flatten)]
    pub pilot: Pilot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_plan: Option<FlightPlan>,
}

/// 전체 스냅샷 응답.
#[derive(Debug, Serialize)]
pub struct LiveSnapshotResponse {
    /// 스냅샷 버전
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    /// 마지막 전체 동기화 시각
    pub synced_at: Option<DateTime<Utc>>,
    pub pilots: Vec<LivePilot>,
    pub controllers: Vec<Atc>,
}

/// 전체 스냅샷 조회.
pub async fn get_live_snapshot(State(state): State<Arc<AppState>>) -> Json<LiveSnapshotResponse> {
    let snapshot = state.store.snapshot().await;

    let mut pilots: Vec<LivePilot> = snapshot
        .pilots()
        .map(|pilot| LivePilot {
            pilot: pilot.clone(),
            flight_plan: snapshot.plan(&pilot.callsign).cloned(),
        })
        .collect();
    pilots.sort_by(|a, b| a.pilot.callsign.cmp(&b.pilot.callsign));

    let mut controllers: Vec<Atc> = snapshot.controllers().cloned().collect();
    controllers.sort_by(|a, b| a.callsign.cmp(&b.callsign));

    Json(LiveSnapshotResponse {
        version: snapshot.version(),
        updated_at: snapshot.updated_at(),
        synced_at: snapshot.synced_at(),
        pilots,
        controllers,
    })
}

/// 콜사인 프로젝션 조회.
pub async fn get_callsign(
    State(state): State<Arc<AppState>>,
    Path(callsign): Path<String>,
) -> Response {
    let snapshot = state.store.snapshot().await;
    match Projection::from_snapshot(&snapshot, &callsign) {
        Some(projection) => Json(projection).into_response(),
        None => ApiErrorResponse::not_found(&callsign).with_status(StatusCode::NOT_FOUND),
    }
}

pub fn live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_live_snapshot))
        .route("/{callsign}", get(get_callsign))
}
