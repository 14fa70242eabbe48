//! 푸시/조회용 프로젝션.

use super::{FlightPlan, LiveEntity};
use crate::store::WorldState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 한 콜사인의 엔티티와 비행계획을 묶은 읽기 전용 뷰.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub callsign: String,
    pub entity: LiveEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_plan: Option<FlightPlan>,
    /// 프로젝션을 만든 스냅샷 버전
    pub version: u64,
    pub generated_at: DateTime<Utc>,
}

impl Projection {
    /// 스냅샷에서 프로젝션을 만듭니다. 엔티티가 없으면 `None`.
    pub fn from_snapshot(state: &WorldState, callsign: &str) -> Option<Self> {
        let entity = state.entity(callsign)?;
        Some(Self {
            callsign: callsign.to_string(),
            entity: entity.clone(),
            flight_plan: state.plan(callsign).cloned(),
            version: state.version(),
            generated_at: Utc::now(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
