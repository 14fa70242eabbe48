//! 정규화된 라이브 이벤트.

use super::{AtcPatch, EntityPatch, FlightPlanPatch, PilotPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 브로커 메시지 종류 판별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "ADD_CLIENT")]
    AddClient,
    #[serde(rename = "REMOVE_CLIENT")]
    RemoveClient,
    #[serde(rename = "AD")]
    AtcUpdate,
    #[serde(rename = "PD")]
    PilotUpdate,
    #[serde(rename = "PLAN")]
    PlanUpdate,
    #[serde(rename = "DELETE_PLAN")]
    DeletePlan,
}

impl MessageKind {
    /// 메트릭 레이블용 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AddClient => "add_client",
            MessageKind::RemoveClient => "remove_client",
            MessageKind::AtcUpdate => "atc_update",
            MessageKind::PilotUpdate => "pilot_update",
            MessageKind::PlanUpdate => "plan_update",
            MessageKind::DeletePlan => "delete_plan",
        }
    }
}

/// 종류별 이벤트 본문.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEventKind {
    AddClient(EntityPatch),
    RemoveClient,
    AtcUpdate(AtcPatch),
    PilotUpdate(PilotPatch),
    PlanUpdate(FlightPlanPatch),
    DeletePlan,
}

/// 디코딩이 끝난 라이브 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    /// 대상 엔티티 콜사인
    pub callsign: String,
    /// 업스트림이 기록한 이벤트 시각
    pub timestamp: DateTime<Utc>,
    pub kind: LiveEventKind,
}

impl LiveEvent {
    pub fn new(callsign: impl Into<String>, timestamp: DateTime<Utc>, kind: LiveEventKind) -> Self {
        Self {
            callsign: callsign.into(),
            timestamp,
            kind,
        }
    }

    pub fn message_kind(&self) -> MessageKind {
        match self.kind {
            LiveEventKind::AddClient(_) => MessageKind::AddClient,
            LiveEventKind::RemoveClient => MessageKind::RemoveClient,
            LiveEventKind::AtcUpdate(_) => MessageKind::AtcUpdate,
            LiveEventKind::PilotUpdate(_) => MessageKind::PilotUpdate,
            LiveEventKind::PlanUpdate(_) => MessageKind::PlanUpdate,
            LiveEventKind::DeletePlan => MessageKind::DeletePlan,
        }
    }
}
