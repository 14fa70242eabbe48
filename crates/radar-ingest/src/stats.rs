//! 수집 통계.

use radar_core::StoreChange;
use serde::{Deserialize, Serialize};

/// 이벤트 처리 누적 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// 받은 메시지 수
    pub received: u64,
    /// 상태를 바꾼 이벤트 수
    pub applied: u64,
    /// 적용했지만 변경이 없던 이벤트 수 (재전송)
    pub unchanged: u64,
    /// 대상이 없어 무시된 이벤트 수
    pub ignored: u64,
    /// 지연 초과로 버린 이벤트 수
    pub stale: u64,
    /// 디코딩 실패 수
    pub malformed: u64,
    /// 변경 알림 큐가 가득 차 버린 알림 수
    pub notifications_dropped: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_change(&mut self, change: StoreChange) {
        match change {
            StoreChange::Created | StoreChange::Updated | StoreChange::Removed => self.applied += 1,
            StoreChange::Unchanged => self.unchanged += 1,
            StoreChange::Ignored => self.ignored += 1,
        }
    }

    /// 받은 메시지 중 상태를 바꾼 비율 (%)
    pub fn applied_rate(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            (self.applied as f64 / self.received as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            received = self.received,
            applied = self.applied,
            unchanged = self.unchanged,
            ignored = self.ignored,
            stale = self.stale,
            malformed = self.malformed,
            notifications_dropped = self.notifications_dropped,
            applied_rate = format!("{:.1}%", self.applied_rate()),
            "수집 통계"
        );
    }
}
