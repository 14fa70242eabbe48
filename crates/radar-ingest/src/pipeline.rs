//! 이벤트 적용 파이프라인.
//!
//! 디코딩 → 지연 검사 → 저장소 변경 → 변경 알림을 한 이벤트씩 순서대로 수행합니다.
//! 단일 컨슈머 태스크가 소유하므로 모든 변경은 도착 순서대로 직렬화됩니다.
//!
//! 변경 알림은 `try_send`로 보냅니다. 배포 쪽이 밀려 큐가 가득 차면 알림을
//! 버리고 경고를 남기며, 수집 경로는 막히지 않습니다.

use crate::decode::decode;
use crate::staleness::{Admission, StalenessGate};
use crate::stats::IngestStats;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use radar_core::{EntityPatch, LiveEvent, LiveEventKind, SharedWorldStore, StoreChange};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 이벤트 하나를 처리한 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 저장소에 반영됨 (변경 없음/무시 포함)
    Applied(StoreChange),
    /// 지연 초과로 버림
    Stale,
    /// 디코딩 실패로 버림
    Malformed,
}

/// 수집 파이프라인.
pub struct IngestPipeline {
    store: SharedWorldStore,
    gate: StalenessGate,
    changes: mpsc::Sender<String>,
    stats: IngestStats,
}

impl IngestPipeline {
    /// 변경된 콜사인은 `changes`로 통지됩니다.
    pub fn new(store: SharedWorldStore, gate: StalenessGate, changes: mpsc::Sender<String>) -> Self {
        Self {
            store,
            gate,
            changes,
            stats: IngestStats::new(),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn store(&self) -> &SharedWorldStore {
        &self.store
    }

    /// 원시 메시지를 현재 시각 기준으로 처리합니다.
    pub async fn apply_raw(&mut self, raw: &str) -> ApplyOutcome {
        self.apply_raw_at(raw, Utc::now()).await
    }

    pub async fn apply_raw_at(&mut self, raw: &str, now: DateTime<Utc>) -> ApplyOutcome {
        self.stats.received += 1;
        match decode(raw) {
            Ok(event) => self.apply(event, now).await,
            Err(e) => {
                warn!(error = %e, "Dropping malformed live event");
                self.record_malformed();
                ApplyOutcome::Malformed
            }
        }
    }

    /// 페이로드가 비어 있는 브로커 항목 등, 디코딩 전에 버린 메시지를 기록합니다.
    pub fn record_malformed(&mut self) {
        self.stats.malformed += 1;
        counter!("ingest_events_total", "kind" => "unknown", "outcome" => "malformed").increment(1);
    }

    /// 디코딩된 이벤트를 적용합니다.
    pub async fn apply(&mut self, event: LiveEvent, now: DateTime<Utc>) -> ApplyOutcome {
        let kind = event.message_kind();

        if let Admission::Stale(age) = self.gate.check(event.timestamp, now) {
            debug!(
                callsign = %event.callsign,
                kind = kind.as_str(),
                age_ms = age.num_milliseconds(),
                "Dropping stale live event"
            );
            self.stats.stale += 1;
            counter!("ingest_events_total", "kind" => kind.as_str(), "outcome" => "stale")
                .increment(1);
            return ApplyOutcome::Stale;
        }

        let LiveEvent {
            callsign,
            timestamp,
            kind: body,
        } = event;

        let change = match body {
            LiveEventKind::AddClient(patch) => {
                self.store.upsert_entity(&callsign, patch, timestamp).await
            }
            LiveEventKind::RemoveClient => self.store.remove_entity(&callsign).await,
            LiveEventKind::PilotUpdate(patch) => {
                self.store
                    .patch_entity(&callsign, EntityPatch::Pilot(patch), timestamp)
                    .await
            }
            LiveEventKind::AtcUpdate(patch) => {
                self.store
                    .patch_entity(&callsign, EntityPatch::Atc(patch), timestamp)
                    .await
            }
            LiveEventKind::PlanUpdate(patch) => {
                self.store.upsert_plan(&callsign, patch, timestamp).await
            }
            LiveEventKind::DeletePlan => self.store.remove_plan(&callsign).await,
        };

        self.stats.record_change(change);
        counter!("ingest_events_total", "kind" => kind.as_str(), "outcome" => change.as_str())
            .increment(1);

        if change.is_change() {
            if matches!(change, StoreChange::Created | StoreChange::Removed) {
                gauge!("world_entities").set(self.store.snapshot().await.len() as f64);
            }
            self.notify(callsign);
        } else if change == StoreChange::Ignored {
            debug!(callsign = %callsign, kind = kind.as_str(), "Live event had no target");
        }

        ApplyOutcome::Applied(change)
    }

    fn notify(&mut self, callsign: String) {
        match self.changes.try_send(callsign) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(callsign)) => {
                self.stats.notifications_dropped += 1;
                counter!("push_notifications_dropped_total").increment(1);
                warn!(callsign = %callsign, "Change queue full, push notification dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Change queue closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use radar_core::{create_world_store, LiveEntity};
    use std::time::Duration as StdDuration;

    fn pipeline(capacity: usize) -> (IngestPipeline, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let gate = StalenessGate::new(StdDuration::from_secs(10));
        (IngestPipeline::new(create_world_store(), gate, tx), rx)
    }

    fn add_pilot(callsign: &str, at: DateTime<Utc>) -> String {
        format!(
            r#"{{"type":"ADD_CLIENT","timestamp":"{}","data":{{"callsign":"{}","client_type":"pilot","cid":1}}}}"#,
            at.to_rfc3339(),
            callsign
        )
    }

    fn position(callsign: &str, at: DateTime<Utc>, altitude: i32) -> String {
        format!(
            r#"{{"type":"PD","timestamp":"{}","data":{{"callsign":"{}","altitude":{}}}}}"#,
            at.to_rfc3339(),
            callsign,
            altitude
        )
    }

    fn altitude_of(entity: Option<&LiveEntity>) -> Option<i32> {
        match entity {
            Some(LiveEntity::Pilot(p)) => Some(p.altitude),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_add_then_update_notifies() {
        let (mut pipeline, mut rx) = pipeline(8);
        let now = Utc::now();

        let outcome = pipeline.apply_raw_at(&add_pilot("UAL100", now), now).await;
        assert_eq!(outcome, ApplyOutcome::Applied(StoreChange::Created));
        let outcome = pipeline
            .apply_raw_at(&position("UAL100", now, 8000), now)
            .await;
        assert_eq!(outcome, ApplyOutcome::Applied(StoreChange::Updated));

        assert_eq!(rx.recv().await.as_deref(), Some("UAL100"));
        assert_eq!(rx.recv().await.as_deref(), Some("UAL100"));
        assert_eq!(
            altitude_of(pipeline.store().snapshot().await.entity("UAL100")),
            Some(8000)
        );
    }

    #[tokio::test]
    async fn test_stale_event_leaves_state_untouched() {
        let (mut pipeline, mut rx) = pipeline(8);
        let now = Utc::now();
        pipeline
            .apply_raw_at(&position("UAL100", now, 1000), now)
            .await;
        pipeline.apply_raw_at(&add_pilot("UAL100", now), now).await;
        pipeline
            .apply_raw_at(&position("UAL100", now, 5000), now)
            .await;
        let version = pipeline.store().snapshot().await.version();
        while rx.try_recv().is_ok() {}

        let old = now - Duration::seconds(20);
        let outcome = pipeline
            .apply_raw_at(&position("UAL100", old, 100), now)
            .await;

        assert_eq!(outcome, ApplyOutcome::Stale);
        let snapshot = pipeline.store().snapshot().await;
        assert_eq!(snapshot.version(), version);
        assert_eq!(altitude_of(snapshot.entity("UAL100")), Some(5000));
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.stats().stale, 1);
    }

    #[tokio::test]
    async fn test_update_for_unknown_entity_is_ignored() {
        let (mut pipeline, mut rx) = pipeline(8);
        let now = Utc::now();
        let outcome = pipeline
            .apply_raw_at(&position("GHOST1", now, 1000), now)
            .await;
        assert_eq!(outcome, ApplyOutcome::Applied(StoreChange::Ignored));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_is_counted() {
        let (mut pipeline, _rx) = pipeline(8);
        assert_eq!(pipeline.apply_raw("garbage").await, ApplyOutcome::Malformed);
        assert_eq!(pipeline.stats().malformed, 1);
        assert_eq!(pipeline.stats().received, 1);
    }

    #[tokio::test]
    async fn test_full_change_queue_does_not_block() {
        let (mut pipeline, _rx) = pipeline(1);
        let now = Utc::now();
        pipeline.apply_raw_at(&add_pilot("AAL1", now), now).await;
        pipeline.apply_raw_at(&add_pilot("AAL2", now), now).await;

        assert_eq!(pipeline.stats().applied, 2);
        assert_eq!(pipeline.stats().notifications_dropped, 1);
    }
}
