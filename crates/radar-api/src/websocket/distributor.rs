//! 변경 알림을 구독자 푸시로 변환합니다.
//!
//! 수집 파이프라인이 변경된 콜사인을 채널로 보내면, 구독자가 있는 경우에만
//! 최신 스냅샷에서 프로젝션을 만들고 한 번 압축해 모든 구독자 큐에 넣습니다.

use radar_core::{Projection, SharedWorldStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::compression::Compressor;
use super::manager::SharedPushManager;

/// 한 번의 배포 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributeOutcome {
    /// 구독자 없음
    NoSubscribers,
    /// 엔티티가 제거되어 보낼 프로젝션이 없음
    EntityGone,
    /// 큐잉된 구독자 수
    Pushed { recipients: usize },
    /// 직렬화 실패
    Failed,
}

/// 푸시 배포기.
pub struct PushDistributor {
    store: SharedWorldStore,
    manager: SharedPushManager,
    compressor: Compressor,
}

impl PushDistributor {
    pub fn new(store: SharedWorldStore, manager: SharedPushManager) -> Self {
        let compressor = Compressor::new(manager.config().compression_level);
        Self {
            store,
            manager,
            compressor,
        }
    }

    /// 한 콜사인의 현재 프로젝션을 구독자에게 보냅니다.
    pub async fn distribute(&self, callsign: &str) -> DistributeOutcome {
        if !self.manager.has_subscribers(callsign).await {
            return DistributeOutcome::NoSubscribers;
        }

        let snapshot = self.store.snapshot().await;
        let Some(projection) = Projection::from_snapshot(&snapshot, callsign) else {
            return DistributeOutcome::EntityGone;
        };

        let json = match projection.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(callsign = %callsign, error = %e, "Projection serialization failed");
                return DistributeOutcome::Failed;
            }
        };

        let frame = self.compressor.compress_shared(json);
        let report = self.manager.fan_out(callsign, frame).await;
        debug!(
            callsign = %callsign,
            version = projection.version,
            delivered = report.delivered,
            dropped = report.dropped,
            "Projection pushed"
        );
        DistributeOutcome::Pushed {
            recipients: report.delivered,
        }
    }

    /// 변경 알림 채널을 소비합니다.
    pub async fn run(self, mut changes: mpsc::Receiver<String>, shutdown: CancellationToken) {
        info!("Push distributor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = changes.recv() => match next {
                    Some(callsign) => {
                        self.distribute(&callsign).await;
                    }
                    None => {
                        info!("Change channel closed");
                        break;
                    }
                },
            }
        }
        info!("Push distributor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::compression::decompress;
    use crate::websocket::manager::create_push_manager;
    use crate::websocket::messages::ControlMessage;
    use chrono::Utc;
    use radar_core::{create_world_store, EntityPatch, PilotPatch, PushConfig};

    fn pilot(altitude: i32) -> EntityPatch {
        EntityPatch::Pilot(PilotPatch {
            cid: Some(1_234_567),
            altitude: Some(altitude),
            ..PilotPatch::default()
        })
    }

    #[tokio::test]
    async fn test_distribute_without_subscribers() {
        let store = create_world_store();
        let manager = create_push_manager(PushConfig::default());
        store.upsert_entity("UAL100", pilot(5000), Utc::now()).await;

        let distributor = PushDistributor::new(store, manager);
        assert_eq!(
            distributor.distribute("UAL100").await,
            DistributeOutcome::NoSubscribers
        );
    }

    #[tokio::test]
    async fn test_distribute_pushes_projection() {
        let store = create_world_store();
        let manager = create_push_manager(PushConfig::default());
        store.upsert_entity("UAL100", pilot(5000), Utc::now()).await;

        let mut conn = manager.accept().await;
        manager
            .handle_control(
                conn.id,
                ControlMessage::Register {
                    callsign: "UAL100".to_string(),
                },
            )
            .await;

        let distributor = PushDistributor::new(store.clone(), manager.clone());
        assert_eq!(
            distributor.distribute("UAL100").await,
            DistributeOutcome::Pushed { recipients: 1 }
        );

        let frame = conn.frames.recv().await.unwrap().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&decompress(&frame).unwrap()).unwrap();
        assert_eq!(json["callsign"], "UAL100");
        assert_eq!(json["entity"]["altitude"], 5000);

        store.remove_entity("UAL100").await;
        assert_eq!(
            distributor.distribute("UAL100").await,
            DistributeOutcome::EntityGone
        );
    }
}
