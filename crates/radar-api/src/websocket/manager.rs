//! 푸시 연결 생명주기 관리.
//!
//! 연결 상태: `Open → (Registered ⇄ Unregistered) → Closing → Closed`.
//! HTTP 업그레이드 단계(Connecting)는 axum이 처리하며, `accept` 시점에
//! `Open`이 됩니다. 정리(teardown)는 어떤 경로로 시작되든 연결당 한 번만
//! 실행됩니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use radar_core::{PushConfig, SharedWorldStore};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::compression::PendingFrame;
use super::messages::ControlMessage;
use super::subscriptions::{ConnectionId, RegisterOutcome, SubscriptionRegistry};
use crate::metrics::{record_push_frames, record_teardown, set_subscribed_callsigns};

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Registered,
    Unregistered,
    Closing,
    Closed,
}

/// 연결 종료 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// 클라이언트가 Close 프레임을 보냄
    ClientClosed,
    /// 전송 계층 읽기/쓰기 실패
    TransportError,
    /// 하트비트 누락 초과
    HeartbeatTimeout,
    /// 송신 큐 가득 참
    QueueFull,
    /// 프레임 전송 시간 초과
    SendTimeout,
    /// 서버 종료
    Shutdown,
}

impl TeardownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::QueueFull => "queue_full",
            Self::SendTimeout => "send_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// `accept`가 소켓 태스크에 넘겨주는 연결 핸들.
pub struct PushConnection {
    pub id: ConnectionId,
    /// 전송할 프레임 (변경 순서대로)
    pub frames: mpsc::Receiver<PendingFrame>,
    /// 관리자 측에서 연결을 닫을 때 취소됨
    pub closed: CancellationToken,
}

/// 팬아웃 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct ConnectionEntry {
    tx: mpsc::Sender<PendingFrame>,
    state: ConnectionState,
    missed_heartbeats: u32,
    closer: CancellationToken,
    accepted_at: DateTime<Utc>,
}

/// 푸시 채널 관리자.
pub struct PushChannelManager {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    registry: SubscriptionRegistry,
    config: PushConfig,
}

/// Arc로 감싼 관리자.
pub type SharedPushManager = Arc<PushChannelManager>;

/// 새 관리자를 생성합니다.
pub fn create_push_manager(config: PushConfig) -> SharedPushManager {
    Arc::new(PushChannelManager::new(config))
}

impl PushChannelManager {
    pub fn new(config: PushConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            registry: SubscriptionRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// 새 연결을 받아들입니다.
    pub async fn accept(&self) -> PushConnection {
        let id = Uuid::new_v4();
        let (tx, frames) = mpsc::channel(self.config.send_queue_capacity.max(1));
        let closed = CancellationToken::new();

        self.connections.write().await.insert(
            id,
            ConnectionEntry {
                tx,
                state: ConnectionState::Open,
                missed_heartbeats: 0,
                closer: closed.clone(),
                accepted_at: Utc::now(),
            },
        );
        debug!(connection = %id, "Push connection accepted");

        PushConnection { id, frames, closed }
    }

    /// 제어 메시지를 처리합니다.
    ///
    /// 연결이 이미 정리되었으면 `false`를 반환합니다.
    pub async fn handle_control(&self, id: ConnectionId, message: ControlMessage) -> bool {
        if !self.mark_alive(id).await {
            return false;
        }

        match message {
            ControlMessage::Alive => {}
            ControlMessage::Register { callsign } => {
                match self.registry.register(id, &callsign).await {
                    RegisterOutcome::Registered => {
                        info!(connection = %id, callsign = %callsign, "Push subscription registered");
                    }
                    RegisterOutcome::Moved { from } => {
                        info!(connection = %id, from = %from, to = %callsign, "Push subscription moved");
                    }
                    RegisterOutcome::AlreadyRegistered => {}
                }
                if !self.set_state(id, ConnectionState::Registered).await {
                    // 등록 중에 정리된 연결
                    self.registry.deregister(id).await;
                    return false;
                }
                set_subscribed_callsigns(self.registry.callsign_count().await);
            }
            ControlMessage::Unregister => {
                if let Some(callsign) = self.registry.deregister(id).await {
                    info!(connection = %id, callsign = %callsign, "Push subscription released");
                }
                self.set_state(id, ConnectionState::Unregistered).await;
                set_subscribed_callsigns(self.registry.callsign_count().await);
            }
        }
        true
    }

    /// 생존 신호를 기록합니다.
    pub async fn mark_alive(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(entry) if entry.state != ConnectionState::Closing => {
                entry.missed_heartbeats = 0;
                true
            }
            _ => false,
        }
    }

    async fn set_state(&self, id: ConnectionId, state: ConnectionState) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(entry) if entry.state != ConnectionState::Closing => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    /// 콜사인 구독자들에게 프레임을 큐잉합니다.
    ///
    /// 한 연결의 실패는 그 연결만 정리하며 다른 구독자에게 영향을 주지 않습니다.
    pub async fn fan_out(&self, callsign: &str, frame: PendingFrame) -> FanOutReport {
        let subscribers = self.registry.subscribers(callsign).await;
        let mut report = FanOutReport::default();
        if subscribers.is_empty() {
            return report;
        }

        let mut failed = Vec::new();
        {
            let connections = self.connections.read().await;
            for id in subscribers {
                let Some(entry) = connections.get(&id) else {
                    continue;
                };
                if entry.state == ConnectionState::Closing {
                    continue;
                }
                match entry.tx.try_send(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        failed.push((id, TeardownReason::QueueFull));
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        failed.push((id, TeardownReason::TransportError));
                    }
                }
            }
        }

        report.dropped = failed.len();
        for (id, reason) in failed {
            warn!(connection = %id, callsign = %callsign, reason = reason.as_str(), "Push delivery failed");
            self.teardown(id, reason).await;
        }

        record_push_frames("queued", report.delivered);
        record_push_frames("dropped", report.dropped);
        report
    }

    /// 연결을 정리합니다. 이미 정리된 연결이면 `false`를 반환합니다.
    pub async fn teardown(&self, id: ConnectionId, reason: TeardownReason) -> bool {
        let closer = {
            let mut connections = self.connections.write().await;
            match connections.get_mut(&id) {
                Some(entry) if entry.state != ConnectionState::Closing => {
                    entry.state = ConnectionState::Closing;
                    entry.closer.clone()
                }
                _ => return false,
            }
        };

        closer.cancel();
        let callsign = self.registry.deregister(id).await;
        let entry = self.connections.write().await.remove(&id);

        record_teardown(reason.as_str());
        set_subscribed_callsigns(self.registry.callsign_count().await);

        let lifetime = entry
            .map(|e| (Utc::now() - e.accepted_at).num_seconds())
            .unwrap_or_default();
        info!(
            connection = %id,
            callsign = callsign.as_deref().unwrap_or("-"),
            reason = reason.as_str(),
            lifetime_secs = lifetime,
            "Push connection closed"
        );
        true
    }

    /// 하트비트 틱: 모든 연결의 누락 카운터를 올리고 한도를 넘은 연결을 정리합니다.
    ///
    /// 정리된 연결 수를 반환합니다.
    pub async fn liveness_tick(&self) -> usize {
        let max_missed = self.config.max_missed_heartbeats;
        let expired: Vec<ConnectionId> = {
            let mut connections = self.connections.write().await;
            connections
                .iter_mut()
                .filter(|(_, entry)| entry.state != ConnectionState::Closing)
                .filter_map(|(id, entry)| {
                    entry.missed_heartbeats += 1;
                    (entry.missed_heartbeats > max_missed).then_some(*id)
                })
                .collect()
        };

        let mut closed = 0;
        for id in expired {
            if self.teardown(id, TeardownReason::HeartbeatTimeout).await {
                closed += 1;
            }
        }
        closed
    }

    /// 월드 상태에 없는 콜사인의 등록을 정리합니다.
    ///
    /// 연결은 열린 채로 `Unregistered` 상태가 됩니다.
    pub async fn sweep_registry(&self, existing: &HashSet<String>) -> usize {
        let released = self.registry.sweep(existing).await;
        if released.is_empty() {
            return 0;
        }

        self.mark_released(&released).await;
        set_subscribed_callsigns(self.registry.callsign_count().await);
        debug!(released = released.len(), "Registry sweep released subscriptions");
        released.len()
    }

    /// 스윕으로 등록이 풀린 연결을 `Unregistered`로 바꿉니다.
    ///
    /// 스윕 이후 이미 다시 등록한 연결은 건드리지 않습니다. 연결 테이블 락을 잡은
    /// 채로 레지스트리를 확인하므로, 확인 뒤의 재등록은 이 갱신 다음에 반영됩니다.
    async fn mark_released(&self, released: &[ConnectionId]) {
        let mut connections = self.connections.write().await;
        for id in released {
            let Some(entry) = connections.get_mut(id) else {
                continue;
            };
            if entry.state != ConnectionState::Registered {
                continue;
            }
            if self.registry.callsign_of(*id).await.is_none() {
                entry.state = ConnectionState::Unregistered;
            }
        }
    }

    /// 모든 연결을 닫습니다.
    pub async fn close_all(&self, reason: TeardownReason) {
        let ids: Vec<ConnectionId> = self.connections.read().await.keys().copied().collect();
        for id in ids {
            self.teardown(id, reason).await;
        }
    }

    /// 하트비트와 레지스트리 정리 주기를 실행합니다.
    pub async fn run_maintenance(
        self: Arc<Self>,
        store: SharedWorldStore,
        shutdown: CancellationToken,
    ) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        let mut sweep = tokio::time::interval(self.config.registry_sweep_interval());
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 첫 틱은 즉시 완료됨
        heartbeat.tick().await;
        sweep.tick().await;

        info!(
            heartbeat_secs = self.config.heartbeat_interval_secs,
            sweep_secs = self.config.registry_sweep_interval_secs,
            "Push maintenance started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = heartbeat.tick() => {
                    let closed = self.liveness_tick().await;
                    if closed > 0 {
                        info!(closed, "Closed unresponsive push connections");
                    }
                }
                _ = sweep.tick() => {
                    let existing = store.snapshot().await.callsigns();
                    self.sweep_registry(&existing).await;
                }
            }
        }

        self.close_all(TeardownReason::Shutdown).await;
        info!("Push maintenance stopped");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// 연결 상태. 정리된 연결은 `Closed`입니다.
    pub async fn state_of(&self, id: ConnectionId) -> ConnectionState {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|entry| entry.state)
            .unwrap_or(ConnectionState::Closed)
    }

    pub async fn callsign_of(&self, id: ConnectionId) -> Option<String> {
        self.registry.callsign_of(id).await
    }

    pub async fn has_subscribers(&self, callsign: &str) -> bool {
        self.registry.has_subscribers(callsign).await
    }
}
