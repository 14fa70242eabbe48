//! 콜사인별 구독 레지스트리.
//!
//! 콜사인 → (등록 순번 → 등록 정보) 맵과 연결 → (콜사인, 순번) 역인덱스를 함께
//! 유지합니다. 한 연결은 동시에 최대 하나의 콜사인에만 등록되고, 목록이 비면
//! 콜사인 항목도 제거됩니다. 모든 연산은 멱등이며 실패하지 않습니다.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 푸시 연결 식별자.
pub type ConnectionId = Uuid;

/// 한 연결의 등록 정보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub connection: ConnectionId,
    pub registered_at: DateTime<Utc>,
}

/// `register` 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 새로 등록
    Registered,
    /// 다른 콜사인에서 옮겨 옴
    Moved { from: String },
    /// 이미 같은 콜사인에 등록되어 있음
    AlreadyRegistered,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_callsign: HashMap<String, BTreeMap<u64, Registration>>,
    index: HashMap<ConnectionId, (String, u64)>,
    next_seq: u64,
}

impl RegistryInner {
    fn remove(&mut self, connection: ConnectionId) -> Option<String> {
        let (callsign, seq) = self.index.remove(&connection)?;
        if let Some(entries) = self.by_callsign.get_mut(&callsign) {
            entries.remove(&seq);
            if entries.is_empty() {
                self.by_callsign.remove(&callsign);
            }
        }
        Some(callsign)
    }
}

/// 구독 레지스트리.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 연결을 콜사인 아래에 등록합니다.
    ///
    /// 다른 콜사인에 등록되어 있으면 먼저 거기서 제거합니다.
    pub async fn register(&self, connection: ConnectionId, callsign: &str) -> RegisterOutcome {
        let mut inner = self.inner.write().await;

        let current = inner.index.get(&connection).map(|(c, _)| c.clone());
        let previous = match current {
            Some(current) if current == callsign => return RegisterOutcome::AlreadyRegistered,
            Some(_) => inner.remove(connection),
            None => None,
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .by_callsign
            .entry(callsign.to_string())
            .or_default()
            .insert(
                seq,
                Registration {
                    connection,
                    registered_at: Utc::now(),
                },
            );
        inner.index.insert(connection, (callsign.to_string(), seq));

        match previous {
            Some(from) => RegisterOutcome::Moved { from },
            None => RegisterOutcome::Registered,
        }
    }

    /// 등록을 해제합니다. 등록되어 있던 콜사인을 반환합니다.
    pub async fn deregister(&self, connection: ConnectionId) -> Option<String> {
        self.inner.write().await.remove(connection)
    }

    /// 콜사인에 등록된 연결 목록 (등록 순).
    pub async fn subscribers(&self, callsign: &str) -> Vec<ConnectionId> {
        self.registrations(callsign)
            .await
            .into_iter()
            .map(|r| r.connection)
            .collect()
    }

    pub async fn registrations(&self, callsign: &str) -> Vec<Registration> {
        self.inner
            .read()
            .await
            .by_callsign
            .get(callsign)
            .map(|entries| entries.values().copied().collect())
            .unwrap_or_default()
    }

    pub async fn has_subscribers(&self, callsign: &str) -> bool {
        self.inner.read().await.by_callsign.contains_key(callsign)
    }

    pub async fn callsign_of(&self, connection: ConnectionId) -> Option<String> {
        self.inner
            .read()
            .await
            .index
            .get(&connection)
            .map(|(callsign, _)| callsign.clone())
    }

    /// 등록이 하나라도 있는 콜사인 수.
    pub async fn callsign_count(&self) -> usize {
        self.inner.read().await.by_callsign.len()
    }

    /// `existing`에 없는 콜사인 항목을 제거합니다.
    ///
    /// 연관이 끊긴 연결 ID를 반환합니다. 연결 자체는 닫지 않습니다.
    pub async fn sweep(&self, existing: &HashSet<String>) -> Vec<ConnectionId> {
        let mut inner = self.inner.write().await;
        let stale: Vec<String> = inner
            .by_callsign
            .keys()
            .filter(|callsign| !existing.contains(*callsign))
            .cloned()
            .collect();

        let mut released = Vec::new();
        for callsign in stale {
            if let Some(entries) = inner.by_callsign.remove(&callsign) {
                for registration in entries.into_values() {
                    inner.index.remove(&registration.connection);
                    released.push(registration.connection);
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_deregister() {
        let registry = SubscriptionRegistry::new();
        let conn = Uuid::new_v4();

        assert_eq!(registry.register(conn, "UAL100").await, RegisterOutcome::Registered);
        assert_eq!(registry.subscribers("UAL100").await, vec![conn]);
        assert_eq!(registry.callsign_of(conn).await.as_deref(), Some("UAL100"));

        assert_eq!(registry.deregister(conn).await.as_deref(), Some("UAL100"));
        assert!(!registry.has_subscribers("UAL100").await);
        assert_eq!(registry.callsign_count().await, 0);
        assert_eq!(registry.deregister(conn).await, None);
    }

    #[tokio::test]
    async fn test_same_key_register_is_noop() {
        let registry = SubscriptionRegistry::new();
        let conn = Uuid::new_v4();
        registry.register(conn, "UAL100").await;
        let first = registry.registrations("UAL100").await;

        assert_eq!(
            registry.register(conn, "UAL100").await,
            RegisterOutcome::AlreadyRegistered
        );
        assert_eq!(registry.registrations("UAL100").await, first);
    }

    #[tokio::test]
    async fn test_rekeying_moves_subscription() {
        let registry = SubscriptionRegistry::new();
        let conn = Uuid::new_v4();

        registry.register(conn, "DAL123").await;
        let outcome = registry.register(conn, "DAL456").await;

        assert_eq!(
            outcome,
            RegisterOutcome::Moved {
                from: "DAL123".to_string()
            }
        );
        assert!(!registry.has_subscribers("DAL123").await);
        assert_eq!(registry.subscribers("DAL456").await, vec![conn]);
    }

    #[tokio::test]
    async fn test_rekeying_keeps_other_subscribers() {
        let registry = SubscriptionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.register(a, "DAL123").await;
        registry.register(b, "DAL123").await;
        registry.register(a, "DAL456").await;

        assert_eq!(registry.subscribers("DAL123").await, vec![b]);
        assert_eq!(registry.subscribers("DAL456").await, vec![a]);
    }

    #[tokio::test]
    async fn test_subscribers_are_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let conns: Vec<_> = (0..4).map(|_| Uuid::new_v4()).collect();
        for conn in &conns {
            registry.register(*conn, "BAW1").await;
        }
        assert_eq!(registry.subscribers("BAW1").await, conns);
    }

    #[tokio::test]
    async fn test_sweep_releases_missing_callsigns() {
        let registry = SubscriptionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        registry.register(a, "GONE1").await;
        registry.register(b, "GONE1").await;
        registry.register(c, "STAYS").await;

        let existing: HashSet<String> = ["STAYS".to_string()].into_iter().collect();
        let mut released = registry.sweep(&existing).await;
        released.sort();
        let mut expected = vec![a, b];
        expected.sort();

        assert_eq!(released, expected);
        assert!(!registry.has_subscribers("GONE1").await);
        assert_eq!(registry.callsign_of(a).await, None);
        assert_eq!(registry.subscribers("STAYS").await, vec![c]);
    }
}
