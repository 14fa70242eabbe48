//! 스냅샷 기반 월드 상태.
//!
//! `WorldStore`는 `Arc<WorldState>` 하나를 `RwLock`으로 감쌉니다.
//! 읽기 쪽은 락 안에서 포인터만 복제해 가져가고, 쓰기 쪽은 `Arc::make_mut`로
//! 변경합니다. 이미 배포된 스냅샷이 남아 있으면 make_mut가 사본을 만들기 때문에
//! 건네진 스냅샷은 이후 변경의 영향을 받지 않습니다.
//!
//! 모든 변경은 쓰기 락 안에서 끝나므로 읽기 쪽은 절반만 적용된 이벤트를
//! 볼 수 없습니다.

use crate::domain::{Atc, EntityPatch, FlightPlan, FlightPlanPatch, LiveEntity, Pilot};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 특정 시점의 전체 라이브 상태.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    entities: HashMap<String, Arc<LiveEntity>>,
    plans: HashMap<String, Arc<FlightPlan>>,
    version: u64,
    updated_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl WorldState {
    pub fn entity(&self, callsign: &str) -> Option<&LiveEntity> {
        self.entities.get(callsign).map(Arc::as_ref)
    }

    pub fn plan(&self, callsign: &str) -> Option<&FlightPlan> {
        self.plans.get(callsign).map(Arc::as_ref)
    }

    pub fn contains(&self, callsign: &str) -> bool {
        self.entities.contains_key(callsign)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// 변경이 적용될 때마다 1씩 증가합니다.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// 마지막 전체 동기화 시각. 한 번도 동기화되지 않았으면 `None`.
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// 현재 존재하는 모든 콜사인.
    pub fn callsigns(&self) -> HashSet<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = &LiveEntity> {
        self.entities.values().map(Arc::as_ref)
    }

    pub fn pilots(&self) -> impl Iterator<Item = &Pilot> {
        self.entities().filter_map(|e| match e {
            LiveEntity::Pilot(p) => Some(p),
            LiveEntity::Atc(_) => None,
        })
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Atc> {
        self.entities().filter_map(|e| match e {
            LiveEntity::Atc(a) => Some(a),
            LiveEntity::Pilot(_) => None,
        })
    }
}

/// 저장소 변경 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// 새 레코드 생성
    Created,
    /// 기존 레코드 변경
    Updated,
    /// 레코드 삭제
    Removed,
    /// 적용했지만 내용이 같음 (재전송 등)
    Unchanged,
    /// 적용 대상이 아님 (없는 엔티티 갱신, 관제사의 비행계획 등)
    Ignored,
}

impl StoreChange {
    /// 상태가 실제로 바뀌었는지 여부.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Removed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
            Self::Ignored => "ignored",
        }
    }
}

/// 프로세스 전역 월드 상태 저장소.
#[derive(Debug, Default)]
pub struct WorldStore {
    current: RwLock<Arc<WorldState>>,
}

/// 공유 저장소 타입.
pub type SharedWorldStore = Arc<WorldStore>;

/// 새 공유 저장소를 생성합니다.
pub fn create_world_store() -> SharedWorldStore {
    Arc::new(WorldStore::new())
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 불변 스냅샷을 반환합니다.
    pub async fn snapshot(&self) -> Arc<WorldState> {
        self.current.read().await.clone()
    }

    /// 전체 동기화를 한 번이라도 받았는지 여부.
    pub async fn is_synced(&self) -> bool {
        self.current.read().await.synced_at.is_some()
    }

    async fn mutate<F>(&self, f: F) -> StoreChange
    where
        F: FnOnce(&mut WorldState) -> StoreChange,
    {
        let mut guard = self.current.write().await;
        let state = Arc::make_mut(&mut guard);
        let change = f(state);
        if change.is_change() {
            state.version += 1;
            state.updated_at = Some(Utc::now());
        }
        change
    }

    /// 엔티티를 생성하거나 필드를 병합합니다.
    ///
    /// 같은 콜사인이 다른 종류로 다시 접속하면 기존 엔티티를 교체합니다.
    pub async fn upsert_entity(
        &self,
        callsign: &str,
        patch: EntityPatch,
        at: DateTime<Utc>,
    ) -> StoreChange {
        self.mutate(|state| match state.entities.get_mut(callsign) {
            Some(existing) if existing.kind() == patch.kind() => {
                merge_entity(existing, patch, at)
            }
            Some(existing) => {
                warn!(
                    callsign,
                    from = existing.kind().as_str(),
                    to = patch.kind().as_str(),
                    "Entity kind changed, replacing"
                );
                *existing = Arc::new(LiveEntity::from_patch(callsign, patch, at));
                if matches!(**existing, LiveEntity::Atc(_)) {
                    state.plans.remove(callsign);
                }
                StoreChange::Updated
            }
            None => {
                state.entities.insert(
                    callsign.to_string(),
                    Arc::new(LiveEntity::from_patch(callsign, patch, at)),
                );
                StoreChange::Created
            }
        })
        .await
    }

    /// 이미 존재하는 엔티티의 필드만 갱신합니다.
    ///
    /// 엔티티가 없거나 종류가 다르면 `Ignored`.
    pub async fn patch_entity(
        &self,
        callsign: &str,
        patch: EntityPatch,
        at: DateTime<Utc>,
    ) -> StoreChange {
        self.mutate(|state| match state.entities.get_mut(callsign) {
            Some(existing) if existing.kind() == patch.kind() => {
                merge_entity(existing, patch, at)
            }
            Some(_) => {
                debug!(callsign, "Patch kind does not match stored entity");
                StoreChange::Ignored
            }
            None => StoreChange::Ignored,
        })
        .await
    }

    /// 엔티티와 그 비행계획을 삭제합니다. 없는 키는 `Unchanged`.
    pub async fn remove_entity(&self, callsign: &str) -> StoreChange {
        self.mutate(|state| {
            let entity = state.entities.remove(callsign);
            let plan = state.plans.remove(callsign);
            if entity.is_some() || plan.is_some() {
                StoreChange::Removed
            } else {
                StoreChange::Unchanged
            }
        })
        .await
    }

    /// 비행계획을 생성하거나 병합합니다.
    ///
    /// 관제사 콜사인에 대한 계획은 무시합니다. 아직 모르는 콜사인의 계획은
    /// 받아 둡니다 (접속 이벤트가 뒤늦게 도착할 수 있음).
    pub async fn upsert_plan(
        &self,
        callsign: &str,
        patch: FlightPlanPatch,
        at: DateTime<Utc>,
    ) -> StoreChange {
        self.mutate(|state| {
            if let Some(LiveEntity::Atc(_)) = state.entities.get(callsign).map(Arc::as_ref) {
                debug!(callsign, "Ignoring flight plan for ATC callsign");
                return StoreChange::Ignored;
            }

            match state.plans.get_mut(callsign) {
                Some(existing) => {
                    let mut next = FlightPlan::clone(existing);
                    next.apply(patch, at);
                    if next == **existing {
                        StoreChange::Unchanged
                    } else {
                        *existing = Arc::new(next);
                        StoreChange::Updated
                    }
                }
                None => {
                    state.plans.insert(
                        callsign.to_string(),
                        Arc::new(FlightPlan::from_patch(callsign, patch, at)),
                    );
                    StoreChange::Created
                }
            }
        })
        .await
    }

    pub async fn remove_plan(&self, callsign: &str) -> StoreChange {
        self.mutate(|state| match state.plans.remove(callsign) {
            Some(_) => StoreChange::Removed,
            None => StoreChange::Unchanged,
        })
        .await
    }

    /// 전체 동기화 스냅샷으로 상태를 통째로 교체합니다.
    ///
    /// 교체 후 저장소는 동기화된 것으로 표시됩니다. 반환값은 교체된 엔티티 수입니다.
    pub async fn replace_all(
        &self,
        entities: Vec<LiveEntity>,
        plans: Vec<FlightPlan>,
        synced_at: DateTime<Utc>,
    ) -> usize {
        let entities: HashMap<_, _> = entities
            .into_iter()
            .map(|e| (e.callsign().to_string(), Arc::new(e)))
            .collect();
        let plans: HashMap<_, _> = plans
            .into_iter()
            .filter(|p| {
                !matches!(
                    entities.get(&p.callsign).map(Arc::as_ref),
                    Some(LiveEntity::Atc(_))
                )
            })
            .map(|p| (p.callsign.clone(), Arc::new(p)))
            .collect();
        let count = entities.len();

        let mut guard = self.current.write().await;
        let next = WorldState {
            entities,
            plans,
            version: guard.version + 1,
            updated_at: Some(Utc::now()),
            synced_at: Some(synced_at),
        };
        *guard = Arc::new(next);
        count
    }
}

fn merge_entity(existing: &mut Arc<LiveEntity>, patch: EntityPatch, at: DateTime<Utc>) -> StoreChange {
    let mut next = LiveEntity::clone(existing);
    next.apply(patch, at);
    if next == **existing {
        StoreChange::Unchanged
    } else {
        *existing = Arc::new(next);
        StoreChange::Updated
    }
}
