//! 전체 동기화 리스너.
//!
//! 별도 pub/sub 채널로 공개 데이터 피드 형식의 전체 스냅샷이 들어옵니다.
//! 스냅샷을 받을 때마다 월드 상태를 통째로 교체하고 저장소를 동기화 상태로
//! 표시합니다. 재시작 직후의 복구 경로이기도 합니다.

use crate::error::{IngestError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures::StreamExt;
use metrics::{counter, gauge};
use radar_core::{Atc, Facility, FlightPlan, LiveEntity, Pilot, SharedWorldStore};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 전체 스냅샷.
#[derive(Debug, Deserialize)]
pub struct FeedSnapshot {
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pilots: Vec<FeedPilot>,
    #[serde(default)]
    pub controllers: Vec<FeedController>,
    #[serde(default)]
    pub atis: Vec<FeedController>,
}

#[derive(Debug, Deserialize)]
pub struct FeedPilot {
    pub cid: u64,
    pub callsign: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub pilot_rating: Option<i32>,
    #[serde(default)]
    pub military_rating: Option<i32>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub groundspeed: u32,
    pub heading: u16,
    #[serde(default)]
    pub transponder: Option<String>,
    #[serde(default)]
    pub qnh_mb: Option<i32>,
    #[serde(default)]
    pub flight_plan: Option<FeedFlightPlan>,
    pub logon_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FeedFlightPlan {
    #[serde(default)]
    pub flight_rules: Option<String>,
    #[serde(default)]
    pub aircraft: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub arrival: Option<String>,
    #[serde(default)]
    pub alternate: Option<String>,
    #[serde(default)]
    pub cruise_tas: Option<String>,
    #[serde(default)]
    pub altitude: Option<String>,
    /// 예정 출발 시각 ("HHMM", UTC)
    #[serde(default)]
    pub deptime: Option<String>,
    #[serde(default)]
    pub enroute_time: Option<String>,
    #[serde(default)]
    pub fuel_time: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub revision_id: Option<u32>,
    #[serde(default)]
    pub assigned_transponder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedController {
    pub cid: u64,
    pub callsign: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub facility: Option<i64>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub visual_range: Option<u32>,
    #[serde(default)]
    pub text_atis: Option<Vec<String>>,
    pub logon_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// "HHMM"을 주어진 날짜의 UTC 시각으로 해석합니다.
fn departure_time_on(date: NaiveDate, hhmm: &str) -> Option<DateTime<Utc>> {
    if hhmm.len() != 4 {
        return None;
    }
    let hour = hhmm.get(0..2)?.parse().ok()?;
    let minute = hhmm.get(2..4)?.parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(date.and_time(time).and_utc())
}

impl FeedSnapshot {
    /// 도메인 엔티티와 비행계획으로 변환합니다.
    pub fn into_world(self, received_at: DateTime<Utc>) -> (Vec<LiveEntity>, Vec<FlightPlan>) {
        let as_of = self.updated_at.unwrap_or(received_at);
        let mut entities = Vec::with_capacity(self.pilots.len() + self.controllers.len());
        let mut plans = Vec::new();

        for p in self.pilots {
            if let Some(fp) = p.flight_plan {
                plans.push(FlightPlan {
                    callsign: p.callsign.clone(),
                    revision: fp.revision_id.unwrap_or_default(),
                    flight_rules: fp.flight_rules,
                    aircraft: fp.aircraft,
                    departure: fp.departure,
                    arrival: fp.arrival,
                    alternate: fp.alternate,
                    cruise_tas: fp.cruise_tas,
                    altitude: fp.altitude,
                    route: fp.route,
                    remarks: fp.remarks,
                    filed_at: None,
                    estimated_departure_at: fp
                        .deptime
                        .as_deref()
                        .and_then(|t| departure_time_on(as_of.date_naive(), t)),
                    actual_departure_at: None,
                    enroute_time: fp.enroute_time,
                    fuel_time: fp.fuel_time,
                    assigned_transponder: fp.assigned_transponder,
                    last_updated: p.last_updated,
                });
            }
            entities.push(LiveEntity::Pilot(Pilot {
                callsign: p.callsign,
                cid: p.cid,
                name: p.name,
                server: p.server,
                pilot_rating: p.pilot_rating,
                military_rating: p.military_rating,
                protocol: None,
                latitude: p.latitude,
                longitude: p.longitude,
                altitude: p.altitude,
                heading: p.heading,
                groundspeed: p.groundspeed,
                transponder: p.transponder,
                qnh_mb: p.qnh_mb,
                logon_time: p.logon_time,
                last_updated: p.last_updated,
            }));
        }

        for c in self.controllers.into_iter().chain(self.atis) {
            let facility = c
                .facility
                .and_then(Facility::from_code)
                .unwrap_or_else(|| Facility::from_callsign(&c.callsign));
            entities.push(LiveEntity::Atc(Atc {
                callsign: c.callsign,
                cid: c.cid,
                name: c.name,
                server: c.server,
                rating: c.rating,
                frequency: c.frequency,
                facility,
                visual_range: c.visual_range,
                latitude: None,
                longitude: None,
                text_atis: c.text_atis,
                logon_time: c.logon_time,
                last_updated: c.last_updated,
            }));
        }

        (entities, plans)
    }
}

/// 전체 스냅샷 문서를 파싱해 저장소를 교체합니다. 교체된 엔티티 수를 반환합니다.
pub async fn apply_snapshot(store: &SharedWorldStore, payload: &str) -> Result<usize> {
    let snapshot: FeedSnapshot = serde_json::from_str(payload)?;
    let received_at = Utc::now();
    let synced_at = snapshot.updated_at.unwrap_or(received_at);
    let (entities, plans) = snapshot.into_world(received_at);
    let count = store.replace_all(entities, plans, synced_at).await;
    gauge!("world_entities").set(count as f64);
    Ok(count)
}

/// pub/sub 채널 리스너.
pub struct FullSyncListener {
    client: redis::Client,
    channel: String,
    store: SharedWorldStore,
    reconnect_interval: Duration,
}

impl FullSyncListener {
    pub fn new(
        redis_url: &str,
        channel: impl Into<String>,
        store: SharedWorldStore,
        reconnect_interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            channel: channel.into(),
            store,
            reconnect_interval,
        })
    }

    /// 종료 신호까지 구독을 유지합니다. 연결이 끊기면 재구독합니다.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            match self.listen(&shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        error = %e,
                        channel = %self.channel,
                        retry_in_secs = self.reconnect_interval.as_secs(),
                        "Full sync subscription lost"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }
        info!("전체 동기화 리스너 종료");
    }

    async fn listen(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "Subscribed to full sync channel");

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                message = messages.next() => {
                    let Some(message) = message else {
                        return Err(IngestError::Broker("pub/sub stream closed".to_string()));
                    };
                    let payload: String = message.get_payload()?;
                    match apply_snapshot(&self.store, &payload).await {
                        Ok(count) => {
                            counter!("full_sync_total", "outcome" => "applied").increment(1);
                            info!(entities = count, "Full sync applied");
                        }
                        Err(e) => {
                            counter!("full_sync_total", "outcome" => "malformed").increment(1);
                            warn!(error = %e, "Ignoring malformed full sync snapshot");
                        }
                    }
                }
            }
        }
    }
}
