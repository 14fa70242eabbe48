//! 컨슈머 루프 통합 테스트
//!
//! 채널 소스로 배치를 흘려 보내 적용, 확인(ack), 종료 동작을 확인합니다.

use chrono::{Duration, Utc};
use radar_core::{create_world_store, LiveEntity};
use async_trait::async_trait;
use radar_ingest::{
    BrokerSource, ChannelSource, Delivery, IngestConsumer, IngestPipeline, StalenessGate,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn event(kind: &str, callsign: &str, offset_secs: i64, data: &str) -> String {
    let ts = (Utc::now() + Duration::seconds(offset_secs)).to_rfc3339();
    format!(r#"{{"type":"{kind}","timestamp":"{ts}","data":{{"callsign":"{callsign}"{data}}}}}"#)
}

#[tokio::test]
async fn consumer_applies_and_acks_every_delivery() {
    let store = create_world_store();
    let (change_tx, mut change_rx) = mpsc::channel(64);
    let pipeline = IngestPipeline::new(
        store.clone(),
        StalenessGate::new(StdDuration::from_secs(10)),
        change_tx,
    );

    let (broker_tx, broker_rx) = mpsc::channel(64);
    let source = ChannelSource::new(broker_rx, 16);
    let acked = source.ack_counter();

    broker_tx
        .send(event("ADD_CLIENT", "UAL100", 0, r#","client_type":"pilot","cid":7"#))
        .await
        .unwrap();
    broker_tx
        .send(event("PD", "UAL100", 0, r#","altitude":9000"#))
        .await
        .unwrap();
    broker_tx
        .send(event("PD", "UAL100", -20, r#","altitude":100"#))
        .await
        .unwrap();
    broker_tx.send("not json".to_string()).await.unwrap();
    broker_tx
        .send(event("REMOVE_CLIENT", "NOBODY", 0, ""))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let consumer = IngestConsumer::new(source, pipeline, StdDuration::from_millis(10));
    let handle = tokio::spawn(consumer.run(shutdown.clone()));

    assert_eq!(change_rx.recv().await.as_deref(), Some("UAL100"));
    assert_eq!(change_rx.recv().await.as_deref(), Some("UAL100"));

    for _ in 0..100 {
        if acked.load(Ordering::SeqCst) == 5 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    assert_eq!(acked.load(Ordering::SeqCst), 5);

    shutdown.cancel();
    let stats = handle.await.unwrap();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.unchanged, 1);

    match store.snapshot().await.entity("UAL100") {
        Some(LiveEntity::Pilot(p)) => assert_eq!(p.altitude, 9000),
        other => panic!("unexpected entity: {other:?}"),
    }
}

/// 블로킹 읽기를 흉내 내는 소스. 읽기 하나에 7초가 걸립니다.
struct SlowSource {
    started: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    acked: Arc<AtomicU64>,
}

#[async_trait]
impl BrokerSource for SlowSource {
    async fn fetch(&mut self) -> radar_ingest::Result<Vec<Delivery>> {
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_secs(7)).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Delivery::new(n.to_string(), "not json")])
    }

    async fn ack(&mut self, ids: &[String]) -> radar_ingest::Result<()> {
        self.acked.fetch_add(ids.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn reconnect(&mut self) -> radar_ingest::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn long_fetch_is_never_abandoned_mid_flight() {
    let store = create_world_store();
    let (change_tx, _change_rx) = mpsc::channel(8);
    let pipeline = IngestPipeline::new(
        store,
        StalenessGate::new(StdDuration::from_secs(10)),
        change_tx,
    );

    let started = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicU64::new(0));
    let acked = Arc::new(AtomicU64::new(0));
    let source = SlowSource {
        started: started.clone(),
        completed: completed.clone(),
        acked: acked.clone(),
    };

    let shutdown = CancellationToken::new();
    let consumer = IngestConsumer::new(source, pipeline, StdDuration::from_millis(10));
    let handle = tokio::spawn(consumer.run(shutdown.clone()));

    // 요약 주기(60초)를 세 번 넘김
    tokio::time::sleep(StdDuration::from_secs(186)).await;
    shutdown.cancel();
    let stats = handle.await.unwrap();

    let started = started.load(Ordering::SeqCst);
    let completed = completed.load(Ordering::SeqCst);
    // 종료 시점에 진행 중이던 읽기 하나만 끝나지 않을 수 있음
    assert!(started - completed <= 1, "started={started} completed={completed}");
    assert!(completed >= 26);
    assert_eq!(acked.load(Ordering::SeqCst), completed);
    assert_eq!(stats.received, completed);
    assert_eq!(stats.malformed, completed);
}
