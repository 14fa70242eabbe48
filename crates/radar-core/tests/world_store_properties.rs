//! 월드 상태 저장소 속성 테스트
//!
//! 같은 이벤트를 한 번 적용하든 두 번 적용하든 결과 상태가 같아야 합니다.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use radar_core::{EntityPatch, FlightPlanPatch, PilotPatch, WorldState, WorldStore};

const CALLSIGNS: [&str; 3] = ["UAL100", "DAL456", "BAW12"];

#[derive(Debug, Clone)]
enum Op {
    Upsert { idx: usize, lat: f64, lon: f64, alt: i32 },
    Plan { idx: usize, revision: u32 },
    Remove { idx: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..CALLSIGNS.len(), -90.0f64..90.0, -180.0f64..180.0, 0i32..45000)
            .prop_map(|(idx, lat, lon, alt)| Op::Upsert { idx, lat, lon, alt }),
        2 => (0..CALLSIGNS.len(), 0u32..5).prop_map(|(idx, revision)| Op::Plan { idx, revision }),
        1 => (0..CALLSIGNS.len()).prop_map(|idx| Op::Remove { idx }),
    ]
}

async fn apply(store: &WorldStore, op: &Op, step: i64) {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(step);
    match op {
        Op::Upsert { idx, lat, lon, alt } => {
            let patch = EntityPatch::Pilot(PilotPatch {
                cid: Some(800000 + *idx as u64),
                latitude: Some(*lat),
                longitude: Some(*lon),
                altitude: Some(*alt),
                ..Default::default()
            });
            store.upsert_entity(CALLSIGNS[*idx], patch, at).await;
        }
        Op::Plan { idx, revision } => {
            let patch = FlightPlanPatch {
                revision: Some(*revision),
                route: Some(format!("DCT REV{revision}")),
                ..Default::default()
            };
            store.upsert_plan(CALLSIGNS[*idx], patch, at).await;
        }
        Op::Remove { idx } => {
            store.remove_entity(CALLSIGNS[*idx]).await;
        }
    }
}

fn assert_same(a: &WorldState, b: &WorldState) {
    assert_eq!(a.version(), b.version());
    for callsign in CALLSIGNS {
        assert_eq!(a.entity(callsign), b.entity(callsign));
        assert_eq!(a.plan(callsign), b.plan(callsign));
    }
}

proptest! {
    #[test]
    fn applying_each_event_twice_matches_applying_once(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let once = WorldStore::new();
            let twice = WorldStore::new();

            for (step, op) in ops.iter().enumerate() {
                apply(&once, op, step as i64).await;
                apply(&twice, op, step as i64).await;
                apply(&twice, op, step as i64).await;
            }

            assert_same(&*once.snapshot().await, &*twice.snapshot().await);
        });
    }
}
