//! 비행계획.
//!
//! 비행계획은 소유 파일럿의 콜사인을 키로 하며 다른 엔티티와 공유되지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 제출된 비행계획.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    /// 소유 파일럿 콜사인
    pub callsign: String,
    /// 수정 번호
    pub revision: u32,
    /// 비행 규칙 (I/V)
    pub flight_rules: Option<String>,
    pub aircraft: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub alternate: Option<String>,
    pub cruise_tas: Option<String>,
    pub altitude: Option<String>,
    pub route: Option<String>,
    pub remarks: Option<String>,
    pub filed_at: Option<DateTime<Utc>>,
    pub estimated_departure_at: Option<DateTime<Utc>>,
    pub actual_departure_at: Option<DateTime<Utc>>,
    /// 예상 비행 시간 ("HHMM")
    pub enroute_time: Option<String>,
    /// 연료 시간 ("HHMM")
    pub fuel_time: Option<String>,
    pub assigned_transponder: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// 비행계획 부분 갱신.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightPlanPatch {
    pub revision: Option<u32>,
    pub flight_rules: Option<String>,
    pub aircraft: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub alternate: Option<String>,
    pub cruise_tas: Option<String>,
    pub altitude: Option<String>,
    pub route: Option<String>,
    pub remarks: Option<String>,
    pub filed_at: Option<DateTime<Utc>>,
    pub estimated_departure_at: Option<DateTime<Utc>>,
    pub actual_departure_at: Option<DateTime<Utc>>,
    pub enroute_time: Option<String>,
    pub fuel_time: Option<String>,
    pub assigned_transponder: Option<String>,
}

impl FlightPlan {
    pub fn from_patch(
        callsign: impl Into<String>,
        patch: FlightPlanPatch,
        at: DateTime<Utc>,
    ) -> Self {
        let mut plan = Self {
            callsign: callsign.into(),
            revision: 0,
            flight_rules: None,
            aircraft: None,
            departure: None,
            arrival: None,
            alternate: None,
            cruise_tas: None,
            altitude: None,
            route: None,
            remarks: None,
            filed_at: None,
            estimated_departure_at: None,
            actual_departure_at: None,
            enroute_time: None,
            fuel_time: None,
            assigned_transponder: None,
            last_updated: at,
        };
        plan.apply(patch, at);
        plan
    }

    /// 값이 있는 필드만 덮어씁니다.
    pub fn apply(&mut self, patch: FlightPlanPatch, at: DateTime<Utc>) {
        if let Some(revision) = patch.revision {
            self.revision = revision;
        }
        let FlightPlanPatch {
            flight_rules,
            aircraft,
            departure,
            arrival,
            alternate,
            cruise_tas,
            altitude,
            route,
            remarks,
            filed_at,
            estimated_departure_at,
            actual_departure_at,
            enroute_time,
            fuel_time,
            assigned_transponder,
            ..
        } = patch;

        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut self.flight_rules, flight_rules);
        set(&mut self.aircraft, aircraft);
        set(&mut self.departure, departure);
        set(&mut self.arrival, arrival);
        set(&mut self.alternate, alternate);
        set(&mut self.cruise_tas, cruise_tas);
        set(&mut self.altitude, altitude);
        set(&mut self.route, route);
        set(&mut self.remarks, remarks);
        set(&mut self.filed_at, filed_at);
        set(&mut self.estimated_departure_at, estimated_departure_at);
        set(&mut self.actual_departure_at, actual_departure_at);
        set(&mut self.enroute_time, enroute_time);
        set(&mut self.fuel_time, fuel_time);
        set(&mut self.assigned_transponder, assigned_transponder);
        self.last_updated = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_amendment() {
        let now = Utc::now();
        let mut plan = FlightPlan::from_patch(
            "UAL100",
            FlightPlanPatch {
                revision: Some(1),
                departure: Some("KSFO".to_string()),
                arrival: Some("KJFK".to_string()),
                route: Some("SSTIK4 LOSHN DCT".to_string()),
                ..Default::default()
            },
            now,
        );

        plan.apply(
            FlightPlanPatch {
                revision: Some(2),
                route: Some("OFFSH9 DCT".to_string()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(plan.revision, 2);
        assert_eq!(plan.departure.as_deref(), Some("KSFO"));
        assert_eq!(plan.route.as_deref(), Some("OFFSH9 DCT"));
    }
}
