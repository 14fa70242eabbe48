//! 파일럿/관제사 라이브 엔티티.
//!
//! - `LiveEntity` - 콜사인으로 식별되는 접속 중인 클라이언트
//! - `PilotPatch`, `AtcPatch` - 부분 갱신 필드 집합
//!
//! 콜사인은 엔티티가 존재하는 동안 변하지 않는 키입니다. 패치에는
//! 콜사인 필드가 없으므로 갱신 경로로는 키를 바꿀 수 없습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 엔티티 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Pilot,
    Atc,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Pilot => "pilot",
            EntityKind::Atc => "atc",
        }
    }
}

/// 관제 시설 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Facility {
    #[default]
    Obs,
    Fss,
    Del,
    Gnd,
    Twr,
    App,
    Ctr,
}

impl Facility {
    /// 업스트림 숫자 코드(0-6)를 변환합니다.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Obs),
            1 => Some(Self::Fss),
            2 => Some(Self::Del),
            3 => Some(Self::Gnd),
            4 => Some(Self::Twr),
            5 => Some(Self::App),
            6 => Some(Self::Ctr),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Obs => 0,
            Self::Fss => 1,
            Self::Del => 2,
            Self::Gnd => 3,
            Self::Twr => 4,
            Self::App => 5,
            Self::Ctr => 6,
        }
    }

    /// 콜사인 접미사로 시설을 추정합니다.
    pub fn from_callsign(callsign: &str) -> Self {
        let suffix = callsign
            .rsplit('_')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match suffix.as_str() {
            "DEL" => Self::Del,
            "GND" => Self::Gnd,
            "TWR" | "ATIS" => Self::Twr,
            "APP" | "DEP" => Self::App,
            "CTR" => Self::Ctr,
            "FSS" => Self::Fss,
            _ => Self::Obs,
        }
    }
}

/// 접속 중인 파일럿.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pilot {
    pub callsign: String,
    /// 네트워크 회원 ID
    pub cid: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub pilot_rating: Option<i32>,
    #[serde(default)]
    pub military_rating: Option<i32>,
    #[serde(default)]
    pub protocol: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// 고도 (ft)
    pub altitude: i32,
    /// 진행 방향 (도)
    pub heading: u16,
    /// 지상 속도 (kt)
    pub groundspeed: u32,
    #[serde(default)]
    pub transponder: Option<String>,
    #[serde(default)]
    pub qnh_mb: Option<i32>,
    pub logon_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// 파일럿 부분 갱신.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotPatch {
    pub cid: Option<u64>,
    pub name: Option<String>,
    pub server: Option<String>,
    pub pilot_rating: Option<i32>,
    pub military_rating: Option<i32>,
    pub protocol: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i32>,
    pub heading: Option<u16>,
    pub groundspeed: Option<u32>,
    pub transponder: Option<String>,
    pub qnh_mb: Option<i32>,
}

macro_rules! merge {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $( if let Some(v) = $patch.$field { $target.$field = v; } )+
    };
}

macro_rules! merge_opt {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $( if $patch.$field.is_some() { $target.$field = $patch.$field; } )+
    };
}

impl Pilot {
    /// 패치로부터 새 파일럿을 만듭니다. 빠진 필드는 0/None입니다.
    pub fn from_patch(callsign: impl Into<String>, patch: PilotPatch, at: DateTime<Utc>) -> Self {
        let mut pilot = Self {
            callsign: callsign.into(),
            cid: 0,
            name: None,
            server: None,
            pilot_rating: None,
            military_rating: None,
            protocol: None,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0,
            heading: 0,
            groundspeed: 0,
            transponder: None,
            qnh_mb: None,
            logon_time: at,
            last_updated: at,
        };
        pilot.apply(patch, at);
        pilot
    }

    /// 패치의 값이 있는 필드만 덮어씁니다.
    pub fn apply(&mut self, patch: PilotPatch, at: DateTime<Utc>) {
        merge!(self, patch; cid, latitude, longitude, altitude, heading, groundspeed);
        merge_opt!(self, patch; name, server, pilot_rating, military_rating, protocol, transponder, qnh_mb);
        self.last_updated = at;
    }
}

/// 접속 중인 관제사 (ATIS 포함).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atc {
    pub callsign: String,
    pub cid: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    /// 주파수 ("118.300")
    #[serde(default)]
    pub frequency: Option<String>,
    pub facility: Facility,
    /// 가시 범위 (nm)
    #[serde(default)]
    pub visual_range: Option<u32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub text_atis: Option<Vec<String>>,
    pub logon_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// 관제사 부분 갱신.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtcPatch {
    pub cid: Option<u64>,
    pub name: Option<String>,
    pub server: Option<String>,
    pub rating: Option<i32>,
    pub frequency: Option<String>,
    pub facility: Option<Facility>,
    pub visual_range: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_atis: Option<Vec<String>>,
}

impl Atc {
    /// 패치로부터 새 관제사를 만듭니다. 시설이 없으면 콜사인에서 추정합니다.
    pub fn from_patch(callsign: impl Into<String>, patch: AtcPatch, at: DateTime<Utc>) -> Self {
        let callsign = callsign.into();
        let mut atc = Self {
            facility: Facility::from_callsign(&callsign),
            callsign,
            cid: 0,
            name: None,
            server: None,
            rating: None,
            frequency: None,
            visual_range: None,
            latitude: None,
            longitude: None,
            text_atis: None,
            logon_time: at,
            last_updated: at,
        };
        atc.apply(patch, at);
        atc
    }

    pub fn apply(&mut self, patch: AtcPatch, at: DateTime<Utc>) {
        merge!(self, patch; cid, facility);
        merge_opt!(
            self, patch;
            name, server, rating, frequency, visual_range, latitude, longitude, text_atis
        );
        self.last_updated = at;
    }
}

/// 월드 상태에 저장되는 라이브 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveEntity {
    Pilot(Pilot),
    Atc(Atc),
}

impl LiveEntity {
    pub fn callsign(&self) -> &str {
        match self {
            LiveEntity::Pilot(p) => &p.callsign,
            LiveEntity::Atc(a) => &a.callsign,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            LiveEntity::Pilot(_) => EntityKind::Pilot,
            LiveEntity::Atc(_) => EntityKind::Atc,
        }
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        match self {
            LiveEntity::Pilot(p) => p.last_updated,
            LiveEntity::Atc(a) => a.last_updated,
        }
    }

    /// 패치로부터 새 엔티티를 만듭니다.
    pub fn from_patch(callsign: impl Into<String>, patch: EntityPatch, at: DateTime<Utc>) -> Self {
        match patch {
            EntityPatch::Pilot(p) => LiveEntity::Pilot(Pilot::from_patch(callsign, p, at)),
            EntityPatch::Atc(a) => LiveEntity::Atc(Atc::from_patch(callsign, a, at)),
        }
    }

    /// 같은 종류의 패치를 병합합니다.
    ///
    /// 종류가 다르면 아무것도 바꾸지 않고 `false`를 반환합니다.
    pub fn apply(&mut self, patch: EntityPatch, at: DateTime<Utc>) -> bool {
        match (self, patch) {
            (LiveEntity::Pilot(pilot), EntityPatch::Pilot(p)) => {
                pilot.apply(p, at);
                true
            }
            (LiveEntity::Atc(atc), EntityPatch::Atc(a)) => {
                atc.apply(a, at);
                true
            }
            _ => false,
        }
    }
}

/// 종류별 부분 갱신.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPatch {
    Pilot(PilotPatch),
    Atc(AtcPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::Pilot(_) => EntityKind::Pilot,
            EntityPatch::Atc(_) => EntityKind::Atc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_from_callsign() {
        assert_eq!(Facility::from_callsign("KJFK_TWR"), Facility::Twr);
        assert_eq!(Facility::from_callsign("KJFK_ATIS"), Facility::Twr);
        assert_eq!(Facility::from_callsign("NY_CTR"), Facility::Ctr);
        assert_eq!(Facility::from_callsign("N90_DEP"), Facility::App);
        assert_eq!(Facility::from_callsign("KBOS_1_GND"), Facility::Gnd);
        assert_eq!(Facility::from_callsign("JOHN_OBS"), Facility::Obs);
        assert_eq!(Facility::from_callsign("OBSERVER"), Facility::Obs);
    }

    #[test]
    fn test_facility_codes() {
        for code in 0..=6 {
            let facility = Facility::from_code(code).unwrap();
            assert_eq!(facility.code() as i64, code);
        }
        assert!(Facility::from_code(7).is_none());
    }

    #[test]
    fn test_pilot_patch_merges_present_fields_only() {
        let t0 = Utc::now();
        let mut pilot = Pilot::from_patch(
            "UAL100",
            PilotPatch {
                cid: Some(1234567),
                name: Some("Jane".to_string()),
                latitude: Some(40.6),
                longitude: Some(-73.7),
                altitude: Some(12000),
                transponder: Some("2200".to_string()),
                ..Default::default()
            },
            t0,
        );

        let t1 = t0 + chrono::Duration::seconds(5);
        pilot.apply(
            PilotPatch {
                altitude: Some(14000),
                groundspeed: Some(280),
                ..Default::default()
            },
            t1,
        );

        assert_eq!(pilot.callsign, "UAL100");
        assert_eq!(pilot.cid, 1234567);
        assert_eq!(pilot.altitude, 14000);
        assert_eq!(pilot.groundspeed, 280);
        assert_eq!(pilot.latitude, 40.6);
        assert_eq!(pilot.transponder.as_deref(), Some("2200"));
        assert_eq!(pilot.logon_time, t0);
        assert_eq!(pilot.last_updated, t1);
    }

    #[test]
    fn test_atc_defaults_facility_from_callsign() {
        let atc = Atc::from_patch("EGLL_APP", AtcPatch::default(), Utc::now());
        assert_eq!(atc.facility, Facility::App);

        let explicit = Atc::from_patch(
            "EGLL_APP",
            AtcPatch {
                facility: Some(Facility::Ctr),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(explicit.facility, Facility::Ctr);
    }

    #[test]
    fn test_kind_mismatch_is_not_applied() {
        let now = Utc::now();
        let mut entity = LiveEntity::from_patch("DAL1", EntityPatch::Pilot(PilotPatch::default()), now);
        let before = entity.clone();
        assert!(!entity.apply(EntityPatch::Atc(AtcPatch::default()), now));
        assert_eq!(entity, before);
    }

    #[test]
    fn test_entity_serializes_with_kind_tag() {
        let entity = LiveEntity::from_patch("DAL1", EntityPatch::Pilot(PilotPatch::default()), Utc::now());
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "pilot");
        assert_eq!(json["callsign"], "DAL1");
    }
}
