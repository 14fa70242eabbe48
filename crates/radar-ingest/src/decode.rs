//! 브로커 메시지 디코더.
//!
//! 메시지는 두 단계로 해석합니다. 먼저 `type`/`timestamp`/`data` 봉투를 읽고,
//! 판별자에 맞는 타입으로 `data`를 역직렬화합니다. 필드 존재 여부로 종류를
//! 추측하지 않습니다.

use chrono::{DateTime, TimeZone, Utc};
use radar_core::{
    AtcPatch, EntityPatch, Facility, FlightPlanPatch, LiveEvent, LiveEventKind, MessageKind,
    PilotPatch,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// 디코딩 오류. 해당 메시지는 버려집니다.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unknown message type: {0}")]
    UnknownKind(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {kind:?} payload: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    timestamp: RawTimestamp,
    #[serde(default)]
    data: Value,
}

/// RFC 3339 문자열 또는 epoch 밀리초.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(self) -> Result<DateTime<Utc>, DecodeError> {
        match self {
            RawTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| DecodeError::InvalidTimestamp(ms.to_string())),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| DecodeError::InvalidTimestamp(text)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallsignOnly {
    callsign: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ClientType {
    Pilot,
    Atc,
}

#[derive(Debug, Deserialize)]
struct AddClientData {
    callsign: String,
    client_type: ClientType,
    cid: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    rating: Option<i32>,
    #[serde(default)]
    pilot_rating: Option<i32>,
    #[serde(default)]
    military_rating: Option<i32>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    facility: Option<i64>,
    #[serde(default)]
    visual_range: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PilotUpdateData {
    callsign: String,
    #[serde(flatten)]
    patch: PilotPatch,
}

#[derive(Debug, Deserialize)]
struct AtcUpdateData {
    callsign: String,
    #[serde(default)]
    cid: Option<u64>,
    #[serde(default)]
    rating: Option<i32>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    facility: Option<i64>,
    #[serde(default)]
    visual_range: Option<u32>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    text_atis: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PlanData {
    callsign: String,
    #[serde(flatten)]
    patch: FlightPlanPatch,
}

/// 원시 브로커 메시지 하나를 정규화된 이벤트로 변환합니다.
pub fn decode(raw: &str) -> Result<LiveEvent, DecodeError> {
    let envelope: RawEnvelope =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let kind: MessageKind = serde_json::from_value(Value::String(envelope.kind.clone()))
        .map_err(|_| DecodeError::UnknownKind(envelope.kind.clone()))?;
    let timestamp = envelope.timestamp.resolve()?;
    let data = envelope.data;

    let (callsign, body) = match kind {
        MessageKind::AddClient => {
            let d: AddClientData = payload(kind, data)?;
            let patch = add_client_patch(&d)?;
            (d.callsign, LiveEventKind::AddClient(patch))
        }
        MessageKind::RemoveClient => {
            let d: CallsignOnly = payload(kind, data)?;
            (d.callsign, LiveEventKind::RemoveClient)
        }
        MessageKind::PilotUpdate => {
            let d: PilotUpdateData = payload(kind, data)?;
            (d.callsign, LiveEventKind::PilotUpdate(d.patch))
        }
        MessageKind::AtcUpdate => {
            let d: AtcUpdateData = payload(kind, data)?;
            let facility = facility(kind, d.facility)?;
            let patch = AtcPatch {
                cid: d.cid,
                rating: d.rating,
                frequency: d.frequency,
                facility,
                visual_range: d.visual_range,
                latitude: d.latitude,
                longitude: d.longitude,
                text_atis: d.text_atis,
                ..Default::default()
            };
            (d.callsign, LiveEventKind::AtcUpdate(patch))
        }
        MessageKind::PlanUpdate => {
            let d: PlanData = payload(kind, data)?;
            (d.callsign, LiveEventKind::PlanUpdate(d.patch))
        }
        MessageKind::DeletePlan => {
            let d: CallsignOnly = payload(kind, data)?;
            (d.callsign, LiveEventKind::DeletePlan)
        }
    };

    let callsign = callsign.trim();
    if callsign.is_empty() {
        return Err(DecodeError::MissingField("callsign"));
    }

    Ok(LiveEvent::new(callsign, timestamp, body))
}

fn payload<T: DeserializeOwned>(kind: MessageKind, data: Value) -> Result<T, DecodeError> {
    if data.is_null() {
        return Err(DecodeError::MissingField("data"));
    }
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

fn facility(kind: MessageKind, code: Option<i64>) -> Result<Option<Facility>, DecodeError> {
    code.map(|c| {
        Facility::from_code(c).ok_or_else(|| DecodeError::InvalidPayload {
            kind,
            reason: format!("unknown facility code {c}"),
        })
    })
    .transpose()
}

fn add_client_patch(d: &AddClientData) -> Result<EntityPatch, DecodeError> {
    let patch = match d.client_type {
        ClientType::Pilot => EntityPatch::Pilot(PilotPatch {
            cid: Some(d.cid),
            name: d.name.clone(),
            server: d.server.clone(),
            pilot_rating: d.pilot_rating.or(d.rating),
            military_rating: d.military_rating,
            protocol: d.protocol.clone(),
            latitude: d.latitude,
            longitude: d.longitude,
            ..Default::default()
        }),
        ClientType::Atc => EntityPatch::Atc(AtcPatch {
            cid: Some(d.cid),
            name: d.name.clone(),
            server: d.server.clone(),
            rating: d.rating,
            frequency: d.frequency.clone(),
            facility: facility(MessageKind::AddClient, d.facility)?,
            visual_range: d.visual_range,
            latitude: d.latitude,
            longitude: d.longitude,
            text_atis: None,
        }),
    };
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_add_pilot() {
        let raw = r#"{
            "type": "ADD_CLIENT",
            "timestamp": "2026-03-01T12:00:00Z",
            "data": {"callsign": "UAL100", "client_type": "pilot", "cid": 1234567,
                     "name": "Jane Doe", "server": "USA-EAST", "pilot_rating": 1}
        }"#;
        let event = decode(raw).unwrap();
        assert_eq!(event.callsign, "UAL100");
        assert_eq!(event.message_kind(), MessageKind::AddClient);
        match event.kind {
            LiveEventKind::AddClient(EntityPatch::Pilot(p)) => {
                assert_eq!(p.cid, Some(1234567));
                assert_eq!(p.pilot_rating, Some(1));
                assert_eq!(p.server.as_deref(), Some("USA-EAST"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_decode_add_atc_with_facility_code() {
        let raw = r#"{"type":"ADD_CLIENT","timestamp":1772366400000,
            "data":{"callsign":"KJFK_TWR","client_type":"atc","cid":42,"facility":4,"frequency":"119.100"}}"#;
        let event = decode(raw).unwrap();
        match event.kind {
            LiveEventKind::AddClient(EntityPatch::Atc(a)) => {
                assert_eq!(a.facility, Some(Facility::Twr));
                assert_eq!(a.frequency.as_deref(), Some("119.100"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(event.timestamp.timestamp_millis(), 1772366400000);
    }

    #[test]
    fn test_decode_pilot_update() {
        let raw = r#"{"type":"PD","timestamp":"2026-03-01T12:00:05Z",
            "data":{"callsign":"UAL100","latitude":37.61,"longitude":-122.38,"altitude":3500,"heading":280,"groundspeed":190}}"#;
        let event = decode(raw).unwrap();
        match event.kind {
            LiveEventKind::PilotUpdate(p) => {
                assert_eq!(p.altitude, Some(3500));
                assert_eq!(p.heading, Some(280));
                assert!(p.cid.is_none());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_decode_plan_and_delete_plan() {
        let raw = r#"{"type":"PLAN","timestamp":"2026-03-01T12:00:05Z",
            "data":{"callsign":"UAL100","revision":3,"departure":"KSFO","arrival":"KJFK",
                    "filed_at":"2026-03-01T11:30:00Z","route":"DCT"}}"#;
        match decode(raw).unwrap().kind {
            LiveEventKind::PlanUpdate(p) => {
                assert_eq!(p.revision, Some(3));
                assert_eq!(p.arrival.as_deref(), Some("KJFK"));
                assert!(p.filed_at.is_some());
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        let raw = r#"{"type":"DELETE_PLAN","timestamp":"2026-03-01T12:00:05Z","data":{"callsign":"UAL100"}}"#;
        assert_eq!(decode(raw).unwrap().kind, LiveEventKind::DeletePlan);
    }

    #[test]
    fn test_malformed_messages() {
        assert!(matches!(decode("{not json"), Err(DecodeError::InvalidJson(_))));

        let unknown = r#"{"type":"WEATHER","timestamp":0,"data":{"callsign":"X"}}"#;
        assert!(matches!(decode(unknown), Err(DecodeError::UnknownKind(k)) if k == "WEATHER"));

        let no_callsign = r#"{"type":"REMOVE_CLIENT","timestamp":0,"data":{}}"#;
        assert!(matches!(
            decode(no_callsign),
            Err(DecodeError::InvalidPayload { kind: MessageKind::RemoveClient, .. })
        ));

        let blank = r#"{"type":"REMOVE_CLIENT","timestamp":0,"data":{"callsign":"  "}}"#;
        assert_eq!(decode(blank), Err(DecodeError::MissingField("callsign")));

        let bad_ts = r#"{"type":"REMOVE_CLIENT","timestamp":"yesterday","data":{"callsign":"X"}}"#;
        assert!(matches!(decode(bad_ts), Err(DecodeError::InvalidTimestamp(_))));

        let no_data = r#"{"type":"PD","timestamp":0}"#;
        assert_eq!(decode(no_data), Err(DecodeError::MissingField("data")));

        let bad_facility = r#"{"type":"AD","timestamp":0,"data":{"callsign":"X_CTR","facility":9}}"#;
        assert!(matches!(decode(bad_facility), Err(DecodeError::InvalidPayload { .. })));
    }
}
