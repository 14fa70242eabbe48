//! 푸시 채널 제어 메시지.
//!
//! 클라이언트 → 서버:
//! - `alive` (평문) 또는 `{"type":"alive"}` - 생존 신호
//! - `{"type":"register","callsign":"UAL100"}` - 콜사인 푸시 요청
//! - `{"type":"unregister"}` - 연결은 유지하고 추적만 중단
//!
//! 서버 → 클라이언트 메시지는 압축된 프로젝션 바이너리 프레임뿐입니다.

use serde::Deserialize;

/// 푸시 채널 에러.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("잘못된 메시지 형식: {0}")]
    InvalidMessage(String),
    #[error("콜사인이 비어 있습니다")]
    EmptyCallsign,
}

/// 클라이언트 제어 메시지.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// 생존 신호
    Alive,
    /// 콜사인 등록 (다른 콜사인으로 등록되어 있으면 옮김)
    Register {
        callsign: String,
    },
    /// 등록 해제
    Unregister,
}

impl ControlMessage {
    /// 텍스트 프레임을 파싱합니다.
    pub fn parse(text: &str) -> Result<Self, WsError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("alive") {
            return Ok(Self::Alive);
        }

        let message: Self =
            serde_json::from_str(text).map_err(|e| WsError::InvalidMessage(e.to_string()))?;

        match message {
            Self::Register { callsign } => {
                let callsign = callsign.trim();
                if callsign.is_empty() {
                    return Err(WsError::EmptyCallsign);
                }
                Ok(Self::Register {
                    callsign: callsign.to_string(),
                })
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alive_variants() {
        assert_eq!(ControlMessage::parse("alive").unwrap(), ControlMessage::Alive);
        assert_eq!(ControlMessage::parse(" alive\n").unwrap(), ControlMessage::Alive);
        assert_eq!(
            ControlMessage::parse(r#"{"type":"alive"}"#).unwrap(),
            ControlMessage::Alive
        );
    }

    #[test]
    fn test_parse_register() {
        let msg = ControlMessage::parse(r#"{"type":"register","callsign":" DAL123 "}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Register {
                callsign: "DAL123".to_string()
            }
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"unregister"}"#).unwrap(),
            ControlMessage::Unregister
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            ControlMessage::parse(r#"{"type":"register","callsign":""}"#),
            Err(WsError::EmptyCallsign)
        ));
        assert!(matches!(
            ControlMessage::parse(r#"{"type":"subscribe"}"#),
            Err(WsError::InvalidMessage(_))
        ));
        assert!(ControlMessage::parse("hello").is_err());
    }
}
