//! 라이브 이벤트 브로커 추상화.
//!
//! 컨슈머 루프는 `BrokerSource`만 알고 있습니다. 운영에서는 Redis Streams
//! 컨슈머 그룹을, 재생이나 테스트에서는 채널 기반 소스를 사용합니다.

mod channel;
mod redis_stream;

pub use channel::ChannelSource;
pub use redis_stream::RedisStreamSource;

use crate::error::Result;
use async_trait::async_trait;

/// 브로커에서 받은 항목 하나.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 확인(ack)에 쓰이는 브로커 측 ID
    pub id: String,
    /// JSON 페이로드. 항목에 페이로드가 없으면 `None`.
    pub payload: Option<String>,
}

impl Delivery {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Some(payload.into()),
        }
    }
}

/// 라이브 이벤트 공급원.
///
/// `ack`는 해당 항목들을 로컬 상태에 반영한 뒤에만 호출됩니다. 확인되지 않은
/// 항목은 재연결 후 다시 전달될 수 있습니다.
#[async_trait]
pub trait BrokerSource: Send {
    /// 다음 배치를 가져옵니다. 대기 시간 안에 메시지가 없으면 빈 배치를 반환합니다.
    async fn fetch(&mut self) -> Result<Vec<Delivery>>;

    /// 처리가 끝난 항목들을 확인합니다.
    async fn ack(&mut self, ids: &[String]) -> Result<()>;

    /// 연결을 다시 맺고 마지막 확인 지점부터 재개합니다.
    async fn reconnect(&mut self) -> Result<()>;

    /// 로그용 이름.
    fn name(&self) -> &str;
}
