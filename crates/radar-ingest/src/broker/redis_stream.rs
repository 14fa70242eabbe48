//! Redis Streams 컨슈머 그룹 소스.
//!
//! `XREADGROUP`으로 읽고 반영이 끝난 항목만 `XACK`합니다. 연결 직후에는 ID `0`으로
//! 이 컨슈머의 미확인(pending) 항목부터 다시 읽고, 비면 `>`로 새 항목을 읽습니다.
//! 따라서 재연결 시 마지막 확인 지점부터 이어서 처리합니다.

use super::{BrokerSource, Delivery};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use radar_core::IngestConfig;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

const PAYLOAD_FIELD: &str = "payload";
const RESPONSE_TIMEOUT_MARGIN_MS: u64 = 5_000;

/// 커넥션 매니저의 응답 제한.
///
/// `BLOCK` 읽기보다 짧으면 새 항목이 없는 정상 대기가 타임아웃 오류가 됩니다.
fn response_timeout(block_ms: u64) -> Duration {
    Duration::from_millis(block_ms.saturating_add(RESPONSE_TIMEOUT_MARGIN_MS))
}

/// Redis Streams 기반 브로커 소스.
pub struct RedisStreamSource {
    client: Client,
    connection: Option<ConnectionManager>,
    stream_key: String,
    group: String,
    consumer: String,
    batch_size: usize,
    block_ms: u64,
    read_pending: bool,
}

impl RedisStreamSource {
    /// 연결하고 컨슈머 그룹을 준비합니다.
    pub async fn connect(url: &str, config: &IngestConfig) -> Result<Self> {
        let client = Client::open(url)?;
        let mut source = Self {
            client,
            connection: None,
            stream_key: config.stream_key.clone(),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
            batch_size: config.batch_size,
            block_ms: config.block_ms,
            read_pending: true,
        };
        source.reconnect().await?;
        Ok(source)
    }

    async fn ensure_group(&self, conn: &mut ConnectionManager) -> Result<()> {
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.stream_key, &self.group, "0")
            .await;
        match created {
            Ok(()) => {
                info!(stream = %self.stream_key, group = %self.group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_options(&self) -> StreamReadOptions {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(self.batch_size);
        if self.read_pending {
            options
        } else {
            options.block(self.block_ms as usize)
        }
    }
}

#[async_trait]
impl BrokerSource for RedisStreamSource {
    async fn fetch(&mut self) -> Result<Vec<Delivery>> {
        let options = self.read_options();
        let start_id = if self.read_pending { "0" } else { ">" };
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| IngestError::NotConnected(self.stream_key.clone()))?;

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[start_id], &options)
            .await?;

        let deliveries: Vec<Delivery> = reply
            .map(|reply| {
                reply
                    .keys
                    .into_iter()
                    .flat_map(|key| key.ids)
                    .map(|entry| Delivery {
                        payload: entry.get::<String>(PAYLOAD_FIELD),
                        id: entry.id,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if self.read_pending && deliveries.is_empty() {
            debug!(stream = %self.stream_key, "Pending entries drained");
            self.read_pending = false;
        }

        Ok(deliveries)
    }

    async fn ack(&mut self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| IngestError::NotConnected(self.stream_key.clone()))?;
        let _: i64 = conn.xack(&self.stream_key, &self.group, ids).await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.connection = None;
        let manager_config =
            ConnectionManagerConfig::new().set_response_timeout(response_timeout(self.block_ms));
        let mut conn = self
            .client
            .get_connection_manager_with_config(manager_config)
            .await?;
        self.ensure_group(&mut conn).await?;
        self.connection = Some(conn);
        self.read_pending = true;
        info!(
            stream = %self.stream_key,
            group = %self.group,
            consumer = %self.consumer,
            "Connected to live event stream"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.stream_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_timeout_outlasts_block_read() {
        assert_eq!(response_timeout(2_000), Duration::from_millis(7_000));
        assert!(response_timeout(0) > Duration::ZERO);
        assert_eq!(response_timeout(u64::MAX), Duration::from_millis(u64::MAX));
    }
}
