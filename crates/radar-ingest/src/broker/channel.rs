use super::{BrokerSource, Delivery};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// 프로세스 내부 채널을 읽는 소스.
///
/// 항목 ID는 0부터 증가하는 순번입니다. 확인된 개수는 `ack_counter`로 관찰할 수 있습니다.
pub struct ChannelSource {
    rx: mpsc::Receiver<String>,
    batch_size: usize,
    next_id: u64,
    acked: Arc<AtomicU64>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<String>, batch_size: usize) -> Self {
        Self {
            rx,
            batch_size: batch_size.max(1),
            next_id: 0,
            acked: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ack_counter(&self) -> Arc<AtomicU64> {
        self.acked.clone()
    }

    fn delivery(&mut self, payload: String) -> Delivery {
        let id = self.next_id;
        self.next_id += 1;
        Delivery::new(id.to_string(), payload)
    }
}

#[async_trait]
impl BrokerSource for ChannelSource {
    async fn fetch(&mut self) -> Result<Vec<Delivery>> {
        let first = self
            .rx
            .recv()
            .await
            .ok_or_else(|| IngestError::NotConnected("channel closed".to_string()))?;

        let mut batch = vec![self.delivery(first)];
        while batch.len() < self.batch_size {
            match self.rx.try_recv() {
                Ok(payload) => {
                    let delivery = self.delivery(payload);
                    batch.push(delivery);
                }
                Err(_) => break,
            }
        }
        Ok(batch)
    }

    async fn ack(&mut self, ids: &[String]) -> Result<()> {
        self.acked.fetch_add(ids.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        if self.rx.is_closed() && self.rx.is_empty() {
            return Err(IngestError::NotConnected("channel closed".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}
