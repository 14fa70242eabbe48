//! 브로커 컨슈머 루프.
//!
//! 배치를 가져와 항목마다 파이프라인에 적용한 뒤 배치 전체를 확인(ack)합니다.
//! 브로커 오류가 나면 저장소는 마지막 상태로 둔 채 재연결을 반복합니다.

use crate::broker::BrokerSource;
use crate::pipeline::IngestPipeline;
use crate::stats::IngestStats;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// 라이브 이벤트 컨슈머.
pub struct IngestConsumer<S> {
    source: S,
    pipeline: IngestPipeline,
    reconnect_interval: Duration,
}

impl<S: BrokerSource> IngestConsumer<S> {
    pub fn new(source: S, pipeline: IngestPipeline, reconnect_interval: Duration) -> Self {
        Self {
            source,
            pipeline,
            reconnect_interval,
        }
    }

    /// 종료 신호까지 이벤트를 처리합니다. 종료 시 누적 통계를 반환합니다.
    ///
    /// 진행 중인 `fetch`는 종료 신호 외에는 취소되지 않습니다. 이미 전달된 항목을
    /// 버리면 ack되지 않은 채 pending에 남기 때문입니다. 종료로 취소된 읽기의
    /// 항목은 다음 시작 시 pending 재조회로 다시 처리됩니다.
    pub async fn run(mut self, shutdown: CancellationToken) -> IngestStats {
        info!(source = self.source.name(), "라이브 이벤트 컨슈머 시작");
        let mut last_summary = Instant::now();

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("라이브 이벤트 컨슈머 종료");
                    break;
                }
                batch = self.source.fetch() => batch,
            };

            let result = match batch {
                Ok(deliveries) => self.process(deliveries).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                if e.is_connection_error() {
                    error!(error = %e, source = self.source.name(), "Broker error");
                    if !self.recover(&shutdown).await {
                        break;
                    }
                } else {
                    warn!(error = %e, source = self.source.name(), "Batch left unacknowledged");
                }
            }

            if last_summary.elapsed() >= SUMMARY_INTERVAL {
                self.pipeline.stats().log_summary("live_ingest");
                last_summary = Instant::now();
            }
        }

        self.pipeline.stats().log_summary("live_ingest");
        self.pipeline.stats().clone()
    }

    async fn process(&mut self, deliveries: Vec<crate::broker::Delivery>) -> crate::Result<()> {
        if deliveries.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            match delivery.payload {
                Some(payload) => {
                    self.pipeline.apply_raw(&payload).await;
                }
                None => {
                    warn!(id = %delivery.id, "Broker entry without payload");
                    self.pipeline.record_malformed();
                }
            }
            ids.push(delivery.id);
        }

        self.source.ack(&ids).await
    }

    /// 재연결될 때까지 기다립니다. 종료 신호를 받으면 `false`.
    async fn recover(&mut self, shutdown: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }

            match self.source.reconnect().await {
                Ok(()) => {
                    info!(source = self.source.name(), "Broker reconnected");
                    return true;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.reconnect_interval.as_secs(),
                        "Broker reconnect failed"
                    );
                }
            }
        }
    }
}
