//! # Radar Ingest
//!
//! 브로커에서 라이브 이벤트를 받아 월드 상태에 반영합니다.
//!
//! 처리 순서: 브로커 메시지 → 디코딩 → 지연 검사 → 저장소 변경 → 변경 알림.
//! 별도의 pub/sub 채널로 들어오는 전체 스냅샷은 저장소를 통째로 교체합니다.

pub mod broker;
pub mod consumer;
pub mod decode;
pub mod error;
pub mod full_sync;
pub mod pipeline;
pub mod staleness;
pub mod stats;

pub use broker::{BrokerSource, ChannelSource, Delivery, RedisStreamSource};
pub use consumer::IngestConsumer;
pub use decode::{decode, DecodeError};
pub use error::{IngestError, Result};
pub use full_sync::{apply_snapshot, FeedSnapshot, FullSyncListener};
pub use pipeline::{ApplyOutcome, IngestPipeline};
pub use staleness::{Admission, StalenessGate};
pub use stats::IngestStats;
