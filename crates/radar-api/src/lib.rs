//! # Radar API
//!
//! 라이브 레이더의 HTTP 조회 엔드포인트와 WebSocket 푸시 채널.
//!
//! - `/health`, `/health/ready` - 헬스 체크
//! - `/api/v1/live` - 월드 상태 스냅샷 조회
//! - `/ws` - 콜사인별 압축 푸시 채널
//! - `/metrics` - Prometheus 메트릭

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod websocket;
