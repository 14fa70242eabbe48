//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 푸시 채널 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("push_compression_seconds".to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 푸시 채널 메트릭
// ============================================================================

/// WebSocket 연결 수 증가.
pub fn increment_websocket_connections() {
    gauge!("websocket_connections_active").increment(1.0);
}

/// WebSocket 연결 수 감소.
pub fn decrement_websocket_connections() {
    gauge!("websocket_connections_active").decrement(1.0);
}

/// 푸시 프레임 처리 결과 ("queued" | "sent" | "dropped" | "compression_failed").
pub fn record_push_frames(outcome: &'static str, count: usize) {
    counter!("push_frames_total", "outcome" => outcome).increment(count as u64);
}

/// 연결 해제 사유별 카운터.
pub fn record_teardown(reason: &'static str) {
    counter!("push_teardowns_total", "reason" => reason).increment(1);
}

pub fn record_compression_duration(duration_secs: f64) {
    histogram!("push_compression_seconds").record(duration_secs);
}

/// 구독 중인 콜사인 수 설정.
pub fn set_subscribed_callsigns(count: usize) {
    gauge!("push_subscribed_callsigns").set(count as f64);
}

// ============================================================================
// 경로 정규화
// ============================================================================

/// 경로의 동적 세그먼트를 정규화해 레이블 카디널리티를 제한합니다.
///
/// 예: `/api/v1/live/UAL100` → `/api/v1/live/:callsign`
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    let normalized: Vec<String> = path
        .split('/')
        .map(|segment| {
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            let out = if previous == "live" && !segment.is_empty() {
                ":callsign".to_string()
            } else if is_numeric {
                ":id".to_string()
            } else {
                segment.to_string()
            };
            previous = segment;
            out
        })
        .collect();
    normalized.join("/")
}
