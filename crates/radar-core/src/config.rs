//! 설정 관리.
//!
//! 설정은 TOML 파일(선택)과 `RADAR__` 접두사 환경 변수를 겹쳐서 로드합니다.
//! 모든 항목에 기본값이 있으므로 파일 없이도 기동할 수 있습니다.

use crate::error::{RadarError, RadarResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// Redis 설정
    pub redis: RedisConfig,
    /// 이벤트 수집 설정
    pub ingest: IngestConfig,
    /// 전체 동기화 설정
    pub full_sync: FullSyncConfig,
    /// 푸시 채널 설정
    pub push: PushConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 연결 URL
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// 이벤트 수집 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 라이브 이벤트 스트림 키
    pub stream_key: String,
    /// 컨슈머 그룹 이름
    pub consumer_group: String,
    /// 그룹 내 컨슈머 이름
    pub consumer_name: String,
    /// 한 번에 가져올 최대 메시지 수
    pub batch_size: usize,
    /// 블로킹 읽기 대기 시간 (밀리초)
    pub block_ms: u64,
    /// 이벤트 허용 지연 (초)
    pub staleness_tolerance_secs: u64,
    /// 브로커 재연결 간격 (초)
    pub reconnect_interval_secs: u64,
    /// 변경 알림 큐 용량
    pub change_queue_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            stream_key: "radar:live-events".to_string(),
            consumer_group: "radar-live".to_string(),
            consumer_name: "radar-1".to_string(),
            batch_size: 256,
            block_ms: 2000,
            staleness_tolerance_secs: 10,
            reconnect_interval_secs: 5,
            change_queue_capacity: 4096,
        }
    }
}

impl IngestConfig {
    pub fn staleness_tolerance(&self) -> Duration {
        Duration::from_secs(self.staleness_tolerance_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

/// 전체 동기화(pub/sub) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FullSyncConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 구독할 채널 이름
    pub channel: String,
}

impl Default for FullSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "radar:full-sync".to_string(),
        }
    }
}

/// 푸시 채널 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// 하트비트 검사 간격 (초)
    pub heartbeat_interval_secs: u64,
    /// 연결 종료 전 허용하는 연속 하트비트 누락 횟수
    pub max_missed_heartbeats: u32,
    /// 구독 레지스트리 정리 간격 (초)
    pub registry_sweep_interval_secs: u64,
    /// 연결별 송신 큐 용량
    pub send_queue_capacity: usize,
    /// 프레임 하나의 송신 타임아웃 (밀리초)
    pub send_timeout_ms: u64,
    /// deflate 압축 레벨 (0-9)
    pub compression_level: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 10,
            max_missed_heartbeats: 3,
            registry_sweep_interval_secs: 300,
            send_queue_capacity: 32,
            send_timeout_ms: 5000,
            compression_level: 6,
        }
    }
}

impl PushConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn registry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.registry_sweep_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> RadarResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("RADAR")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> RadarResult<Self> {
        Self::load("config/default.toml")
    }

    /// 값 범위를 검증합니다.
    pub fn validate(&self) -> RadarResult<()> {
        if self.ingest.staleness_tolerance_secs == 0 {
            return Err(RadarError::Config(
                "ingest.staleness_tolerance_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.ingest.batch_size == 0 || self.ingest.change_queue_capacity == 0 {
            return Err(RadarError::Config(
                "ingest 배치 크기와 큐 용량은 0보다 커야 합니다".to_string(),
            ));
        }
        if self.push.send_queue_capacity == 0 {
            return Err(RadarError::Config(
                "push.send_queue_capacity는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.push.heartbeat_interval_secs == 0 || self.push.registry_sweep_interval_secs == 0 {
            return Err(RadarError::Config(
                "push 주기 설정은 0보다 커야 합니다".to_string(),
            ));
        }
        if self.push.compression_level > 9 {
            return Err(RadarError::Config(format!(
                "push.compression_level은 0-9 범위여야 합니다: {}",
                self.push.compression_level
            )));
        }
        Ok(())
    }
}
