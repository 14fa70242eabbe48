//! Radar API 서버 진입점.
//!
//! 라이브 이벤트 수집기, 전체 동기화 리스너, 푸시 배포기를 백그라운드 태스크로
//! 띄우고 HTTP/WebSocket 서버를 실행합니다.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use radar_core::{create_world_store, init_logging, AppConfig, LogConfig};
use radar_ingest::{
    FullSyncListener, IngestConsumer, IngestPipeline, RedisStreamSource, StalenessGate,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use radar_api::metrics::setup_metrics_recorder;
use radar_api::middleware::metrics_layer;
use radar_api::routes::create_api_router;
use radar_api::state::AppState;
use radar_api::websocket::{
    create_push_manager, standalone_websocket_router, PushDistributor, WsState,
};

/// 라이브 레이더 서버.
#[derive(Debug, Parser)]
#[command(name = "radar-api", version, about)]
struct Cli {
    /// 설정 파일 경로
    #[arg(long, env = "RADAR_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    /// 로그 레벨 (설정 파일보다 우선)
    #[arg(long)]
    log_level: Option<String>,
}

/// CORS 레이어 생성.
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle, ws_state: WsState) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let api_router = create_api_router().with_state(state);
    let ws_router = standalone_websocket_router(ws_state);

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        .nest("/ws", ws_router)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

/// 브로커에 연결될 때까지 재시도한 뒤 컨슈머를 실행합니다.
async fn run_ingest(config: AppConfig, pipeline: IngestPipeline, shutdown: CancellationToken) {
    let reconnect = config.ingest.reconnect_interval();
    let source = loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            result = RedisStreamSource::connect(&config.redis.url, &config.ingest) => match result {
                Ok(source) => break source,
                Err(e) => {
                    error!(error = %e, retry_secs = reconnect.as_secs(), "Broker connection failed");
                }
            },
        }
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(reconnect) => {}
        }
    };

    let stats = IngestConsumer::new(source, pipeline, reconnect)
        .run(shutdown)
        .await;
    stats.log_summary("live_ingest_final");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("설정 로드 실패: {}", cli.config.display()))?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    info!(config = %cli.config.display(), "Starting Radar API server...");

    let metrics_handle = setup_metrics_recorder().context("메트릭 레코더 설정 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .with_context(|| format!("잘못된 바인드 주소: {}", config.server.bind_addr()))?;

    let shutdown_token = CancellationToken::new();

    // 공유 상태
    let store = create_world_store();
    let push = create_push_manager(config.push.clone());
    let (change_tx, change_rx) = mpsc::channel(config.ingest.change_queue_capacity);

    // 라이브 이벤트 수집
    let pipeline = IngestPipeline::new(
        store.clone(),
        StalenessGate::new(config.ingest.staleness_tolerance()),
        change_tx,
    );
    let ingest_handle = tokio::spawn(run_ingest(
        config.clone(),
        pipeline,
        shutdown_token.clone(),
    ));

    // 전체 동기화
    if config.full_sync.enabled {
        let listener = FullSyncListener::new(
            &config.redis.url,
            config.full_sync.channel.clone(),
            store.clone(),
            config.ingest.reconnect_interval(),
        )
        .context("전체 동기화 리스너 생성 실패")?;
        tokio::spawn(listener.run(shutdown_token.clone()));
    } else {
        warn!("Full sync disabled, /health/ready stays degraded until a snapshot arrives");
    }

    // 푸시 채널
    tokio::spawn(push.clone().run_maintenance(store.clone(), shutdown_token.clone()));
    let distributor = PushDistributor::new(store.clone(), push.clone());
    tokio::spawn(distributor.run(change_rx, shutdown_token.clone()));

    let state = Arc::new(AppState::new(store, push.clone()));
    info!(version = %state.version, "Application state initialized");

    let app = create_router(state, metrics_handle, WsState::new(push));

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);
    info!("WebSocket available at ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if tokio::time::timeout(Duration::from_secs(10), ingest_handle)
        .await
        .is_err()
    {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown_token.cancelled() => {}
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
