//! WebSocket 연결 handler.
//!
//! 소켓을 읽기/쓰기 태스크로 나누고, 둘 중 하나가 끝나면 연결을 정리합니다.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::compression::PendingFrame;
use super::manager::{PushConnection, SharedPushManager, TeardownReason};
use super::messages::ControlMessage;
use super::subscriptions::ConnectionId;
use crate::metrics::{
    decrement_websocket_connections, increment_websocket_connections, record_push_frames,
};

/// WebSocket 상태.
#[derive(Clone)]
pub struct WsState {
    /// 푸시 채널 관리자
    pub manager: SharedPushManager,
}

impl WsState {
    pub fn new(manager: SharedPushManager) -> Self {
        Self { manager }
    }
}

/// WebSocket 업그레이드 핸들러.
///
/// # 엔드포인트
///
/// `GET /ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(ws_state): State<WsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ws_state))
}

/// WebSocket 연결 처리.
async fn handle_socket(socket: WebSocket, state: WsState) {
    let manager = state.manager;
    let PushConnection { id, frames, closed } = manager.accept().await;
    info!(connection = %id, "WebSocket connected");
    increment_websocket_connections();

    let (sender, receiver) = socket.split();
    let heartbeat = manager.config().heartbeat_interval();
    let send_timeout = manager.config().send_timeout();

    let mut send_task = tokio::spawn(write_loop(
        sender,
        frames,
        closed.clone(),
        heartbeat,
        send_timeout,
    ));
    let mut receive_task = tokio::spawn(read_loop(receiver, id, manager.clone()));

    // 하나의 태스크가 종료되면 다른 것도 종료
    let reason = tokio::select! {
        result = &mut send_task => {
            receive_task.abort();
            result.unwrap_or(TeardownReason::TransportError)
        }
        result = &mut receive_task => {
            send_task.abort();
            result.unwrap_or(TeardownReason::TransportError)
        }
    };

    manager.teardown(id, reason).await;
    decrement_websocket_connections();
    debug!(connection = %id, reason = reason.as_str(), "WebSocket tasks finished");
}

/// 프레임 큐를 소켓으로 내보냅니다.
///
/// 프레임은 큐잉된 순서대로 압축 완료를 기다린 뒤 전송됩니다. 하트비트 주기마다
/// 전송 계층 Ping을 보냅니다.
pub async fn write_loop<S>(
    mut sink: S,
    mut frames: mpsc::Receiver<PendingFrame>,
    closed: CancellationToken,
    heartbeat: Duration,
    send_timeout: Duration,
) -> TeardownReason
where
    S: Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval(heartbeat);
    ping.tick().await;

    loop {
        let outgoing = tokio::select! {
            _ = closed.cancelled() => {
                let _ = timeout(send_timeout, sink.send(Message::Close(None))).await;
                return TeardownReason::Shutdown;
            }
            _ = ping.tick() => Message::Ping(Bytes::new()),
            next = frames.recv() => {
                let Some(pending) = next else {
                    return TeardownReason::Shutdown;
                };
                match pending.await {
                    Some(frame) => Message::Binary(frame),
                    None => {
                        record_push_frames("compression_failed", 1);
                        continue;
                    }
                }
            }
        };

        let is_frame = matches!(outgoing, Message::Binary(_));
        match timeout(send_timeout, sink.send(outgoing)).await {
            Ok(Ok(())) => {
                if is_frame {
                    record_push_frames("sent", 1);
                }
            }
            Ok(Err(_)) => return TeardownReason::TransportError,
            Err(_) => return TeardownReason::SendTimeout,
        }
    }
}

/// 클라이언트 메시지를 읽어 관리자에 전달합니다.
pub async fn read_loop<St, E>(
    mut stream: St,
    id: ConnectionId,
    manager: SharedPushManager,
) -> TeardownReason
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %id, error = %e, "WebSocket receive error");
                return TeardownReason::TransportError;
            }
        };

        match message {
            Message::Text(text) => match ControlMessage::parse(text.as_str()) {
                Ok(control) => {
                    if !manager.handle_control(id, control).await {
                        return TeardownReason::Shutdown;
                    }
                }
                Err(e) => {
                    warn!(connection = %id, error = %e, "Ignoring invalid control message");
                }
            },
            Message::Ping(_) | Message::Pong(_) => {
                manager.mark_alive(id).await;
            }
            Message::Binary(_) => {
                debug!(connection = %id, "Binary messages not supported");
            }
            Message::Close(_) => {
                debug!(connection = %id, "Close message received");
                return TeardownReason::ClientClosed;
            }
        }
    }
    TeardownReason::TransportError
}

/// 독립 실행형 WebSocket 라우터. `/ws` 아래에 중첩됩니다.
pub fn standalone_websocket_router(ws_state: WsState) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .with_state(ws_state)
}
