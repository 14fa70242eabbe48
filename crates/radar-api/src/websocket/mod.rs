//! 콜사인별 실시간 푸시 채널.
//!
//! 클라이언트는 `/ws`로 접속한 뒤 추적할 콜사인을 등록하고, 해당 콜사인이
//! 변경될 때마다 압축된 프로젝션을 받습니다.
//!
//! # 메시지 형식
//!
//! ## 클라이언트 → 서버
//!
//! ```text
//! alive
//! {"type": "alive"}
//! {"type": "register", "callsign": "UAL100"}
//! {"type": "unregister"}
//! ```
//!
//! ## 서버 → 클라이언트
//!
//! 바이너리 프레임 하나당 zlib 압축된 JSON 프로젝션 하나.
//! 서버는 하트비트 주기마다 전송 계층 Ping을 보내며, Pong도 생존 신호로 취급합니다.

pub mod compression;
pub mod distributor;
pub mod handler;
pub mod manager;
pub mod messages;
pub mod subscriptions;

pub use compression::{decompress, Compressor, PendingFrame};
pub use distributor::{DistributeOutcome, PushDistributor};
pub use handler::{standalone_websocket_router, websocket_handler, WsState};
pub use manager::{
    create_push_manager, ConnectionState, FanOutReport, PushChannelManager, PushConnection,
    SharedPushManager, TeardownReason,
};
pub use messages::{ControlMessage, WsError};
pub use subscriptions::{ConnectionId, RegisterOutcome, Registration, SubscriptionRegistry};
