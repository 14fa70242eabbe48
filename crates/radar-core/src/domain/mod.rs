//! 라이브 네트워크 도메인 모델.

mod entity;
mod event;
mod flight_plan;
mod projection;

pub use entity::*;
pub use event::*;
pub use flight_plan::*;
pub use projection::*;
