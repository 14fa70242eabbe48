//! 공유 월드 상태 저장소.

mod world;

pub use world::*;
