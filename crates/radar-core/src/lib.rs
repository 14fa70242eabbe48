//! # Radar Core
//!
//! 라이브 레이더의 핵심 도메인 모델 및 공유 상태 저장소를 제공합니다.
//!
//! 이 크레이트는 수집기와 API 서버가 함께 사용하는 기본 타입을 제공합니다:
//! - 파일럿/관제사 엔티티와 비행계획
//! - 정규화된 라이브 이벤트
//! - 스냅샷 기반 월드 상태 저장소
//! - 푸시용 프로젝션
//! - 설정 관리 및 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod store;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use store::*;
