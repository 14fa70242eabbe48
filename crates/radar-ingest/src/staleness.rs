//! 이벤트 지연 검사.
//!
//! 처리 시각 기준으로 허용 지연보다 오래된 이벤트는 상태를 바꾸지 않고 버립니다.
//!
//! 이 검사는 "지금"과의 차이만 봅니다. 같은 콜사인에 대한 두 이벤트가 모두
//! 허용 범위 안에 있으면 늦게 도착한 쪽이 더 이른 타임스탬프를 가지고 있어도
//! 그대로 적용됩니다. 콜사인별 순서 번호 검사는 하지 않습니다.

use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;

/// 검사 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 적용 가능
    Fresh,
    /// 허용 지연 초과. 측정된 지연을 함께 담습니다.
    Stale(Duration),
}

/// 고정 허용 지연 기반 게이트.
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    tolerance: Duration,
}

impl StalenessGate {
    pub fn new(tolerance: StdDuration) -> Self {
        Self {
            tolerance: Duration::from_std(tolerance).unwrap_or(Duration::MAX),
        }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// `now - timestamp > tolerance`이면 거부합니다.
    ///
    /// 미래 시각(시계 차이)은 지연 0으로 보고 통과시킵니다.
    pub fn check(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Admission {
        let age = now.signed_duration_since(timestamp);
        if age > self.tolerance {
            Admission::Stale(age)
        } else {
            Admission::Fresh
        }
    }
}
