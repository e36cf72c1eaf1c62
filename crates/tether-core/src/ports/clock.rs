//! Clock port - 時刻の抽象化
//!
//! lease の期限判定・レートウィンドウ・サーキットブレーカのクールダウンは
//! すべてこの Clock を通して現在時刻を得る。
//!
//! # テスト容易性
//! - 本番は SystemClock
//! - テストは FixedClock を使い、`advance` で時間を進める（実時間の待機は不要）

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Clock は現在時刻を提供
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// 本番用：OS の現在時刻
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// テスト用：明示的に進める時計
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: std::time::Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(std::time::Duration::from_secs(secs));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(std::time::Duration::from_millis(millis));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_only_moves_when_advanced() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        assert_eq!(clock.now(), t0);

        clock.advance_secs(90);
        assert_eq!(clock.now(), t0 + chrono::Duration::seconds(90));

        clock.advance_millis(500);
        assert_eq!(clock.now_millis(), t0.timestamp_millis() + 90_500);
    }

    #[test]
    fn shared_clock_sees_the_same_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(t0));
        let shared: Arc<dyn Clock> = clock.clone();

        clock.advance_secs(10);
        assert_eq!(shared.now(), t0 + chrono::Duration::seconds(10));
    }
}
