//! CircuitBreaker - 依存先ごとの 3 状態ステートマシン
//!
//! # 状態遷移
//! - CLOSED: 呼び出しを実行。連続失敗が failure_threshold に達すると OPEN
//! - OPEN: 呼び出しを実行せずに拒否。最後の失敗から reset_timeout 経過後の
//!   最初の呼び出しで HALF_OPEN に移り、その呼び出しを実行する
//! - HALF_OPEN: 失敗 1 回で OPEN に戻る。success_threshold 回連続成功で CLOSED
//!
//! 状態はプロセス内のみ（永続化しない・レプリカ間で共有しない）。
//! ロックは await をまたがない: 判定と記録はそれぞれ同期的に完結する。

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::CircuitBreakerConfig;
use crate::ports::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The wrapped call was not invoked.
    #[error("circuit breaker '{name}' is open, retry in {remaining_ms} ms")]
    Open { name: String, remaining_ms: u64 },

    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// Cooldown left before the breaker will probe again.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            CircuitBreakerError::Open { remaining_ms, .. } => {
                Some(Duration::from_millis(*remaining_ms))
            }
            CircuitBreakerError::Operation(_) => None,
        }
    }

    /// The operation's own error; `None` when the call was rejected.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CircuitBreakerError::Operation(e) => Some(e),
            CircuitBreakerError::Open { .. } => None,
        }
    }
}

/// Snapshot returned by [`CircuitBreaker::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub total_failures: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<DateTime<Utc>>,
    total_requests: u64,
    total_failures: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure: None,
            total_requests: 0,
            total_failures: 0,
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let name = name.into();
        debug!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            "circuit breaker initialized"
        );
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` under the breaker.
    ///
    /// While OPEN and still cooling down, `operation` is never called and
    /// [`CircuitBreakerError::Open`] carries the remaining cooldown.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(remaining_ms) = self.admit() {
            return Err(CircuitBreakerError::Open {
                name: self.name.clone(),
                remaining_ms,
            });
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result.map_err(CircuitBreakerError::Operation)
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.lock();
        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure_time: inner.last_failure,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
        }
    }

    /// Force CLOSED with zeroed counters.
    pub fn reset(&self) {
        *self.lock() = Inner::default();
        info!(breaker = %self.name, "circuit breaker reset");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Err(remaining_ms)` when the call must be rejected.
    fn admit(&self) -> Result<(), u64> {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.total_requests += 1;

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed_ms = inner
            .last_failure
            .map(|at| (now - at).num_milliseconds().max(0) as u64)
            .unwrap_or(u64::MAX);
        if elapsed_ms < self.config.reset_timeout_ms {
            return Err(self.config.reset_timeout_ms - elapsed_ms);
        }

        inner.state = CircuitState::HalfOpen;
        inner.successes = 0;
        info!(breaker = %self.name, "circuit breaker half-open, probing dependency");
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    info!(breaker = %self.name, "circuit breaker closed");
                }
            }
            // 並行呼び出しが先に OPEN にした
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.total_failures += 1;
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = inner.failures,
                        reset_timeout_ms = self.config.reset_timeout_ms,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.successes = 0;
                warn!(breaker = %self.name, "probe failed, circuit breaker re-opened");
            }
            CircuitState::Open => {}
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failures: u32, successes: u32, timeout_ms: u64) -> (Arc<FixedClock>, CircuitBreaker) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let config = CircuitBreakerConfig::new(failures, successes, timeout_ms);
        (clock.clone(), CircuitBreaker::new("twilio", config, clock))
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        cb.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        cb.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let (_clock, cb) = breaker(3, 1, 1_000);

        for _ in 0..2 {
            assert!(matches!(fail(&cb).await, Err(CircuitBreakerError::Operation("boom"))));
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        let tripping = fail(&cb).await.unwrap_err();
        assert_eq!(tripping.into_operation(), Some("boom"));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_the_failure_count_while_closed() {
        let (_clock, cb) = breaker(2, 1, 1_000);

        fail(&cb).await.unwrap_err();
        succeed(&cb).await.unwrap();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failures, 1);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_invoking() {
        let (clock, cb) = breaker(1, 1, 10_000);
        fail(&cb).await.unwrap_err();

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        clock.advance_millis(4_000);
        let err = cb
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await
            .unwrap_err();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(err.is_open());
        assert_eq!(err.remaining(), Some(Duration::from_millis(6_000)));
        assert_eq!(err.into_operation(), None);
    }

    #[tokio::test]
    async fn full_cycle_closed_open_half_open_closed() {
        let (clock, cb) = breaker(2, 2, 5_000);

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance_millis(5_000);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failures, 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let (clock, cb) = breaker(1, 3, 5_000);
        fail(&cb).await.unwrap_err();

        clock.advance_millis(5_000);
        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        fail(&cb).await.unwrap_err();

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().successes, 0);

        // クールダウンは最新の失敗から数え直す
        clock.advance_millis(1_000);
        let err = succeed(&cb).await.unwrap_err();
        assert_eq!(err.remaining(), Some(Duration::from_millis(4_000)));
    }

    #[tokio::test]
    async fn stats_count_every_request_and_failure() {
        let (_clock, cb) = breaker(1, 1, 60_000);

        succeed(&cb).await.unwrap();
        fail(&cb).await.unwrap_err();
        succeed(&cb).await.unwrap_err(); // rejected while open

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_failures, 1);
        assert_eq!(stats.state, CircuitState::Open);
        assert!(stats.last_failure_time.is_some());
    }

    #[tokio::test]
    async fn reset_forces_closed_with_zeroed_counters() {
        let (_clock, cb) = breaker(1, 1, 60_000);
        fail(&cb).await.unwrap_err();

        cb.reset();
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.last_failure_time, None);
        succeed(&cb).await.unwrap();
    }

    #[test]
    fn stats_serialize_with_wire_names() {
        let (_clock, cb) = breaker(1, 1, 1_000);
        let json = serde_json::to_value(cb.stats()).unwrap();
        assert_eq!(json["state"], "CLOSED");
        assert_eq!(json["totalRequests"], 0);
        assert!(json["lastFailureTime"].is_null());
    }
}
