//! CircuitBreakerRegistry - 依存先名 → CircuitBreaker
//!
//! ブレーカーは初回参照時に作られ、レジストリの寿命の間保持される。
//! 設定は component_configs の上書き、無ければ default_config。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitStats};
use super::config::CircuitBreakerSettings;
use crate::ports::Clock;

pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    settings: CircuitBreakerSettings,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(settings: CircuitBreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    /// Get or create the breaker for `name`.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(breaker) = breakers.get(name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().unwrap_or_else(|e| e.into_inner());
        // 読み取りロックを手放している間に他の呼び出しが作った可能性がある
        if let Some(breaker) = breakers.get(name) {
            return Arc::clone(breaker);
        }

        let config = self.settings.config_for(name);
        let breaker = Arc::new(CircuitBreaker::new(name, config, Arc::clone(&self.clock)));
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        info!(breaker = name, total = breakers.len(), "registered circuit breaker");
        breaker
    }

    pub async fn execute<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.breaker(name);
        breaker.execute(operation).await
    }

    /// Snapshots of every known breaker, sorted by name.
    pub fn stats(&self) -> Vec<CircuitStats> {
        let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
        let mut stats: Vec<CircuitStats> = breakers.values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Returns false when no breaker with that name exists yet.
    pub fn reset(&self, name: &str) -> bool {
        let breaker = {
            let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
            breakers.get(name).cloned()
        };
        match breaker {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> = {
            let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
            breakers.values().cloned().collect()
        };
        for breaker in breakers {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::resilience::{CircuitBreakerConfig, CircuitState};
    use chrono::{TimeZone, Utc};

    fn registry() -> CircuitBreakerRegistry {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let settings = CircuitBreakerSettings::default()
            .with_component("sendgrid", CircuitBreakerConfig::new(1, 1, 1_000));
        CircuitBreakerRegistry::new(settings, clock)
    }

    #[test]
    fn same_name_returns_same_breaker() {
        let registry = registry();
        let a = registry.breaker("twilio");
        let b = registry.breaker("twilio");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.config().failure_threshold, 5);
        assert_eq!(registry.breaker("sendgrid").config().failure_threshold, 1);
    }

    #[tokio::test]
    async fn breakers_are_isolated_per_dependency() {
        let registry = registry();

        registry
            .execute("sendgrid", || async { Err::<(), _>("down") })
            .await
            .unwrap_err();
        assert_eq!(registry.breaker("sendgrid").state(), CircuitState::Open);

        let value = registry
            .execute("twilio", || async { Ok::<_, &'static str>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let names: Vec<String> = registry.stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["sendgrid", "twilio"]);
    }

    #[tokio::test]
    async fn reset_by_name_and_all() {
        let registry = registry();
        registry
            .execute("sendgrid", || async { Err::<(), _>("down") })
            .await
            .unwrap_err();

        assert!(!registry.reset("unknown"));
        assert!(registry.reset("sendgrid"));
        assert_eq!(registry.breaker("sendgrid").state(), CircuitState::Closed);

        registry
            .execute("sendgrid", || async { Err::<(), _>("down") })
            .await
            .unwrap_err();
        registry.reset_all();
        assert_eq!(registry.breaker("sendgrid").state(), CircuitState::Closed);
    }
}
