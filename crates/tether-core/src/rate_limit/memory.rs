//! In-memory fallback windows, used while the store is unavailable.
//!
//! プロセスごとのカウンタなので、複数インスタンス間では共有されない。
//! ストア障害中の最善努力としての制限であり、セキュリティ境界ではない。

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use super::config::ChannelLimit;
use super::window::{self, DecisionSource, RateDecision};

#[derive(Debug, Default)]
struct MemoryWindow {
    timestamps: Vec<i64>,
    window_ms: u64,
}

impl MemoryWindow {
    fn is_stale(&self, now_ms: i64) -> bool {
        let cutoff = now_ms - self.window_ms as i64;
        self.timestamps.iter().all(|&ts| ts <= cutoff)
    }
}

#[derive(Debug)]
pub struct MemoryWindows {
    windows: Mutex<HashMap<String, MemoryWindow>>,
    cleanup_threshold: usize,
}

impl MemoryWindows {
    pub fn new(cleanup_threshold: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            cleanup_threshold,
        }
    }

    pub fn check(&self, key: &str, limit: ChannelLimit, now_ms: i64) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > self.cleanup_threshold {
            let before = windows.len();
            windows.retain(|_, window| !window.is_stale(now_ms));
            debug!(
                dropped = before - windows.len(),
                kept = windows.len(),
                "swept stale in-memory rate windows"
            );
        }

        let window = windows.entry(key.to_string()).or_default();
        window.window_ms = limit.window_ms;
        window::admit(&mut window.timestamps, limit, now_ms, DecisionSource::Memory)
    }

    pub fn remove(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_limited_independently() {
        let windows = MemoryWindows::new(100);
        let limit = ChannelLimit::new(1_000, 1);

        assert!(windows.check("sms:a", limit, 0).allowed);
        assert!(!windows.check("sms:a", limit, 10).allowed);
        assert!(windows.check("sms:b", limit, 10).allowed);
    }

    #[test]
    fn stale_windows_are_swept_past_the_threshold() {
        let windows = MemoryWindows::new(2);
        let limit = ChannelLimit::new(1_000, 5);

        windows.check("a", limit, 0);
        windows.check("b", limit, 0);
        windows.check("c", limit, 0);
        assert_eq!(windows.len(), 3);

        // 次の check で a, b, c は期限切れとして掃除される
        windows.check("d", limit, 5_000);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn remove_forgets_the_window() {
        let windows = MemoryWindows::new(10);
        let limit = ChannelLimit::new(1_000, 1);
        windows.check("k", limit, 0);
        windows.remove("k");
        assert!(windows.check("k", limit, 1).allowed);
    }
}
