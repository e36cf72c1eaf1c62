//! Observability - ログ初期化とキューの状態スナップショット
//!
//! ログは `tracing` のマクロで構造化フィールド付きで出す。
//! 購読者（subscriber）の設定はバイナリ側で一度だけ `init_tracing` を呼ぶ。

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Length of the pending list (leased ids included until completed).
    pub pending: usize,
    /// Lease keys currently listed by the store.
    pub leased: usize,
}

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_level`.
///
/// Returns `false` when a global subscriber was already installed; that is
/// not an error, the existing one keeps receiving events.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(default_level, "tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialization_is_harmless() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("info"));
    }

    #[test]
    fn counts_serialize_flat() {
        let counts = QueueCounts {
            pending: 3,
            leased: 1,
        };
        assert_eq!(
            serde_json::to_value(counts).unwrap(),
            serde_json::json!({"pending": 3, "leased": 1})
        );
    }
}
