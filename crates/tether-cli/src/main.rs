use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::info;

use tether_core::app::{HandlerError, WorkerGroup};
use tether_core::domain::{Task, WorkerId};
use tether_core::impls::InMemoryStore;
use tether_core::{HubBuilder, TaskHandler, TetherConfig, TetherError, WorkerLoop, init_tracing};

#[derive(Debug, Deserialize)]
struct GreetPayload {
    name: String,
    #[serde(default)]
    fail: bool,
}

struct GreetHandler;

#[async_trait]
impl TaskHandler for GreetHandler {
    async fn handle(&self, task: &Task) -> Result<serde_json::Value, HandlerError> {
        let p: GreetPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| HandlerError(format!("json decode: {e}")))?;
        if p.fail {
            return Err(HandlerError(format!("refusing to greet {}", p.name)));
        }
        sleep(Duration::from_millis(20)).await;
        Ok(serde_json::json!(format!("Hello, {}!", p.name)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // (A) 設定（引数のパス → TETHER_CONFIG → デフォルト）とログ
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = TetherConfig::load(path.as_deref())?;
    init_tracing(&config.log_level);

    let hub = HubBuilder::new()
        .store(Arc::new(InMemoryStore::default()))
        .config(config)
        .build()?;

    // (B) タスク投入
    let names = ["ada", "grace", "linus", "barbara", "ken"];
    let mut ids = Vec::new();
    for name in names {
        let payload = serde_json::json!({ "name": name, "fail": name == "ken" });
        ids.push(hub.enqueue(None, payload).await?.task_id);
    }
    info!(enqueued = ids.len(), "tasks enqueued");

    // (C) ワーカー 3 本
    let workers = (0..3)
        .map(|i| {
            WorkerLoop::new(
                hub.queue().clone(),
                Arc::new(GreetHandler),
                WorkerId::new(format!("worker-{i}")),
            )
            .with_lease_secs(30)
            .with_idle_interval(Duration::from_millis(25))
        })
        .collect();
    let group = WorkerGroup::spawn(workers);

    // (D) 結果が揃うまでポーリング
    let mut remaining = ids.clone();
    while !remaining.is_empty() {
        let mut still_waiting = Vec::new();
        for id in remaining {
            match hub.result(id.as_str()).await {
                Ok(result) => println!("{id}: {}", serde_json::to_string(&result)?),
                Err(e) if e.is_not_found() => still_waiting.push(id),
                Err(e) => return Err(e.into()),
            }
        }
        remaining = still_waiting;
        sleep(Duration::from_millis(50)).await;
    }
    let report = group.shutdown_and_join().await;
    println!("workers: {report:?}, counts: {:?}", hub.counts().await?);

    // (E) レート制限: デフォルトは 60 件 / 分なので 3 件だけ見る
    for _ in 0..3 {
        let decision = hub.check_rate_limit("sms", "+15550100").await;
        println!("rate limit: {}", serde_json::to_string(&decision)?);
    }

    // (F) 落ちている依存先に対するブレーカー
    let threshold = hub.config().circuit_breaker.config_for("flaky-provider").failure_threshold;
    for attempt in 0..=threshold {
        let outcome = hub
            .execute("flaky-provider", || async {
                Err::<(), TetherError>(TetherError::Validation("provider returned 503".into()))
            })
            .await;
        if let Err(e) = outcome {
            match e.into_operation() {
                Some(cause) => println!("call {attempt}: provider failed: {cause}"),
                None => println!("call {attempt}: rejected, circuit open"),
            }
        }
    }
    println!("breakers: {}", serde_json::to_string_pretty(&hub.circuit_stats())?);

    Ok(())
}
