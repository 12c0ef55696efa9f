use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cronloom_core::impls::InMemoryTaskStore;
use cronloom_core::ports::TracingEventSink;
use cronloom_core::{Progress, Runner, RunnerConfig, RunnerError, Task, TaskError};

/// 一定間隔で「仕事」をするだけのタスク
struct Heartbeat {
    id: &'static str,
    every: Duration,
    work: std::time::Duration,
}

#[async_trait]
impl Task for Heartbeat {
    fn task_id(&self) -> &str {
        self.id
    }

    async fn run(&self, progress: Progress) -> Result<(), TaskError> {
        // 長めの仕事は途中で progress を報告してリースを延ばす
        for _ in 0..4 {
            sleep(self.work / 4).await;
            progress.report().await;
        }
        info!(task_id = self.id, "beat");
        Ok(())
    }

    fn next_time(&self) -> Result<DateTime<Utc>, TaskError> {
        Ok(Utc::now() + self.every)
    }
}

/// 最初の数回は失敗し、短い間隔でリトライされるタスク
struct Flaky {
    remaining_failures: AtomicU32,
}

#[async_trait]
impl Task for Flaky {
    fn task_id(&self) -> &str {
        "flaky"
    }

    async fn run(&self, _progress: Progress) -> Result<(), TaskError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(TaskError::new(format!("intentional failure (left={left})")));
        }
        info!("flaky task finally succeeded");
        Ok(())
    }

    fn next_time(&self) -> Result<DateTime<Utc>, TaskError> {
        Ok(Utc::now() + Duration::seconds(3))
    }

    fn next_time_after_fail(&self) -> Result<DateTime<Utc>, TaskError> {
        Ok(Utc::now() + Duration::milliseconds(300))
    }
}

fn build_runner(store: &InMemoryTaskStore, config: &RunnerConfig) -> Result<Runner, RunnerError> {
    let runner = Runner::builder(Arc::new(store.clone()))
        .config(config.clone())
        .event_sink(Arc::new(TracingEventSink))
        .build()?;
    Ok(runner)
}

#[tokio::main]
async fn main() -> Result<(), RunnerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 共有ストアと設定（2 ランナー = 2 プロセスの模擬）
    let store = InMemoryTaskStore::new();
    let config =
        RunnerConfig::from_json_str(r#"{ "poll_interval_ms": 200, "lock_duration_ms": 2000 }"#)?;
    let runners = [build_runner(&store, &config)?, build_runner(&store, &config)?];

    // (B) 同じタスクを両方のランナーに登録（実行されるのはどちらか一方）
    let heartbeat: Arc<dyn Task> = Arc::new(Heartbeat {
        id: "heartbeat",
        every: Duration::seconds(1),
        work: std::time::Duration::from_millis(400),
    });
    let flaky: Arc<dyn Task> = Arc::new(Flaky {
        remaining_failures: AtomicU32::new(2),
    });
    let tasks = [(heartbeat, 5), (flaky, 1)];
    for runner in &runners {
        runner.init().await?;
        for (task, priority) in &tasks {
            runner.register_task(Arc::clone(task), *priority).await?;
        }
    }

    // (C) ポーリング開始
    for runner in &runners {
        runner.start_triggering_tasks();
    }

    // (D) 一定時間または Ctrl-C まで動かす
    tokio::select! {
        _ = sleep(std::time::Duration::from_secs(5)) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    // (E) 実行中のタスクを待ってから止める
    for runner in &runners {
        runner.stop_triggering_tasks().await;
    }
    for record in store.records().await {
        info!(
            task_id = %record.id,
            priority = record.priority,
            run_since = %record.run_since,
            last_run_at = ?record.last_run_at,
            "final record"
        );
    }
    Ok(())
}
