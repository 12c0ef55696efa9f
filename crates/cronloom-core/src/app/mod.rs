//! App - アプリケーション層
//!
//! ports を組み合わせてポーリングループを実装します。
//!
//! # 主要コンポーネント
//! - **RunnerBuilder**: 構築と設定検証
//! - **Runner**: claim → run → reschedule のループ
//! - **Progress**: 実行中タスクのリース延長

pub mod builder;
pub mod config;
pub mod progress;
pub mod runner;

pub use self::builder::RunnerBuilder;
pub use self::config::{MAX_DURATION_MS, RunnerConfig};
pub use self::progress::Progress;
pub use self::runner::Runner;
