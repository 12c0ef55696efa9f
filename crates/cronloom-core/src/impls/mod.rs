//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: 開発用・テスト用の正本（`TaskStore` / `CasBackend`）
//! - **CasTaskStore**: `CasBackend` 上で原子的 claim を模擬する `TaskStore`

pub mod cas_store;
pub mod inmem_store;

pub use self::cas_store::{CasTaskStore, DEFAULT_MAX_CLAIM_ATTEMPTS};
pub use self::inmem_store::InMemoryTaskStore;
