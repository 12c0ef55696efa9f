//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。ストア・時刻・イベント出力を
//! trait で差し替え可能にします。

pub mod cas_backend;
pub mod clock;
pub mod event_sink;
pub mod task_store;

pub use self::cas_backend::CasBackend;
pub use self::clock::{Clock, FixedClock, SystemClock, TokioClock};
pub use self::event_sink::{ChannelEventSink, EventSink, NoopEventSink, TracingEventSink};
pub use self::task_store::TaskStore;
