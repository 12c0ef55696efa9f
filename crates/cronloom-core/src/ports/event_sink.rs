//! EventSink port - 観測イベントの送り先
//!
//! - `NoopEventSink`: 何もしない（デフォルト）
//! - `TracingEventSink`: tracing のログとして出す
//! - `ChannelEventSink`: tokio の mpsc に流す

use tokio::sync::mpsc;

use crate::domain::RunnerEvent;

/// Receives task lifecycle events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunnerEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: RunnerEvent) {}
}

/// Re-emits events as log records under the `cronloom::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: RunnerEvent) {
        match event {
            RunnerEvent::TaskStarted { task_id } => {
                tracing::info!(target: "cronloom::events", %task_id, "task started");
            }
            RunnerEvent::TaskFinished { task_id } => {
                tracing::info!(target: "cronloom::events", %task_id, "task finished");
            }
            RunnerEvent::TaskError { task_id, error } => {
                tracing::error!(target: "cronloom::events", %task_id, %error, "task failed");
            }
        }
    }
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<RunnerEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunnerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: RunnerEvent) {
        // receiver may already be dropped
        let _ = self.tx.send(event);
    }
}
