//! Test doubles shared by the runner tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::Progress;
use crate::domain::TaskError;
use crate::ports::{Clock, TokioClock};
use crate::task::Task;

/// One finished `run` call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `next_time` reads seen when this run began.
    pub next_time_reads: usize,
}

/// Configurable task that records how it was driven.
///
/// Defaults: runs 300ms, next time 1500ms after start, retry 60ms after a
/// failure.
pub(crate) struct MockTask {
    id: String,
    clock: TokioClock,
    run_for: Duration,
    period: chrono::Duration,
    retry_after: chrono::Duration,
    fail_first: usize,
    fail_next_time: bool,
    panic_in_run: bool,
    progress_every: Option<Duration>,

    pub runs: AtomicUsize,
    pub next_time_calls: AtomicUsize,
    pub after_fail_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl MockTask {
    pub fn new(id: &str, clock: TokioClock) -> Self {
        Self {
            id: id.to_string(),
            clock,
            run_for: Duration::from_millis(300),
            period: chrono::Duration::milliseconds(1500),
            retry_after: chrono::Duration::milliseconds(60),
            fail_first: 0,
            fail_next_time: false,
            panic_in_run: false,
            progress_every: None,
            runs: AtomicUsize::new(0),
            next_time_calls: AtomicUsize::new(0),
            after_fail_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn run_for(mut self, ms: u64) -> Self {
        self.run_for = Duration::from_millis(ms);
        self
    }

    pub fn period(mut self, ms: i64) -> Self {
        self.period = chrono::Duration::milliseconds(ms);
        self
    }

    pub fn fail_first(mut self, runs: usize) -> Self {
        self.fail_first = runs;
        self
    }

    pub fn fail_next_time(mut self) -> Self {
        self.fail_next_time = true;
        self
    }

    pub fn panic_in_run(mut self) -> Self {
        self.panic_in_run = true;
        self
    }

    pub fn progress_every(mut self, ms: u64) -> Self {
        self.progress_every = Some(Duration::from_millis(ms));
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Task for MockTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    async fn run(&self, progress: Progress) -> Result<(), TaskError> {
        let run_no = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);
        let start = self.clock.now();
        let next_time_reads = self.next_time_calls.load(Ordering::SeqCst);

        if self.panic_in_run {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("boom");
        }

        match self.progress_every {
            Some(step) => {
                let mut remaining = self.run_for;
                while remaining > step {
                    tokio::time::sleep(step).await;
                    remaining -= step;
                    progress.report().await;
                }
                tokio::time::sleep(remaining).await;
            }
            None => tokio::time::sleep(self.run_for).await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            start,
            end: self.clock.now(),
            next_time_reads,
        });

        if run_no <= self.fail_first {
            return Err(TaskError::new("someError"));
        }
        Ok(())
    }

    fn next_time(&self) -> Result<DateTime<Utc>, TaskError> {
        self.next_time_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_time {
            return Err(TaskError::new("schedule unavailable"));
        }
        Ok(self.clock.now() + self.period)
    }

    fn next_time_after_fail(&self) -> Result<DateTime<Utc>, TaskError> {
        self.after_fail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.clock.now() + self.retry_after)
    }
}
