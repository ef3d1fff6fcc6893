use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::engine::Aggregator;
use crate::model::snapshot::TIMESTAMP_FORMAT;
use crate::run::clock::{Clock, Cutoff};
use crate::sink::RowSink;

/// Why the controller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The daily stop time was reached.
    Cutoff,
    /// Operator interrupt.
    Interrupted,
    /// Single-round mode finished its round.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Stopped(StopReason),
}

/// Outcome of one controller cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A row was written.
    Sampled,
    /// The round failed and was skipped.
    Skipped,
    Stopped(StopReason),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundStats {
    pub sampled: u64,
    pub skipped: u64,
}

/// Interrupt flag shared with the signal handler. Also wakes a sleeping
/// controller so an interrupt does not wait out the interval.
#[derive(Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Timing for the controller loop.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub cutoff: Cutoff,
    pub once: bool,
}

/// Runs the aggregator on a fixed interval until the stop condition.
///
/// `Running -> Running` per cycle, `Running -> Stopped` exactly once. Round
/// failures are logged and retried after the same interval with no backoff.
/// Only a sink failure escapes as an error.
pub struct Controller<C: Clock, S: RowSink> {
    aggregator: Aggregator,
    sink: S,
    clock: C,
    schedule: Schedule,
    shutdown: Arc<Shutdown>,
    state: ControllerState,
    stats: RoundStats,
    last_check: Option<DateTime<Utc>>,
}

impl<C: Clock, S: RowSink> Controller<C, S> {
    pub fn new(aggregator: Aggregator, sink: S, clock: C, schedule: Schedule) -> Self {
        Controller {
            aggregator,
            sink,
            clock,
            schedule,
            shutdown: Arc::new(Shutdown::default()),
            state: ControllerState::Running,
            stats: RoundStats::default(),
            last_check: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Arc<Shutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> RoundStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn stop(&mut self, reason: StopReason) -> Step {
        self.state = ControllerState::Stopped(reason);
        Step::Stopped(reason)
    }

    /// One cycle: check the stop condition, otherwise sample and write.
    pub async fn step(&mut self) -> Result<Step> {
        if let ControllerState::Stopped(reason) = self.state {
            return Ok(Step::Stopped(reason));
        }
        if self.shutdown.is_requested() {
            info!("Interrupted, exiting.");
            return Ok(self.stop(StopReason::Interrupted));
        }

        let now = self.clock.now();
        let since = self.last_check.replace(now);
        if self.schedule.cutoff.passed(since, now) {
            info!(cutoff = %self.schedule.cutoff, "Reached stop time, exiting.");
            return Ok(self.stop(StopReason::Cutoff));
        }

        match self.aggregator.sample_once(now).await {
            Ok(row) => {
                self.sink.append(&row)?;
                self.stats.sampled += 1;
                info!(
                    "[{}] Logged. {} {}: ${:.2} | {} {}: ${:.2}",
                    row.timestamp.format(TIMESTAMP_FORMAT),
                    self.aggregator.layout().table_venue,
                    self.aggregator.layout().underlying,
                    row.table_spot,
                    self.aggregator.layout().index_venue,
                    self.aggregator.layout().underlying,
                    row.index_spot,
                );
                if row.unavailable_count() > 0 {
                    warn!(
                        missing = row.unavailable_count(),
                        "row written with unavailable option prices"
                    );
                }
                Ok(Step::Sampled)
            }
            Err(failure) => {
                self.stats.skipped += 1;
                warn!(error = %failure, "round skipped");
                Ok(Step::Skipped)
            }
        }
    }

    /// Cycle until stopped. Sleeps the interval after every round, successful
    /// or not.
    pub async fn run(&mut self) -> Result<StopReason> {
        loop {
            if let Step::Stopped(reason) = self.step().await? {
                return Ok(reason);
            }
            if self.schedule.once {
                self.stop(StopReason::Once);
                return Ok(StopReason::Once);
            }
            self.pause().await;
        }
    }

    async fn pause(&self) {
        if self.shutdown.is_requested() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.schedule.interval) => {}
            _ = self.shutdown.notify.notified() => {}
        }
    }
}
