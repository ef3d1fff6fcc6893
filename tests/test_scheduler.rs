
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use optchain_sampler::model::quote::Price;
use optchain_sampler::run::clock::{Cutoff, parse_timezone};
use optchain_sampler::run::scheduler::{
    Controller, ControllerState, Schedule, Shutdown, Step, StopReason,
};
use optchain_sampler::sink::CsvSink;

use mock_common::*;

fn schedule(once: bool) -> Schedule {
    Schedule {
        interval: Duration::ZERO,
        cutoff: cutoff(),
        once,
    }
}

fn healthy() -> (MockIndex, MockTable) {
    (
        MockIndex::new(Price::Available(100_000.0)),
        MockTable::new(Price::Available(100_020.0)),
    )
}

// ── Stop condition ──────────────────────────────────────────────────

#[tokio::test]
async fn stops_at_cutoff_without_sampling() {
    let (index, table) = healthy();
    let (aggregator, index_calls, table_calls) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(8, 9, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    let step = controller.step().await.unwrap();

    assert_eq!(step, Step::Stopped(StopReason::Cutoff));
    assert_eq!(controller.state(), ControllerState::Stopped(StopReason::Cutoff));
    assert_eq!(index_calls.count(), 0);
    assert_eq!(table_calls.count(), 0);
    assert!(controller.sink().rows.is_empty());
}

#[tokio::test]
async fn samples_once_a_minute_before_cutoff_then_stops() {
    let (index, table) = healthy();
    let (aggregator, index_calls, table_calls) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(8, 8, 0), utc(8, 9, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Cutoff);
    assert_eq!(index_calls.count(), 1);
    assert_eq!(table_calls.count(), 1);
    assert_eq!(controller.sink().rows.len(), 1);
    assert_eq!(controller.sink().rows[0].timestamp, utc(8, 8, 0));
}

#[tokio::test]
async fn stopped_controller_does_not_restart() {
    let (index, table) = healthy();
    let (aggregator, index_calls, _) = aggregator(index, table);
    // Past the stop window again on the next check.
    let clock = ScriptedClock::new(&[utc(8, 9, 0), utc(9, 30, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    controller.step().await.unwrap();
    let step = controller.step().await.unwrap();

    assert_eq!(step, Step::Stopped(StopReason::Cutoff));
    assert_eq!(index_calls.count(), 0);
}

#[tokio::test]
async fn stops_when_cutoff_passes_between_checks() {
    let (index, table) = healthy();
    let (aggregator, index_calls, _) = aggregator(index, table);
    let schedule = Schedule {
        interval: Duration::ZERO,
        cutoff: Cutoff {
            at: "23:59".parse().unwrap(),
            timezone: parse_timezone("UTC").unwrap(),
        },
        once: false,
    };
    let next_day = Utc.with_ymd_and_hms(2025, 8, 2, 0, 0, 10).unwrap();
    let clock = ScriptedClock::new(&[utc(23, 58, 30), next_day]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule);

    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Cutoff);
    assert_eq!(index_calls.count(), 1);
    assert_eq!(controller.sink().rows.len(), 1);
}

#[tokio::test]
async fn slow_round_past_the_stop_hour_still_stops() {
    let (index, table) = healthy();
    let (aggregator, index_calls, _) = aggregator(index, table);
    // 04:05 EDT, then 05:10 EDT after a long round.
    let clock = ScriptedClock::new(&[utc(8, 5, 0), utc(9, 10, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Cutoff);
    assert_eq!(index_calls.count(), 1);
}

// ── Failure policy ──────────────────────────────────────────────────

#[tokio::test]
async fn failed_rounds_are_retried_until_cutoff() {
    let (aggregator, index_calls, _) = aggregator(
        MockIndex::new(Price::Unavailable),
        MockTable::new(Price::Available(100_000.0)),
    );
    let clock = ScriptedClock::new(&[utc(8, 7, 0), utc(8, 7, 30), utc(8, 8, 0), utc(8, 9, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Cutoff);
    assert_eq!(index_calls.count(), 3);
    assert_eq!(controller.stats().skipped, 3);
    assert_eq!(controller.stats().sampled, 0);
    assert!(controller.sink().rows.is_empty());
}

#[tokio::test]
async fn skipped_round_keeps_running() {
    let (aggregator, _, _) = aggregator(
        MockIndex::new(Price::Available(100_000.0)),
        MockTable::new(Price::Unavailable),
    );
    let clock = ScriptedClock::new(&[utc(12, 0, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false));

    assert_eq!(controller.step().await.unwrap(), Step::Skipped);
    assert_eq!(controller.state(), ControllerState::Running);
}

#[tokio::test]
async fn sink_failure_is_fatal() {
    let (index, table) = healthy();
    let (aggregator, _, _) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(12, 0, 0)]);
    let mut controller = Controller::new(aggregator, FailingSink, clock, schedule(false));

    let err = controller.run().await.unwrap_err();
    assert!(err.to_string().contains("disk full"));
}

// ── Modes and interrupts ────────────────────────────────────────────

#[tokio::test]
async fn once_mode_writes_a_single_row() {
    let (index, table) = healthy();
    let (aggregator, _, _) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(12, 0, 0)]);
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(true));

    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Once);
    assert_eq!(controller.stats().sampled, 1);
    assert_eq!(controller.sink().rows.len(), 1);
}

#[tokio::test]
async fn interrupt_stops_before_sampling() {
    let (index, table) = healthy();
    let (aggregator, index_calls, _) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(12, 0, 0)]);
    let shutdown = Arc::new(Shutdown::default());
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule(false))
        .with_shutdown(Arc::clone(&shutdown));

    shutdown.request();
    let reason = controller.run().await.unwrap();

    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(index_calls.count(), 0);
}

#[tokio::test]
async fn interrupt_cuts_the_pause_short() {
    let (index, table) = healthy();
    let (aggregator, _, _) = aggregator(index, table);
    let clock = ScriptedClock::new(&[utc(12, 0, 0)]);
    let shutdown = Arc::new(Shutdown::default());
    let schedule = Schedule {
        interval: Duration::from_secs(3600),
        cutoff: cutoff(),
        once: false,
    };
    let mut controller = Controller::new(aggregator, MemorySink::default(), clock, schedule)
        .with_shutdown(Arc::clone(&shutdown));

    let interrupter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request();
    });

    let reason = tokio::time::timeout(Duration::from_secs(5), controller.run())
        .await
        .expect("controller should stop promptly")
        .unwrap();
    interrupter.await.unwrap();

    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(controller.sink().rows.len(), 1);
}

// ── CSV log ─────────────────────────────────────────────────────────

#[tokio::test]
async fn two_runs_share_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comparison.csv");

    for second in [0, 30] {
        let (index, table) = healthy();
        let (aggregator, _, _) = aggregator(index, table);
        let sink = CsvSink::open(&path, aggregator.layout().clone()).unwrap();
        let clock = ScriptedClock::new(&[utc(12, 0, second)]);
        let mut controller = Controller::new(aggregator, sink, clock, schedule(true));
        controller.run().await.unwrap();
    }

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp,")).count(), 1);

    let header_width = lines[0].split(',').count();
    assert_eq!(header_width, 1 + 2 + 2 * STRIKES.len());
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), header_width);
    }
    assert!(lines[1].starts_with("2025-08-01 12:00:00,100020,100000,1230.00,"));
}
