//! Integration tests for the testing utilities module

use std::sync::Arc;
use std::time::Duration;

use instrumentor_common::testing::{MetricEvent, MockClock, RecordingMetricRegistry};
use instrumentor_common::MetricRegistry;

/// Validates that the recording registry logs mutations across metric kinds
/// in the order they happen.
#[test]
fn test_recording_registry_orders_events() {
    let clock = MockClock::new();
    let registry = RecordingMetricRegistry::with_clock(Arc::new(clock.clone()));

    let timer = registry.timer("svc.op").unwrap();
    let total = registry.meter("svc.op.total").unwrap();

    total.mark();
    let ctx = timer.time();
    clock.advance(Duration::from_millis(3));
    drop(ctx);

    assert_eq!(registry.event_lines(), vec!["svc.op.total mark(1)", "svc.op start", "svc.op stop"]);
    assert!(registry.events()[2].is_timer_stop("svc.op"));
}

/// Validates that reads are not recorded.
#[test]
fn test_reads_are_not_recorded() {
    let registry = RecordingMetricRegistry::new();
    let meter = registry.meter("m").unwrap();
    meter.mark();

    let _ = meter.count();
    let _ = meter.fifteen_minute_rate();

    assert_eq!(registry.events(), vec![MetricEvent::mark("m")]);
}

/// Validates prefix filtering of the event log.
#[test]
fn test_events_for_prefix() {
    let registry = RecordingMetricRegistry::new();
    registry.counter("a.inFlight").unwrap().inc();
    registry.counter("b.inFlight").unwrap().inc();

    let events = registry.events_for("a.");
    assert_eq!(events, vec![MetricEvent::counter("a.inFlight", 1)]);
}
