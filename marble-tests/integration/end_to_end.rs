//! End-to-end scenarios exercising the full parse, schedule, record and
//! compare pipeline.

use std::collections::HashMap;

use marble_core::harness::{MarbleError, MarbleScheduler};
use marble_core::recorded::Value;
use marble_core::source::TestableSource;

use crate::init_tracing;

#[test]
fn test_cold_diagram_round_trips_through_flush() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("a-b-c-|").unwrap();
    scheduler.expect_source(&source).to_be("a-b-c-|").unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_hot_diagram_round_trips_through_flush() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_hot("--a---b--|").unwrap();
    scheduler.expect_source(&source).to_be("--a---b--|").unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_empty_and_silent_sources() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();

    let empty = scheduler.create_cold("|").unwrap();
    scheduler.expect_source(&empty).to_be("|").unwrap();

    let silent = scheduler.create_cold("---").unwrap();
    scheduler.expect_source(&silent).to_be("-").unwrap();

    scheduler.flush().unwrap();
}

#[test]
fn test_grouped_emission_with_completion() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("(h|)").unwrap();
    scheduler.expect_source(&source).to_be("(h|)").unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_value_maps_and_error_causes() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let values = HashMap::from([
        ('a', Value::Scalar("alpha")),
        ('b', Value::Scalar("beta")),
    ]);
    let source = scheduler
        .create_cold_with("--a---b--#", &values, Some("boom"))
        .unwrap();
    // Error causes never take part in the comparison
    scheduler
        .expect_source(&source)
        .to_be_with("--a---b--#", &values, Some("entirely different"))
        .unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_nested_timeline_round_trip() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();

    let inner = scheduler.create_cold("x-y|").unwrap();
    let values = HashMap::from([('a', Value::Timeline(inner.script()))]);

    let outer = scheduler.create_cold_with("-a-|", &values, None).unwrap();
    scheduler
        .expect_source(&outer)
        .to_be_with("-a-|", &values, None)
        .unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_failure_report_is_diagnosable_without_rerunning() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("--x--|").unwrap();
    scheduler.expect_source(&source).to_be("--y--|").unwrap();

    let error = scheduler.flush().unwrap_err();
    let MarbleError::StreamMismatch { report, caller } = &error else {
        panic!("expected a stream mismatch, got {error}");
    };
    assert!(report.contains("+ next('x') @20"));
    assert!(report.contains("- next('y') @20"));
    assert!(caller.contains("end_to_end.rs"));
}

#[test]
fn test_several_expectations_settle_in_registration_order() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();

    let first = scheduler.create_cold("a|").unwrap();
    let second = scheduler.create_cold("-b|").unwrap();
    scheduler.expect_source(&first).to_be("a|").unwrap();
    scheduler.expect_source(&second).to_be("--b|").unwrap();

    // The first expectation passes, the second fails and is reported
    let error = scheduler.flush().unwrap_err();
    assert!(error.to_string().contains("next('b')"));
}

#[test]
fn test_measuring_durations_with_create_time() {
    init_tracing();
    let scheduler = MarbleScheduler::new();
    assert_eq!(scheduler.create_time("-----|").unwrap(), 50);
}
