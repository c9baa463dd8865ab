//! Subscription log bookkeeping across the producer and harness layers.

use marble_core::harness::MarbleScheduler;
use marble_core::recorded::SubscriptionLog;
use marble_core::source::TestableSource;

use crate::init_tracing;

#[test]
fn test_completed_cold_stream_closes_its_subscription() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("a-b-|").unwrap();
    scheduler.expect_source(&source).to_be("a-b-|").unwrap();
    scheduler.flush().unwrap();

    assert_eq!(
        source.subscriptions(),
        vec![SubscriptionLog::closed(0, 40)]
    );
}

#[test]
fn test_subscription_diagrams_assert_the_log() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("a-b-|").unwrap();
    scheduler.expect_source(&source).to_be("a-b-|").unwrap();
    scheduler
        .expect_subscriptions(&source)
        .to_be(&["^---!"])
        .unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_forced_unsubscribe_shows_up_in_the_log() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_hot("--a--b--|").unwrap();
    scheduler
        .expect_source_when(&source, "----!")
        .unwrap()
        .to_be("--a")
        .unwrap();
    scheduler
        .expect_subscriptions(&source)
        .to_be(&["^---!"])
        .unwrap();
    scheduler.flush().unwrap();
}

#[test]
fn test_never_ending_stream_leaves_the_log_open() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_hot("--a--").unwrap();
    scheduler.expect_source(&source).to_be("--a--").unwrap();
    scheduler.flush().unwrap();

    assert_eq!(source.subscriptions(), vec![SubscriptionLog::open(0)]);
}

#[test]
fn test_snapshots_do_not_alias_the_live_log() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_cold("a|").unwrap();

    let before = source.subscriptions();
    assert!(before.is_empty());

    scheduler.expect_source(&source).to_be("a|").unwrap();
    // The earlier snapshot is unaffected by the new subscription
    assert!(before.is_empty());
    assert_eq!(source.subscriptions().len(), 1);

    scheduler.flush().unwrap();
}

#[test]
fn test_log_indices_stay_stable_as_subscriptions_close() {
    init_tracing();
    let mut scheduler = MarbleScheduler::new();
    let source = scheduler.create_hot("--a--|").unwrap();

    scheduler
        .expect_source_when(&source, "-!")
        .unwrap()
        .to_be("-")
        .unwrap();
    scheduler.expect_source(&source).to_be("--a--|").unwrap();
    scheduler.flush().unwrap();

    assert_eq!(
        source.subscriptions(),
        vec![
            SubscriptionLog::closed(0, 10),
            SubscriptionLog::closed(0, 50),
        ]
    );
}
