//! Cold and hot producer behavior driven through the public traits, the way
//! a host-library adapter would sit on the boundary.

use std::cell::RefCell;
use std::rc::Rc;

use marble_core::recorded::{MAX_TIME, Notification, Recorded, Value};
use marble_core::scheduler::VirtualScheduler;
use marble_core::source::{ColdProducer, HotProducer, SharedSink, Sink, Source, TestableSource};

use crate::init_tracing;

/// Minimal external sink, standing in for a host-library subscriber.
struct AdapterSink {
    clock: VirtualScheduler,
    seen: Rc<RefCell<Vec<Recorded<char>>>>,
}

impl AdapterSink {
    fn shared(clock: &VirtualScheduler) -> (SharedSink<char>, Rc<RefCell<Vec<Recorded<char>>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink: SharedSink<char> = Rc::new(RefCell::new(AdapterSink {
            clock: clock.clone(),
            seen: Rc::clone(&seen),
        }));
        (sink, seen)
    }

    fn record(&mut self, notification: Notification<char>) {
        let now = self.clock.now();
        self.seen.borrow_mut().push(Recorded::new(now, notification));
    }
}

impl Sink<char> for AdapterSink {
    fn on_next(&mut self, value: Value<char>) {
        self.record(Notification::Next(value));
    }

    fn on_error(&mut self, cause: String) {
        self.record(Notification::Error(cause));
    }

    fn on_complete(&mut self) {
        self.record(Notification::Complete);
    }
}

fn script() -> Vec<Recorded<char>> {
    vec![Recorded::new(10, Notification::scalar('x'))]
}

#[test]
fn test_cold_replays_relative_to_each_subscriber() {
    init_tracing();
    let scheduler = VirtualScheduler::new();
    let producer = ColdProducer::new(scheduler.clone(), script());

    let (sink, seen) = AdapterSink::shared(&scheduler);
    let subscriber = producer.clone();
    scheduler.schedule(5, move || {
        subscriber.subscribe(sink);
    });

    scheduler.advance_to(MAX_TIME);
    assert_eq!(
        *seen.borrow(),
        vec![Recorded::new(15, Notification::scalar('x'))]
    );
}

#[test]
fn test_hot_plays_once_on_the_shared_timeline() {
    init_tracing();
    let scheduler = VirtualScheduler::new();
    let producer = HotProducer::new(scheduler.clone(), script());

    let (early_sink, early_seen) = AdapterSink::shared(&scheduler);
    let early = producer.clone();
    scheduler.schedule(5, move || {
        early.subscribe(early_sink);
    });

    let (late_sink, late_seen) = AdapterSink::shared(&scheduler);
    let late = producer.clone();
    scheduler.schedule(11, move || {
        late.subscribe(late_sink);
    });

    scheduler.advance_to(MAX_TIME);
    assert_eq!(
        *early_seen.borrow(),
        vec![Recorded::new(10, Notification::scalar('x'))]
    );
    assert!(late_seen.borrow().is_empty());
}

#[test]
fn test_unsubscribing_mid_stream_keeps_earlier_records() {
    init_tracing();
    let scheduler = VirtualScheduler::new();
    let producer = ColdProducer::new(
        scheduler.clone(),
        vec![
            Recorded::new(10, Notification::scalar('a')),
            Recorded::new(30, Notification::scalar('b')),
            Recorded::new(40, Notification::Complete),
        ],
    );

    let (sink, seen) = AdapterSink::shared(&scheduler);
    let handle = producer.subscribe(sink);
    let disposer = handle.clone();
    scheduler.schedule(20, move || disposer.unsubscribe());

    scheduler.advance_to(MAX_TIME);
    assert_eq!(
        *seen.borrow(),
        vec![Recorded::new(10, Notification::scalar('a'))]
    );
    assert!(handle.is_unsubscribed());
}

#[test]
fn test_subscribing_the_same_producer_many_times() {
    init_tracing();
    let scheduler = VirtualScheduler::new();
    let producer = ColdProducer::new(scheduler.clone(), script());

    let (first, first_seen) = AdapterSink::shared(&scheduler);
    producer.subscribe(first);
    let (second, second_seen) = AdapterSink::shared(&scheduler);
    producer.subscribe(second);

    scheduler.advance_to(MAX_TIME);
    assert_eq!(first_seen.borrow().len(), 1);
    assert_eq!(second_seen.borrow().len(), 1);
    assert_eq!(producer.subscriptions().len(), 2);
}

#[test]
fn test_two_identical_runs_record_identical_timelines() {
    init_tracing();
    let run = || {
        let scheduler = VirtualScheduler::new();
        let producer = HotProducer::new(
            scheduler.clone(),
            vec![
                Recorded::new(10, Notification::scalar('a')),
                Recorded::new(10, Notification::scalar('b')),
                Recorded::new(20, Notification::Complete),
            ],
        );
        let (sink, seen) = AdapterSink::shared(&scheduler);
        producer.subscribe(sink);
        scheduler.advance_to(MAX_TIME);
        let result = seen.borrow().clone();
        result
    };

    assert_eq!(run(), run());
}
