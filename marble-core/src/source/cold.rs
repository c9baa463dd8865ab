//! Cold recorded producer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::recorded::{Recorded, SubscriptionLog};
use crate::scheduler::{TaskHandle, VirtualScheduler};

use super::{SharedSink, Source, SubscriptionHandle, TestableSource, deliver, end_open_subscriptions};

/// Recorded producer that replays its full script for every subscriber.
///
/// Script times are offsets from the subscription time: a subscriber joining
/// at virtual time 5 sees a `(10, x)` script event at time 15. A terminal
/// event closes every still-open subscription log entry at the absolute time
/// it fires.
#[derive(Clone)]
pub struct ColdProducer<T> {
    scheduler: VirtualScheduler,
    state: Rc<RefCell<ColdState<T>>>,
}

struct ColdState<T> {
    script: Vec<Recorded<T>>,
    subscriptions: Vec<SubscriptionLog>,
}

impl<T: Clone + 'static> ColdProducer<T> {
    /// Creates a cold producer over `script` on the shared `scheduler`.
    pub fn new(scheduler: VirtualScheduler, script: Vec<Recorded<T>>) -> Self {
        Self {
            scheduler,
            state: Rc::new(RefCell::new(ColdState {
                script,
                subscriptions: Vec::new(),
            })),
        }
    }
}

impl<T: Clone + 'static> Source<T> for ColdProducer<T> {
    fn subscribe(&self, sink: SharedSink<T>) -> SubscriptionHandle {
        let subscribed_at = self.scheduler.now();
        let mut tasks: Vec<TaskHandle> = Vec::new();
        let index;
        {
            let mut state = self.state.borrow_mut();
            state.subscriptions.push(SubscriptionLog::open(subscribed_at));
            index = state.subscriptions.len() - 1;

            for event in &state.script {
                let notification = event.notification.clone();
                let sink = Rc::clone(&sink);
                let producer_state = Rc::clone(&self.state);
                let clock = self.scheduler.clone();
                tasks.push(self.scheduler.schedule(event.time, move || {
                    let terminal = notification.is_terminal();
                    deliver(&notification, &sink);
                    if terminal {
                        end_open_subscriptions(
                            &mut producer_state.borrow_mut().subscriptions,
                            clock.now(),
                        );
                    }
                }));
            }
        }
        tracing::debug!(time = subscribed_at, index, "cold subscription opened");

        let state = Rc::clone(&self.state);
        let clock = self.scheduler.clone();
        SubscriptionHandle::new(move || {
            let now = clock.now();
            for task in &tasks {
                task.cancel();
            }
            let mut state = state.borrow_mut();
            if let Some(entry) = state.subscriptions.get_mut(index) {
                if entry.never_ends() {
                    *entry = SubscriptionLog::closed(entry.subscribe, now);
                }
            }
            tracing::debug!(time = now, index, "cold subscription closed");
        })
    }
}

impl<T: Clone + 'static> TestableSource<T> for ColdProducer<T> {
    fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.state.borrow().subscriptions.clone()
    }

    fn script(&self) -> Vec<Recorded<T>> {
        self.state.borrow().script.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorded::{MAX_TIME, Notification};
    use crate::source::test_support::CollectingSink;

    fn script() -> Vec<Recorded<char>> {
        vec![
            Recorded::new(10, Notification::scalar('x')),
            Recorded::new(30, Notification::Complete),
        ]
    }

    #[test]
    fn test_replays_script_relative_to_subscribe_time() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), script());

        let subscriber = producer.clone();
        let (sink, received) = CollectingSink::shared(&scheduler);
        scheduler.schedule(5, move || {
            subscriber.subscribe(sink);
        });

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            *received.borrow(),
            vec![
                Recorded::new(15, Notification::scalar('x')),
                Recorded::new(35, Notification::Complete),
            ]
        );
    }

    #[test]
    fn test_each_subscriber_gets_a_full_replay() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), script());

        let (first, first_received) = CollectingSink::shared(&scheduler);
        producer.subscribe(first);
        let subscriber = producer.clone();
        let (second, second_received) = CollectingSink::shared(&scheduler);
        scheduler.schedule(100, move || {
            subscriber.subscribe(second);
        });

        scheduler.advance_to(MAX_TIME);
        assert_eq!(first_received.borrow()[0].time, 10);
        assert_eq!(second_received.borrow()[0].time, 110);
    }

    #[test]
    fn test_subscription_log_tracks_lifecycle() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), Vec::<Recorded<char>>::new());

        scheduler.advance_to(42);
        let (sink, _received) = CollectingSink::shared(&scheduler);
        let handle = producer.subscribe(sink);
        assert_eq!(producer.subscriptions(), vec![SubscriptionLog::open(42)]);

        scheduler.advance_to(50);
        handle.unsubscribe();
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(42, 50)]
        );
    }

    #[test]
    fn test_terminal_event_closes_open_subscriptions_at_absolute_time() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), script());

        scheduler.advance_to(5);
        let (sink, _received) = CollectingSink::shared(&scheduler);
        producer.subscribe(sink);

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(5, 35)]
        );
    }

    #[test]
    fn test_unsubscribe_cancels_pending_deliveries() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), script());

        let (sink, received) = CollectingSink::shared(&scheduler);
        let handle = producer.subscribe(sink);

        scheduler.advance_to(20);
        handle.unsubscribe();
        assert!(handle.is_unsubscribed());
        scheduler.advance_to(MAX_TIME);

        // The value at 10 arrived, the completion at 30 did not
        assert_eq!(
            *received.borrow(),
            vec![Recorded::new(10, Notification::scalar('x'))]
        );
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(0, 20)]
        );
    }

    #[test]
    fn test_unsubscribe_twice_is_a_noop() {
        let scheduler = VirtualScheduler::new();
        let producer = ColdProducer::new(scheduler.clone(), Vec::<Recorded<char>>::new());
        let (sink, _received) = CollectingSink::shared(&scheduler);
        let handle = producer.subscribe(sink);

        handle.unsubscribe();
        scheduler.advance_to(7);
        handle.unsubscribe();
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(0, 0)]
        );
    }
}
