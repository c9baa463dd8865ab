//! Hot recorded producer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::recorded::{Recorded, SubscriptionLog};
use crate::scheduler::VirtualScheduler;

use super::{SharedSink, Source, SubscriptionHandle, TestableSource, deliver, end_open_subscriptions};

/// Recorded producer that plays its script once, on the shared timeline.
///
/// The whole script is scheduled at construction. Each firing fans out to a
/// snapshot of the sinks attached at that moment, so a subscriber joining at
/// virtual time 11 never sees the event at time 10, and equal-time races
/// between a join and a delivery resolve in scheduling order.
#[derive(Clone)]
pub struct HotProducer<T> {
    scheduler: VirtualScheduler,
    state: Rc<RefCell<HotState<T>>>,
}

struct HotState<T> {
    script: Vec<Recorded<T>>,
    sinks: Vec<(u64, SharedSink<T>)>,
    next_sink_id: u64,
    subscriptions: Vec<SubscriptionLog>,
}

impl<T: Clone + 'static> HotProducer<T> {
    /// Creates a hot producer over `script`, scheduling every event on
    /// `scheduler` immediately.
    pub fn new(scheduler: VirtualScheduler, script: Vec<Recorded<T>>) -> Self {
        let state = Rc::new(RefCell::new(HotState {
            script: script.clone(),
            sinks: Vec::new(),
            next_sink_id: 0,
            subscriptions: Vec::new(),
        }));

        for event in script {
            let state = Rc::clone(&state);
            let clock = scheduler.clone();
            scheduler.schedule(event.time, move || {
                // Snapshot at fire time, not schedule time
                let sinks: Vec<SharedSink<T>> = state
                    .borrow()
                    .sinks
                    .iter()
                    .map(|(_, sink)| Rc::clone(sink))
                    .collect();
                let terminal = event.notification.is_terminal();
                for sink in &sinks {
                    deliver(&event.notification, sink);
                }
                if terminal {
                    end_open_subscriptions(&mut state.borrow_mut().subscriptions, clock.now());
                }
            });
        }

        Self { scheduler, state }
    }
}

impl<T: Clone + 'static> Source<T> for HotProducer<T> {
    fn subscribe(&self, sink: SharedSink<T>) -> SubscriptionHandle {
        let subscribed_at = self.scheduler.now();
        let (index, sink_id) = {
            let mut state = self.state.borrow_mut();
            let sink_id = state.next_sink_id;
            state.next_sink_id += 1;
            state.sinks.push((sink_id, Rc::clone(&sink)));
            state.subscriptions.push(SubscriptionLog::open(subscribed_at));
            (state.subscriptions.len() - 1, sink_id)
        };
        tracing::debug!(time = subscribed_at, index, "hot subscription opened");

        let state = Rc::clone(&self.state);
        let clock = self.scheduler.clone();
        SubscriptionHandle::new(move || {
            let now = clock.now();
            let mut state = state.borrow_mut();
            state.sinks.retain(|(id, _)| *id != sink_id);
            if let Some(entry) = state.subscriptions.get_mut(index) {
                if entry.never_ends() {
                    *entry = SubscriptionLog::closed(entry.subscribe, now);
                }
            }
            tracing::debug!(time = now, index, "hot subscription closed");
        })
    }
}

impl<T: Clone + 'static> TestableSource<T> for HotProducer<T> {
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
    fn test_events_fire_at_absolute_times() {
        let scheduler = VirtualScheduler::new();
        let producer = HotProducer::new(scheduler.clone(), script());

        let subscriber = producer.clone();
        let (sink, received) = CollectingSink::shared(&scheduler);
        scheduler.schedule(5, move || {
            subscriber.subscribe(sink);
        });

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            *received.borrow(),
            vec![
                Recorded::new(10, Notification::scalar('x')),
                Recorded::new(30, Notification::Complete),
            ]
        );
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let scheduler = VirtualScheduler::new();
        let producer = HotProducer::new(scheduler.clone(), script());

        let subscriber = producer.clone();
        let (sink, received) = CollectingSink::shared(&scheduler);
        scheduler.schedule(11, move || {
            subscriber.subscribe(sink);
        });

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            *received.borrow(),
            vec![Recorded::new(30, Notification::Complete)]
        );
    }

    #[test]
    fn test_equal_time_join_resolves_in_scheduling_order() {
        let scheduler = VirtualScheduler::new();

        // Join scheduled before the producer exists: at time 30 the join
        // callback runs first and the sink catches the terminal event.
        let early_received = {
            let (sink, received) = CollectingSink::shared(&scheduler);
            let slot: Rc<RefCell<Option<HotProducer<char>>>> = Rc::new(RefCell::new(None));
            let join_slot = Rc::clone(&slot);
            scheduler.schedule(30, move || {
                if let Some(producer) = join_slot.borrow().as_ref() {
                    producer.subscribe(Rc::clone(&sink));
                }
            });
            *slot.borrow_mut() = Some(HotProducer::new(
                scheduler.clone(),
                vec![Recorded::new(30, Notification::Complete)],
            ));
            received
        };

        // Producer constructed first: its terminal callback runs before the
        // join callback and the sink sees nothing.
        let late_received = {
            let producer = HotProducer::new(
                scheduler.clone(),
                vec![Recorded::new(30, Notification::<char>::Complete)],
            );
            let (sink, received) = CollectingSink::shared(&scheduler);
            scheduler.schedule(30, move || {
                producer.subscribe(sink);
            });
            received
        };

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            *early_received.borrow(),
            vec![Recorded::new(30, Notification::<char>::Complete)]
        );
        assert!(late_received.borrow().is_empty());
    }

    #[test]
    fn test_terminal_event_closes_open_subscriptions() {
        let scheduler = VirtualScheduler::new();
        let producer = HotProducer::new(scheduler.clone(), script());

        let (sink, _received) = CollectingSink::shared(&scheduler);
        producer.subscribe(sink);

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(0, 30)]
        );
    }

    #[test]
    fn test_unsubscribed_sink_stops_receiving() {
        let scheduler = VirtualScheduler::new();
        let producer = HotProducer::new(scheduler.clone(), script());

        let (sink, received) = CollectingSink::shared(&scheduler);
        let handle = producer.subscribe(sink);

        let disposer = handle.clone();
        scheduler.schedule(20, move || disposer.unsubscribe());

        scheduler.advance_to(MAX_TIME);
        assert_eq!(
            *received.borrow(),
            vec![Recorded::new(10, Notification::scalar('x'))]
        );
        assert_eq!(
            producer.subscriptions(),
            vec![SubscriptionLog::closed(0, 20)]
        );
    }
}
