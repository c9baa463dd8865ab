//! Recorded producers and the host-library boundary contracts.
//!
//! A recorded producer owns a script of timestamped notifications and plays
//! it back over the shared [`VirtualScheduler`](crate::scheduler::VirtualScheduler).
//! The [`Cold`](ColdProducer) variant replays the script per subscriber; the
//! [`Hot`](HotProducer) variant plays it once on the shared timeline. Host
//! reactive libraries plug in through the [`Sink`] and [`Source`] traits and
//! never see the engine internals.

mod cold;
mod hot;

use std::cell::RefCell;
use std::rc::Rc;

pub use cold::ColdProducer;
pub use hot::HotProducer;

use crate::recorded::{Notification, Recorded, SubscriptionLog, Value};

/// Receiver side of a producer, implemented by host-library adapters.
///
/// Demand is treated as unbounded; there is no back-pressure surface.
pub trait Sink<T> {
    /// Receives an element.
    fn on_next(&mut self, value: Value<T>);
    /// Receives a terminal failure.
    fn on_error(&mut self, cause: String);
    /// Receives terminal completion.
    fn on_complete(&mut self);
}

/// Shared, interior-mutable handle to a sink.
pub type SharedSink<T> = Rc<RefCell<dyn Sink<T>>>;

/// Anything that can be subscribed to, any number of times.
pub trait Source<T> {
    /// Attaches `sink` and returns its disposer.
    fn subscribe(&self, sink: SharedSink<T>) -> SubscriptionHandle;
}

/// A [`Source`] that additionally exposes its script and the subscriptions
/// it has seen, as snapshots.
pub trait TestableSource<T>: Source<T> {
    /// Copy of the subscription log, one entry per `subscribe` call in
    /// subscription order. Entries keep their index for their whole life.
    fn subscriptions(&self) -> Vec<SubscriptionLog>;
    /// Copy of the producer's script.
    fn script(&self) -> Vec<Recorded<T>>;
}

/// Idempotent disposer for one subscription.
///
/// Unsubscribing stops future deliveries to the sink and closes the
/// producer's log entry; it never removes data already recorded.
#[derive(Clone)]
pub struct SubscriptionHandle {
    teardown: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Rc::new(RefCell::new(Some(Box::new(teardown)))),
        }
    }

    /// Tears the subscription down. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Returns true once [`unsubscribe`](Self::unsubscribe) has run.
    pub fn is_unsubscribed(&self) -> bool {
        self.teardown.borrow().is_none()
    }
}

/// Forwards `notification` into `sink`.
pub(crate) fn deliver<T: Clone>(notification: &Notification<T>, sink: &SharedSink<T>) {
    match notification {
        Notification::Next(value) => sink.borrow_mut().on_next(value.clone()),
        Notification::Error(cause) => sink.borrow_mut().on_error(cause.clone()),
        Notification::Complete => sink.borrow_mut().on_complete(),
    }
}

/// Closes every still-open log entry at `time`. Used when a producer's
/// terminal event logically ends all outstanding subscriptions.
pub(crate) fn end_open_subscriptions(subscriptions: &mut [SubscriptionLog], time: i64) {
    for entry in subscriptions.iter_mut() {
        if entry.never_ends() {
            *entry = SubscriptionLog::closed(entry.subscribe, time);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::scheduler::VirtualScheduler;

    /// Sink that records every notification with the virtual time it
    /// arrived at.
    pub(crate) struct CollectingSink<T> {
        clock: VirtualScheduler,
        received: Rc<RefCell<Vec<Recorded<T>>>>,
    }

    impl<T> CollectingSink<T> {
        pub(crate) fn shared(
            clock: &VirtualScheduler,
        ) -> (SharedSink<T>, Rc<RefCell<Vec<Recorded<T>>>>)
        where
            T: 'static,
        {
            let received = Rc::new(RefCell::new(Vec::new()));
            let sink: SharedSink<T> = Rc::new(RefCell::new(CollectingSink {
                clock: clock.clone(),
                received: Rc::clone(&received),
            }));
            (sink, received)
        }

        fn record(&mut self, notification: Notification<T>) {
            let now = self.clock.now();
            self.received
                .borrow_mut()
                .push(Recorded::new(now, notification));
        }
    }

    impl<T> Sink<T> for CollectingSink<T> {
        fn on_next(&mut self, value: Value<T>) {
            self.record(Notification::Next(value));
        }

        fn on_error(&mut self, cause: String) {
            self.record(Notification::Error(cause));
        }

        fn on_complete(&mut self) {
            self.record(Notification::Complete);
        }
    }
}
