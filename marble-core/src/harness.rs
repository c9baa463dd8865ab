//! Expectation registration and flush orchestration.
//!
//! [`MarbleScheduler`] is the surface a test author talks to: it builds
//! producers from diagrams, records streams under test, and at flush time
//! drives the clock to the end of time and settles every expectation.
//!
//! There is no ambient "current scheduler" registry. Every producer and
//! expectation is created through an explicit scheduler instance, one per
//! test case.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use thiserror::Error;

use crate::comparator::compare;
use crate::config::HarnessConfig;
use crate::parser::{
    self, ParseError, parse_marbles, parse_marbles_with, parse_subscription_marbles,
};
use crate::recorded::{MAX_TIME, Notification, Recorded, SubscriptionLog, Value};
use crate::scheduler::VirtualScheduler;
use crate::source::{
    ColdProducer, HotProducer, SharedSink, Sink, Source, SubscriptionHandle, TestableSource,
};

/// Failures surfaced by the harness.
#[derive(Debug, Error)]
pub enum MarbleError {
    /// A diagram could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A recorded stream did not match its expected diagram.
    #[error("{report}\n\nfrom assertion at {caller}")]
    StreamMismatch {
        /// Rendered comparison report.
        report: String,
        /// Source location of the `expect_source` call.
        caller: String,
    },

    /// A subscription log did not match its expected diagrams.
    #[error("{report}\n\nfrom assertion at {caller}")]
    SubscriptionMismatch {
        /// Description of the mismatch.
        report: String,
        /// Source location of the `expect_subscriptions` call.
        caller: String,
    },
}

/// One registered expectation, erased over its value type.
trait FlushCheck {
    /// True once the author has supplied the expected side.
    fn is_ready(&self) -> bool;
    fn caller(&self) -> &str;
    /// Runs the comparison. Called at most once, at flush.
    fn run(&self) -> Result<(), MarbleError>;
}

struct StreamCheck<T> {
    caller: String,
    actual: Rc<RefCell<Vec<Recorded<T>>>>,
    expected: Option<Vec<Recorded<T>>>,
}

impl<T: Clone + PartialEq + fmt::Debug> FlushCheck for StreamCheck<T> {
    fn is_ready(&self) -> bool {
        self.expected.is_some()
    }

    fn caller(&self) -> &str {
        &self.caller
    }

    fn run(&self) -> Result<(), MarbleError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };
        let result = compare(&self.actual.borrow(), expected);
        if result.equal {
            Ok(())
        } else {
            Err(MarbleError::StreamMismatch {
                report: result.to_string(),
                caller: self.caller.clone(),
            })
        }
    }
}

struct SubscriptionCheck {
    caller: String,
    /// Snapshots the producer's log when invoked, so closures applied during
    /// the flush itself are visible.
    actual: Box<dyn Fn() -> Vec<SubscriptionLog>>,
    expected: Option<Vec<SubscriptionLog>>,
}

impl FlushCheck for SubscriptionCheck {
    fn is_ready(&self) -> bool {
        self.expected.is_some()
    }

    fn caller(&self) -> &str {
        &self.caller
    }

    fn run(&self) -> Result<(), MarbleError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };
        let actual = (self.actual)();
        if actual.len() != expected.len() {
            return Err(MarbleError::SubscriptionMismatch {
                report: format!(
                    "{} subscription(s) expected, {} observed",
                    expected.len(),
                    actual.len()
                ),
                caller: self.caller.clone(),
            });
        }
        for (observed, wanted) in actual.iter().zip(expected) {
            if observed != wanted {
                return Err(MarbleError::SubscriptionMismatch {
                    report: format!("expected {wanted}, instead observed {observed}"),
                    caller: self.caller.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Sink that records every notification at the virtual time it arrives.
struct RecordingSink<T> {
    clock: VirtualScheduler,
    actual: Rc<RefCell<Vec<Recorded<T>>>>,
}

impl<T> RecordingSink<T> {
    fn record(&mut self, notification: Notification<T>) {
        let now = self.clock.now();
        self.actual
            .borrow_mut()
            .push(Recorded::new(now, notification));
    }
}

impl<T> Sink<T> for RecordingSink<T> {
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

/// Setup handle for a stream expectation.
///
/// Consumed by the assertion setter, so an expected diagram can be supplied
/// at most once per expectation:
///
/// ```compile_fail
/// use marble_core::harness::MarbleScheduler;
///
/// let mut scheduler = MarbleScheduler::new();
/// let source = scheduler.create_cold("a|").unwrap();
/// let expectation = scheduler.expect_source(&source);
/// expectation.to_be("a|").unwrap();
/// expectation.to_be("-a|").unwrap(); // use of moved value
/// ```
#[must_use = "an expectation without an expected diagram is skipped at flush"]
pub struct StreamExpectation<T> {
    check: Rc<RefCell<StreamCheck<T>>>,
    frame_duration: i64,
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> StreamExpectation<T> {
    /// Supplies the expected diagram with a value map, arming the
    /// expectation for the next flush.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn to_be_with(
        self,
        marbles: &str,
        values: &HashMap<char, Value<T>>,
        error: Option<&str>,
    ) -> Result<(), ParseError> {
        let expected = parse_marbles_with(marbles, values, error, self.frame_duration)?;
        self.check.borrow_mut().expected = Some(expected);
        Ok(())
    }
}

impl StreamExpectation<char> {
    /// Supplies the expected diagram, each event character standing for
    /// itself.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn to_be(self, marbles: &str) -> Result<(), ParseError> {
        let expected = parse_marbles(marbles, self.frame_duration)?;
        self.check.borrow_mut().expected = Some(expected);
        Ok(())
    }
}

/// Setup handle for a subscription-log expectation.
#[must_use = "an expectation without expected diagrams is skipped at flush"]
pub struct SubscriptionExpectation {
    check: Rc<RefCell<SubscriptionCheck>>,
    frame_duration: i64,
}

impl SubscriptionExpectation {
    /// Supplies one subscription diagram per expected subscription, in
    /// subscription order.
    ///
    /// # Errors
    /// - `ParseError` - A diagram is malformed
    pub fn to_be(self, marbles: &[&str]) -> Result<(), ParseError> {
        let expected = marbles
            .iter()
            .map(|diagram| parse_subscription_marbles(diagram, self.frame_duration))
            .collect::<Result<Vec<_>, _>>()?;
        self.check.borrow_mut().expected = Some(expected);
        Ok(())
    }
}

/// Virtual-time test harness for reactive producers.
///
/// Owns the scheduler, the frame duration and every registered expectation.
/// Construct one per test, register expectations while wiring the scenario,
/// then call [`flush`](Self::flush) exactly once at the end.
pub struct MarbleScheduler {
    scheduler: VirtualScheduler,
    frame_duration: i64,
    flush_checks: Vec<Rc<RefCell<dyn FlushCheck>>>,
}

impl Default for MarbleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MarbleScheduler {
    /// Creates a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    /// Creates a harness with an explicit configuration.
    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            scheduler: VirtualScheduler::new(),
            frame_duration: config.frame_duration,
            flush_checks: Vec::new(),
        }
    }

    /// Returns a handle to the shared scheduler.
    pub fn clock(&self) -> VirtualScheduler {
        self.scheduler.clone()
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> i64 {
        self.scheduler.now()
    }

    /// Returns the configured frame duration.
    pub fn frame_duration(&self) -> i64 {
        self.frame_duration
    }

    /// Advances the shared clock by `duration`.
    pub fn advance_by(&self, duration: i64) {
        self.scheduler.advance_by(duration);
    }

    /// Advances the shared clock to `target`.
    pub fn advance_to(&self, target: i64) {
        self.scheduler.advance_to(target);
    }

    /// Builds a cold producer from `marbles`, each event character standing
    /// for itself.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn create_cold(&self, marbles: &str) -> Result<ColdProducer<char>, ParseError> {
        let script = parse_marbles(marbles, self.frame_duration)?;
        Ok(ColdProducer::new(self.scheduler.clone(), script))
    }

    /// Builds a cold producer from `marbles` with a value map.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn create_cold_with<T: Clone + 'static>(
        &self,
        marbles: &str,
        values: &HashMap<char, Value<T>>,
        error: Option<&str>,
    ) -> Result<ColdProducer<T>, ParseError> {
        let script = parse_marbles_with(marbles, values, error, self.frame_duration)?;
        Ok(ColdProducer::new(self.scheduler.clone(), script))
    }

    /// Builds a hot producer from `marbles`, each event character standing
    /// for itself.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn create_hot(&self, marbles: &str) -> Result<HotProducer<char>, ParseError> {
        let script = parse_marbles(marbles, self.frame_duration)?;
        Ok(HotProducer::new(self.scheduler.clone(), script))
    }

    /// Builds a hot producer from `marbles` with a value map.
    ///
    /// # Errors
    /// - `ParseError` - The diagram is malformed
    pub fn create_hot_with<T: Clone + 'static>(
        &self,
        marbles: &str,
        values: &HashMap<char, Value<T>>,
        error: Option<&str>,
    ) -> Result<HotProducer<T>, ParseError> {
        let script = parse_marbles_with(marbles, values, error, self.frame_duration)?;
        Ok(HotProducer::new(self.scheduler.clone(), script))
    }

    /// Measures a diagram as a duration, the frame of its `|` marker.
    ///
    /// # Errors
    /// - `ParseError::MissingCompletionMarker` - No `|` in the diagram
    pub fn create_time(&self, marbles: &str) -> Result<i64, ParseError> {
        parser::parse_time(marbles, self.frame_duration)
    }

    /// Subscribes to `source` immediately and starts recording its
    /// notifications at virtual time. The returned handle arms the
    /// assertion; without a [`to_be`](StreamExpectation::to_be) call the
    /// expectation is skipped at flush.
    #[track_caller]
    pub fn expect_source<T, S>(&mut self, source: &S) -> StreamExpectation<T>
    where
        T: Clone + PartialEq + fmt::Debug + 'static,
        S: Source<T>,
    {
        let caller = Location::caller().to_string();
        let (expectation, _subscription) = self.record_source(source, caller);
        expectation
    }

    /// Like [`expect_source`](Self::expect_source), additionally forcing an
    /// unsubscribe at the `!` frame of `unsubscribe_marbles`.
    ///
    /// # Errors
    /// - `ParseError` - The unsubscription diagram is malformed
    #[track_caller]
    pub fn expect_source_when<T, S>(
        &mut self,
        source: &S,
        unsubscribe_marbles: &str,
    ) -> Result<StreamExpectation<T>, ParseError>
    where
        T: Clone + PartialEq + fmt::Debug + 'static,
        S: Source<T>,
    {
        let caller = Location::caller().to_string();
        let log = parse_subscription_marbles(unsubscribe_marbles, self.frame_duration)?;
        let (expectation, subscription) = self.record_source(source, caller);
        if log.unsubscribe != MAX_TIME {
            self.scheduler
                .schedule(log.unsubscribe, move || subscription.unsubscribe());
        }
        Ok(expectation)
    }

    fn record_source<T, S>(
        &mut self,
        source: &S,
        caller: String,
    ) -> (StreamExpectation<T>, SubscriptionHandle)
    where
        T: Clone + PartialEq + fmt::Debug + 'static,
        S: Source<T>,
    {
        let actual = Rc::new(RefCell::new(Vec::new()));
        let sink: SharedSink<T> = Rc::new(RefCell::new(RecordingSink {
            clock: self.scheduler.clone(),
            actual: Rc::clone(&actual),
        }));
        let subscription = source.subscribe(sink);
        tracing::debug!(caller = %caller, "stream expectation armed");

        let check = Rc::new(RefCell::new(StreamCheck {
            caller,
            actual,
            expected: None,
        }));
        self.flush_checks
            .push(Rc::clone(&check) as Rc<RefCell<dyn FlushCheck>>);
        (
            StreamExpectation {
                check,
                frame_duration: self.frame_duration,
            },
            subscription,
        )
    }

    /// Registers an expectation over a producer's subscription log. The log
    /// is snapshotted at flush time, after the clock has fully advanced.
    #[track_caller]
    pub fn expect_subscriptions<T, S>(&mut self, source: &S) -> SubscriptionExpectation
    where
        T: 'static,
        S: TestableSource<T> + Clone + 'static,
    {
        let caller = Location::caller().to_string();
        tracing::debug!(caller = %caller, "subscription expectation armed");
        let producer = source.clone();
        let check = Rc::new(RefCell::new(SubscriptionCheck {
            caller,
            actual: Box::new(move || producer.subscriptions()),
            expected: None,
        }));
        self.flush_checks
            .push(Rc::clone(&check) as Rc<RefCell<dyn FlushCheck>>);
        SubscriptionExpectation {
            check,
            frame_duration: self.frame_duration,
        }
    }

    /// Advances the clock to the end of time, then settles every ready
    /// expectation in registration order. Expectations never given an
    /// expected diagram are skipped with a warning. Each expectation is
    /// settled at most once; the registry is drained.
    ///
    /// # Errors
    /// - `MarbleError::StreamMismatch` - A recorded stream differed
    /// - `MarbleError::SubscriptionMismatch` - A subscription log differed
    pub fn flush(&mut self) -> Result<(), MarbleError> {
        tracing::debug!(expectations = self.flush_checks.len(), "flushing");
        self.scheduler.advance_to(MAX_TIME);
        let checks = std::mem::take(&mut self.flush_checks);
        for check in checks {
            let check = check.borrow();
            if check.is_ready() {
                check.run()?;
            } else {
                tracing::warn!(
                    caller = check.caller(),
                    "expectation was never given an expected diagram, skipping"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_stream_round_trip() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a-b-c-|").unwrap();
        scheduler.expect_source(&source).to_be("a-b-c-|").unwrap();
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_mismatch_embeds_diff_and_caller() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a-b|").unwrap();
        scheduler.expect_source(&source).to_be("a---b|").unwrap();

        let error = scheduler.flush().unwrap_err();
        let message = error.to_string();
        assert!(message.contains("streams differ:"));
        assert!(message.contains("+ next('b') @20"));
        assert!(message.contains("- next('b') @40"));
        assert!(message.contains("from assertion at"));
        assert!(message.contains("harness.rs"));
    }

    #[test]
    fn test_armed_expectation_is_skipped() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a|").unwrap();
        let _expectation = scheduler.expect_source(&source);
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_late_hot_subscriber_records_later_events_only() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_hot("--a---b--|").unwrap();

        scheduler.advance_by(50);
        scheduler.expect_source(&source).to_be("------b--|").unwrap();
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_expected_side_can_use_value_maps() {
        let mut scheduler = MarbleScheduler::new();
        let values = HashMap::from([('h', Value::Scalar("hello"))]);
        let source = scheduler.create_cold_with("-h-|", &values, None).unwrap();
        scheduler
            .expect_source(&source)
            .to_be_with("-h-|", &values, None)
            .unwrap();
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_error_streams_match_on_position_only() {
        let mut scheduler = MarbleScheduler::new();
        let values: HashMap<char, Value<char>> = HashMap::new();
        let source = scheduler
            .create_cold_with("-#", &values, Some("kaboom"))
            .unwrap();
        scheduler
            .expect_source(&source)
            .to_be_with("-#", &values, Some("different cause"))
            .unwrap();
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_expect_subscriptions_round_trip() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a--|").unwrap();
        scheduler.expect_source(&source).to_be("a--|").unwrap();
        scheduler
            .expect_subscriptions(&source)
            .to_be(&["^--!"])
            .unwrap();
        scheduler.flush().unwrap();
    }

    #[test]
    fn test_expect_subscriptions_count_mismatch() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a--|").unwrap();
        scheduler.expect_source(&source).to_be("a--|").unwrap();
        scheduler
            .expect_subscriptions(&source)
            .to_be(&["^--!", "--^!"])
            .unwrap();

        let error = scheduler.flush().unwrap_err();
        assert!(
            error
                .to_string()
                .contains("2 subscription(s) expected, 1 observed")
        );
    }

    #[test]
    fn test_expect_subscriptions_entry_mismatch() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_cold("a--|").unwrap();
        scheduler.expect_source(&source).to_be("a--|").unwrap();
        scheduler
            .expect_subscriptions(&source)
            .to_be(&["-^-!"])
            .unwrap();

        let error = scheduler.flush().unwrap_err();
        let message = error.to_string();
        assert!(message.contains("expected subscription(10..30)"));
        assert!(message.contains("instead observed subscription(0..30)"));
    }

    #[test]
    fn test_create_time() {
        let scheduler = MarbleScheduler::new();
        assert_eq!(scheduler.create_time("-----|").unwrap(), 50);
        assert!(scheduler.create_time("-a-b-c-#").is_err());
    }

    #[test]
    fn test_forced_unsubscribe_notation() {
        let mut scheduler = MarbleScheduler::new();
        let source = scheduler.create_hot("---^-a-b-|").unwrap();
        scheduler
            .expect_source_when(&source, "---!")
            .unwrap()
            .to_be("--a")
            .unwrap();
        scheduler.flush().unwrap();
    }
}
