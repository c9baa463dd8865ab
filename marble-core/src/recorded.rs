//! Event and subscription record types shared by the whole engine.

use std::fmt;

/// Sentinel virtual time standing in for "never" / "the end of time".
///
/// Used as the unsubscribe time of a subscription that is still open and as
/// the flush target. A maximum representable time instead of a true infinity
/// keeps all time arithmetic in plain `i64`.
pub const MAX_TIME: i64 = i64::MAX;

/// Payload of a [`Notification::Next`].
///
/// Nested timelines ("diagrams of diagrams") are first-class values: an
/// element is either a scalar or a fully materialized sub-timeline whose
/// times are relative to the inner producer's own start.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<T> {
    /// Plain element value.
    Scalar(T),
    /// A nested timed sequence, resolved at parse time.
    Timeline(Vec<Recorded<T>>),
}

impl<T: fmt::Debug> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{value:?}"),
            Self::Timeline(events) => {
                write!(f, "timeline[")?;
                for (i, event) in events.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{event}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A single reactive notification.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    /// Element delivery.
    Next(Value<T>),
    /// Terminal failure. The cause is carried for diagnostics only.
    Error(String),
    /// Terminal completion.
    Complete,
}

impl<T> Notification<T> {
    /// Builds a `Next` notification around a scalar value.
    pub fn scalar(value: T) -> Self {
        Self::Next(Value::Scalar(value))
    }

    /// Returns true for `Error` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }
}

impl<T: PartialEq> PartialEq for Notification<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Next(left), Self::Next(right)) => left == right,
            // Errors match on presence and position, never on cause
            (Self::Error(_), Self::Error(_)) => true,
            (Self::Complete, Self::Complete) => true,
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Notification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next(value) => write!(f, "next({value})"),
            Self::Error(cause) => write!(f, "error({cause})"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// A notification stamped with the virtual time it was, or should be,
/// delivered at.
///
/// Times are negative for events placed before a `^` time origin marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    /// Virtual delivery time.
    pub time: i64,
    /// The recorded notification.
    pub notification: Notification<T>,
}

impl<T> Recorded<T> {
    /// Creates a record of `notification` at `time`.
    pub fn new(time: i64, notification: Notification<T>) -> Self {
        Self { time, notification }
    }
}

impl<T: fmt::Debug> fmt::Display for Recorded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.notification, self.time)
    }
}

/// Observed lifetime of one subscription to a recorded producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLog {
    /// Virtual time the subscription was opened.
    pub subscribe: i64,
    /// Virtual time it was closed, or [`MAX_TIME`] while still open.
    pub unsubscribe: i64,
}

impl SubscriptionLog {
    /// A subscription opened at `subscribe` and not yet closed.
    pub fn open(subscribe: i64) -> Self {
        Self {
            subscribe,
            unsubscribe: MAX_TIME,
        }
    }

    /// A subscription with both endpoints known.
    pub fn closed(subscribe: i64, unsubscribe: i64) -> Self {
        Self {
            subscribe,
            unsubscribe,
        }
    }

    /// Returns true while the subscription has not been closed.
    pub fn never_ends(&self) -> bool {
        self.unsubscribe == MAX_TIME
    }
}

impl fmt::Display for SubscriptionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.never_ends() {
            write!(f, "subscription({}..)", self.subscribe)
        } else {
            write!(f, "subscription({}..{})", self.subscribe, self.unsubscribe)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_notifications_compare_values() {
        assert_eq!(Notification::scalar('a'), Notification::scalar('a'));
        assert_ne!(Notification::scalar('a'), Notification::scalar('b'));
    }

    #[test]
    fn test_error_notifications_ignore_cause() {
        let boom: Notification<char> = Notification::Error("boom".to_string());
        let bang: Notification<char> = Notification::Error("bang".to_string());
        assert_eq!(boom, bang);
    }

    #[test]
    fn test_kinds_never_cross_compare() {
        let complete: Notification<char> = Notification::Complete;
        let error: Notification<char> = Notification::Error("x".to_string());
        assert_ne!(complete, error);
        assert_ne!(Notification::scalar('a'), complete);
    }

    #[test]
    fn test_recorded_equality_is_structural() {
        let left = Recorded::new(10, Notification::scalar(12));
        let right = Recorded::new(10, Notification::scalar(12));
        assert_eq!(left, right);
        assert_ne!(left, Recorded::new(11, Notification::scalar(12)));
    }

    #[test]
    fn test_subscription_log_lifecycle() {
        let log = SubscriptionLog::open(42);
        assert!(log.never_ends());
        assert_eq!(log.unsubscribe, MAX_TIME);

        let ended = SubscriptionLog::closed(42, 50);
        assert!(!ended.never_ends());
        assert_ne!(log, ended);
    }

    #[test]
    fn test_display_formats() {
        let record = Recorded::new(20, Notification::scalar('a'));
        assert_eq!(record.to_string(), "next('a') @20");
        assert_eq!(SubscriptionLog::open(5).to_string(), "subscription(5..)");
        assert_eq!(
            SubscriptionLog::closed(5, 9).to_string(),
            "subscription(5..9)"
        );
    }
}
