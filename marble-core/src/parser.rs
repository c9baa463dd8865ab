//! Marble notation parsing.
//!
//! Turns single-line ASCII diagrams into timestamped event lists. One
//! character is one frame of virtual time, scaled by the frame duration.
//! The grammar is a single pass with no lookahead:
//!
//! | char | meaning |
//! |------|---------|
//! | `-` or space | empty frame |
//! | `\|` | completion |
//! | `#` | error |
//! | `^` | time origin (frames before it get negative times) |
//! | `(` .. `)` | group, every event inside fires at the `(` frame |
//! | anything else | a `Next` value |
//!
//! The unsubscription marker `!` belongs to the separate subscription
//! grammar handled by [`parse_subscription_marbles`].

use std::collections::HashMap;

use thiserror::Error;

use crate::recorded::{MAX_TIME, Notification, Recorded, SubscriptionLog, Value};

/// Cause attached to `#` events when the caller supplies none.
const DEFAULT_ERROR_CAUSE: &str = "error";

/// Errors raised while parsing marble notation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `!` appeared in an event diagram.
    #[error("marble diagrams cannot contain the unsubscription marker '!'")]
    UnsubscriptionMarkerNotAllowed,

    /// A subscription diagram contained an event character.
    #[error(
        "subscription diagrams allow only '-', ' ', '(', ')', '^' and '!', found '{found}' at frame {position}"
    )]
    IllegalSubscriptionCharacter {
        /// The offending character.
        found: char,
        /// Character offset where it occurred.
        position: usize,
    },

    /// A subscription diagram repeated `^` or `!`.
    #[error("found a second '{marker}' marker, subscription diagrams allow only one")]
    DuplicateSubscriptionMarker {
        /// The repeated marker.
        marker: char,
    },

    /// An event character had no entry in the supplied value map.
    #[error("no value registered for marker '{marker}'")]
    UnknownValue {
        /// The unmapped event character.
        marker: char,
    },

    /// A time diagram had no `|` to measure against.
    #[error("time diagrams must contain a completion marker '|'")]
    MissingCompletionMarker,
}

/// Parses an event diagram without a value map.
///
/// Each event character is itself the emitted value.
///
/// # Errors
/// - `ParseError::UnsubscriptionMarkerNotAllowed` - The diagram contains `!`
pub fn parse_marbles(marbles: &str, frame_duration: i64) -> Result<Vec<Recorded<char>>, ParseError> {
    parse_events(marbles, frame_duration, None, |marker| {
        Ok(Value::Scalar(marker))
    })
}

/// Parses an event diagram against a value map.
///
/// Map entries holding a [`Value::Timeline`] are emitted as-is, which is how
/// nested timelines enter a diagram. `error` overrides the cause attached to
/// `#` events.
///
/// # Errors
/// - `ParseError::UnsubscriptionMarkerNotAllowed` - The diagram contains `!`
/// - `ParseError::UnknownValue` - An event character is missing from `values`
pub fn parse_marbles_with<T: Clone>(
    marbles: &str,
    values: &HashMap<char, Value<T>>,
    error: Option<&str>,
    frame_duration: i64,
) -> Result<Vec<Recorded<T>>, ParseError> {
    parse_events(marbles, frame_duration, error, |marker| {
        values
            .get(&marker)
            .cloned()
            .ok_or(ParseError::UnknownValue { marker })
    })
}

fn parse_events<T, F>(
    marbles: &str,
    frame_duration: i64,
    error: Option<&str>,
    mut value_for: F,
) -> Result<Vec<Recorded<T>>, ParseError>
where
    F: FnMut(char) -> Result<Value<T>, ParseError>,
{
    if marbles.contains('!') {
        return Err(ParseError::UnsubscriptionMarkerNotAllowed);
    }

    let offset = marbles
        .chars()
        .position(|c| c == '^')
        .map_or(0, |origin| -(origin as i64) * frame_duration);

    let mut events = Vec::new();
    let mut group_start: Option<i64> = None;

    for (index, c) in marbles.chars().enumerate() {
        let frame = index as i64 * frame_duration + offset;
        let notification = match c {
            '-' | ' ' | '^' => None,
            '(' => {
                group_start = Some(frame);
                None
            }
            ')' => {
                group_start = None;
                None
            }
            '|' => Some(Notification::Complete),
            '#' => Some(Notification::Error(
                error.unwrap_or(DEFAULT_ERROR_CAUSE).to_string(),
            )),
            marker => Some(Notification::Next(value_for(marker)?)),
        };

        if let Some(notification) = notification {
            events.push(Recorded::new(group_start.unwrap_or(frame), notification));
        }
    }

    Ok(events)
}

/// Parses a subscription diagram into a [`SubscriptionLog`].
///
/// `^` marks the subscribe frame and `!` the unsubscribe frame; either may
/// appear at most once. A missing marker leaves the corresponding endpoint
/// at [`MAX_TIME`].
///
/// # Errors
/// - `ParseError::DuplicateSubscriptionMarker` - A second `^` or `!`
/// - `ParseError::IllegalSubscriptionCharacter` - Any event character
pub fn parse_subscription_marbles(
    marbles: &str,
    frame_duration: i64,
) -> Result<SubscriptionLog, ParseError> {
    let mut group_start: Option<i64> = None;
    let mut subscribe: Option<i64> = None;
    let mut unsubscribe: Option<i64> = None;

    for (index, c) in marbles.chars().enumerate() {
        let frame = index as i64 * frame_duration;
        match c {
            '-' | ' ' => {}
            '(' => group_start = Some(frame),
            ')' => group_start = None,
            '^' => {
                if subscribe.is_some() {
                    return Err(ParseError::DuplicateSubscriptionMarker { marker: '^' });
                }
                subscribe = Some(group_start.unwrap_or(frame));
            }
            '!' => {
                if unsubscribe.is_some() {
                    return Err(ParseError::DuplicateSubscriptionMarker { marker: '!' });
                }
                unsubscribe = Some(group_start.unwrap_or(frame));
            }
            found => {
                return Err(ParseError::IllegalSubscriptionCharacter {
                    found,
                    position: index,
                });
            }
        }
    }

    Ok(SubscriptionLog {
        subscribe: subscribe.unwrap_or(MAX_TIME),
        unsubscribe: unsubscribe.unwrap_or(MAX_TIME),
    })
}

/// Measures a diagram as a duration: the frame of its `|` marker.
///
/// # Errors
/// - `ParseError::MissingCompletionMarker` - No `|` in the diagram
pub fn parse_time(marbles: &str, frame_duration: i64) -> Result<i64, ParseError> {
    marbles
        .chars()
        .position(|c| c == '|')
        .map(|index| index as i64 * frame_duration)
        .ok_or(ParseError::MissingCompletionMarker)
}
