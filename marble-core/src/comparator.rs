//! Timeline comparison and mismatch rendering.
//!
//! Compares two recorded timelines as multisets: collection order does not
//! matter, multiplicity and timestamps do. The rendered report groups
//! matched, actual-only and expected-only events so a failing assertion
//! reads like a diff.

use std::fmt;

use crate::recorded::Recorded;

/// Classification of one event within a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonTag {
    /// Present in both timelines.
    Match,
    /// Present only in the actual timeline.
    OnlyActual,
    /// Present only in the expected timeline.
    OnlyExpected,
}

/// One event of the combined diff.
#[derive(Debug, Clone, PartialEq)]
pub struct EventComparison<T> {
    /// The event in question.
    pub record: Recorded<T>,
    /// Which side(s) it was found on.
    pub tag: ComparisonTag,
}

/// Outcome of comparing an actual timeline against an expected one.
#[derive(Debug, Clone)]
pub struct StreamComparison<T> {
    /// True when the two timelines are equal as multisets.
    pub equal: bool,
    /// Every event of both timelines, tagged and sorted by time with
    /// terminal events last among equal-time ties.
    pub diff: Vec<EventComparison<T>>,
}

/// Compares two timelines under [`Recorded`] equality.
///
/// Matching is multiplicity-aware: each actual occurrence consumes at most
/// one expected occurrence. The combined diff is sorted by time; at equal
/// times `Error` and `Complete` entries sort after `Next` entries, whatever
/// their tag, so terminal events always render last.
pub fn compare<T: Clone + PartialEq>(
    actual: &[Recorded<T>],
    expected: &[Recorded<T>],
) -> StreamComparison<T> {
    let mut expected_taken = vec![false; expected.len()];
    let actual_matched: Vec<bool> = actual
        .iter()
        .map(|record| {
            let slot = expected_taken
                .iter_mut()
                .zip(expected)
                .find(|(taken, candidate)| !**taken && *candidate == record);
            match slot {
                Some((taken, _)) => {
                    *taken = true;
                    true
                }
                None => false,
            }
        })
        .collect();

    let mut diff: Vec<EventComparison<T>> = Vec::new();
    for (record, taken) in expected.iter().zip(&expected_taken) {
        if !taken {
            diff.push(EventComparison {
                record: record.clone(),
                tag: ComparisonTag::OnlyExpected,
            });
        }
    }
    for (record, matched) in actual.iter().zip(&actual_matched) {
        if !matched {
            diff.push(EventComparison {
                record: record.clone(),
                tag: ComparisonTag::OnlyActual,
            });
        }
    }
    let equal = diff.is_empty();
    for (record, matched) in actual.iter().zip(&actual_matched) {
        if *matched {
            diff.push(EventComparison {
                record: record.clone(),
                tag: ComparisonTag::Match,
            });
        }
    }

    // Stable sort keeps same-rank entries in collection order
    diff.sort_by(|left, right| {
        left.record
            .time
            .cmp(&right.record.time)
            .then_with(|| terminal_rank(left).cmp(&terminal_rank(right)))
    });

    StreamComparison { equal, diff }
}

fn terminal_rank<T>(entry: &EventComparison<T>) -> u8 {
    u8::from(entry.record.notification.is_terminal())
}

impl<T: fmt::Debug> fmt::Display for StreamComparison<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.equal {
            return write!(f, "streams are equal");
        }
        write!(f, "streams differ:")?;
        let mut current: Option<ComparisonTag> = None;
        for entry in &self.diff {
            if current != Some(entry.tag) {
                current = Some(entry.tag);
                let header = match entry.tag {
                    ComparisonTag::Match => "=   on actual and expected streams",
                    ComparisonTag::OnlyActual => "+   on actual stream only",
                    ComparisonTag::OnlyExpected => "-   on expected stream only",
                };
                write!(f, "\n\n{header}")?;
            }
            let prefix = match entry.tag {
                ComparisonTag::Match => '=',
                ComparisonTag::OnlyActual => '+',
                ComparisonTag::OnlyExpected => '-',
            };
            write!(f, "\n{prefix} {}", entry.record)?;
        }
        Ok(())
    }
}
