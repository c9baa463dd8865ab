//! Property tests over the notation parser and scheduler ordering.

use std::cell::RefCell;
use std::rc::Rc;

use marble_core::parser::parse_marbles;
use marble_core::recorded::MAX_TIME;
use marble_core::scheduler::VirtualScheduler;
use proptest::prelude::*;

/// Diagrams of dashes, spaces and lowercase event markers, optionally
/// terminated.
fn event_diagram() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(
            prop_oneof![
                3 => Just('-'),
                1 => Just(' '),
                2 => proptest::char::range('a', 'z'),
            ],
            0..40,
        ),
        proptest::option::of(prop_oneof![Just('|'), Just('#')]),
    )
        .prop_map(|(body, terminal)| {
            let mut diagram: String = body.into_iter().collect();
            if let Some(terminal) = terminal {
                diagram.push(terminal);
            }
            diagram
        })
}

proptest! {
    #[test]
    fn parsing_is_idempotent(diagram in event_diagram(), frame in 1i64..100) {
        let first = parse_marbles(&diagram, frame).unwrap();
        let second = parse_marbles(&diagram, frame).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn event_times_are_frame_multiples(diagram in event_diagram(), frame in 1i64..100) {
        for event in parse_marbles(&diagram, frame).unwrap() {
            prop_assert_eq!(event.time % frame, 0);
            prop_assert!(event.time >= 0);
        }
    }

    #[test]
    fn event_count_matches_marker_count(diagram in event_diagram()) {
        let markers = diagram
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .count();
        prop_assert_eq!(parse_marbles(&diagram, 10).unwrap().len(), markers);
    }

    #[test]
    fn scheduler_runs_are_deterministic(
        entries in proptest::collection::vec((0i64..1_000, any::<u8>()), 0..50)
    ) {
        prop_assert_eq!(drain(&entries), drain(&entries));
    }

    #[test]
    fn execution_times_never_decrease(
        entries in proptest::collection::vec((0i64..1_000, any::<u8>()), 0..50)
    ) {
        let executed = drain(&entries);
        for window in executed.windows(2) {
            prop_assert!(window[0].0 <= window[1].0);
        }
    }
}

/// Schedules every entry and drains the queue, returning `(time, marker)`
/// in execution order.
fn drain(entries: &[(i64, u8)]) -> Vec<(i64, u8)> {
    let scheduler = VirtualScheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for (delay, marker) in entries {
        let log = Rc::clone(&log);
        let clock = scheduler.clone();
        let marker = *marker;
        scheduler.schedule(*delay, move || {
            log.borrow_mut().push((clock.now(), marker));
        });
    }
    scheduler.advance_to(MAX_TIME);
    let executed = log.borrow().clone();
    executed
}
