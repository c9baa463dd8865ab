//! Marble - virtual-time marble testing for reactive streams.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate lets a test author describe a timed event sequence as a
//! single-line ASCII diagram, materialize it as a schedulable producer, and
//! assert that some other producer emits an equivalent timed sequence. All
//! of it happens in virtual time: a deterministic, single-threaded scheduler
//! orders and fires every event with reproducible tie-breaks, so the same
//! test gives the same answer every run, instantly.
//!
//! # Example
//!
//! ```
//! use marble_core::harness::MarbleScheduler;
//!
//! # fn main() -> Result<(), marble_core::harness::MarbleError> {
//! let mut scheduler = MarbleScheduler::new();
//! let source = scheduler.create_cold("a-b-c-|")?;
//! scheduler.expect_source(&source).to_be("a-b-c-|")?;
//! scheduler.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Parser**: marble notation to timestamped event lists, one pass
//! - **Scheduler**: virtual clock with a FIFO-tie-break callback queue
//! - **Producers**: cold (per-subscriber replay) and hot (shared timeline)
//! - **Comparator**: multiset timeline diff with a rendered report
//! - **Harness**: expectation registration and the end-of-test flush

pub mod comparator;
pub mod config;
pub mod harness;
pub mod parser;
pub mod recorded;
pub mod scheduler;
pub mod source;

pub use comparator::{ComparisonTag, EventComparison, StreamComparison, compare};
pub use config::HarnessConfig;
pub use harness::{MarbleError, MarbleScheduler, StreamExpectation, SubscriptionExpectation};
pub use parser::{
    ParseError, parse_marbles, parse_marbles_with, parse_subscription_marbles, parse_time,
};
pub use recorded::{MAX_TIME, Notification, Recorded, SubscriptionLog, Value};
pub use scheduler::{TaskHandle, VirtualScheduler};
pub use source::{
    ColdProducer, HotProducer, SharedSink, Sink, Source, SubscriptionHandle, TestableSource,
};

/// Convenience result type for harness operations.
pub type Result<T> = std::result::Result<T, MarbleError>;
