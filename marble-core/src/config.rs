//! Harness configuration.

/// Tunable parameters for a [`MarbleScheduler`](crate::harness::MarbleScheduler).
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Virtual-time span of one marble character.
    pub frame_duration: i64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self { frame_duration: 10 }
    }
}
