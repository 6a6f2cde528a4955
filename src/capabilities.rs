//! Capability traits the sweep sequencer is written against.
//!
//! Traits are small and async. The SG6000 driver implements them; tests can
//! substitute a recording implementation.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Device whose output frequency can be set.
#[async_trait]
pub trait FrequencyTunable: Send {
    /// Set the output frequency in Hz.
    ///
    /// Returns once the device can accept the next command.
    async fn set_frequency(&mut self, hz: f64) -> Result<()>;

    /// Time already spent inside `set_frequency` waiting for the device to
    /// settle. Sweeps subtract it from the requested dwell.
    fn settle_delay(&self) -> Duration;
}
