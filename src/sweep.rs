//! Stepped frequency sweeps.
//!
//! A [`SweepPlan`] describes one sweep: an inclusive frequency range, a fixed
//! step, a dwell time per step and a repetition count. [`Sweeper`] drives any
//! [`FrequencyTunable`] device through it.
//!
//! # Timing
//!
//! `set_frequency` already waits the device's settle delay before returning,
//! so each step only sleeps `dwell - settle_delay` (never negative). The time
//! per step therefore stays close to the requested dwell regardless of the
//! pacing the device needs, and a dwell shorter than the settle delay is
//! absorbed entirely by pacing.
//!
//! # Range
//!
//! The grid is `start + i * step` for `i = 0..step_count`, with
//! `step_count = floor((stop - start) / step) + 1`. The last frequency never
//! exceeds `stop`; `stop` itself is included when it lies on the grid, with a
//! small tolerance for floating-point rounding.
//!
//! # Example
//!
//! ```rust,ignore
//! use sg6000::sweep::{SweepPlan, Sweeper};
//! use std::time::Duration;
//!
//! let plan = SweepPlan::new(50e6, 55e6, 1e6, Duration::from_millis(10), 1)?;
//! let report = Sweeper::new(&mut synth).run(&plan).await?;
//! assert_eq!(report.steps, 6);
//! ```

use crate::capabilities::FrequencyTunable;
use crate::error::{Result, Sg6000Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Relative slack (in steps) allowed when deciding whether `stop` is on the grid.
const GRID_TOLERANCE: f64 = 1e-9;

/// Parameters of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// First frequency, Hz
    pub start_hz: f64,
    /// Last frequency (inclusive upper bound), Hz
    pub stop_hz: f64,
    /// Increment between steps, Hz
    pub step_hz: f64,
    /// Time to hold each step
    #[serde(with = "humantime_serde")]
    pub dwell: Duration,
    /// Number of passes over the range
    pub repetitions: u32,
}

impl SweepPlan {
    /// Build and validate a plan.
    pub fn new(
        start_hz: f64,
        stop_hz: f64,
        step_hz: f64,
        dwell: Duration,
        repetitions: u32,
    ) -> Result<Self> {
        let plan = Self {
            start_hz,
            stop_hz,
            step_hz,
            dwell,
            repetitions,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan can be swept.
    ///
    /// Frequencies and step must be finite and positive, and `stop` must not
    /// be below `start`. A non-positive step is rejected rather than looping
    /// forever.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("start", self.start_hz),
            ("stop", self.stop_hz),
            ("step", self.step_hz),
        ] {
            if !value.is_finite() {
                return Err(Sg6000Error::invalid(format!(
                    "sweep {} frequency must be finite, got {}",
                    name, value
                )));
            }
            if value <= 0.0 {
                return Err(Sg6000Error::invalid(format!(
                    "sweep {} frequency must be positive, got {} Hz",
                    name, value
                )));
            }
        }
        if self.stop_hz < self.start_hz {
            return Err(Sg6000Error::invalid(format!(
                "sweep stop ({} Hz) is below start ({} Hz)",
                self.stop_hz, self.start_hz
            )));
        }
        let span = self.span_in_steps();
        if span >= u64::MAX as f64 {
            return Err(Sg6000Error::invalid(format!(
                "sweep from {} Hz to {} Hz in {} Hz steps has too many steps",
                self.start_hz, self.stop_hz, self.step_hz
            )));
        }
        Ok(())
    }

    /// Number of frequency steps in one repetition.
    pub fn step_count(&self) -> u64 {
        let steps = (self.span_in_steps() + GRID_TOLERANCE).floor() as u64;
        steps.saturating_add(1)
    }

    fn span_in_steps(&self) -> f64 {
        (self.stop_hz - self.start_hz) / self.step_hz
    }

    /// Frequencies visited in one repetition, in order.
    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.step_count()).map(move |i| self.frequency_at(i))
    }

    fn frequency_at(&self, index: u64) -> f64 {
        (self.start_hz + index as f64 * self.step_hz).min(self.stop_hz)
    }
}

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Not started
    Idle,
    /// Between passes, repetitions remain
    Repeating,
    /// Walking the frequency grid
    Stepping,
    /// Finished, aborted, or nothing to do
    Done,
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Frequency steps executed across all repetitions
    pub steps: u64,
    /// Repetitions completed
    pub repetitions: u32,
    /// Wall time spent
    pub elapsed: Duration,
}

/// Drives a [`FrequencyTunable`] device through a [`SweepPlan`].
pub struct Sweeper<'a, D: FrequencyTunable + ?Sized> {
    device: &'a mut D,
    state: SweepState,
}

impl<'a, D: FrequencyTunable + ?Sized> Sweeper<'a, D> {
    /// Sequencer over `device`, in [`SweepState::Idle`].
    pub fn new(device: &'a mut D) -> Self {
        Self {
            device,
            state: SweepState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Run `plan` to completion.
    ///
    /// Blocks (asynchronously) for the whole sweep. The plan is validated
    /// before anything is sent. A failing step aborts the sweep with
    /// [`Sg6000Error::SweepAborted`]; steps already sent are not undone.
    #[instrument(skip(self, plan), fields(
        start_hz = plan.start_hz,
        stop_hz = plan.stop_hz,
        step_hz = plan.step_hz,
        repetitions = plan.repetitions,
    ), err)]
    pub async fn run(&mut self, plan: &SweepPlan) -> Result<SweepReport> {
        plan.validate()?;

        let started = Instant::now();
        let hold = plan.dwell.saturating_sub(self.device.settle_delay());
        let mut report = SweepReport {
            steps: 0,
            repetitions: 0,
            elapsed: Duration::ZERO,
        };

        if plan.repetitions == 0 {
            tracing::info!("Sweep has no repetitions, nothing to do");
            self.state = SweepState::Done;
            return Ok(report);
        }

        tracing::info!(
            steps_per_repetition = plan.step_count(),
            hold_ms = hold.as_millis() as u64,
            "Starting sweep"
        );

        let mut remaining = plan.repetitions;
        while remaining > 0 {
            self.state = SweepState::Repeating;
            let repetition = plan.repetitions - remaining;

            self.state = SweepState::Stepping;
            for (step, hz) in plan.frequencies().enumerate() {
                if let Err(e) = self.device.set_frequency(hz).await {
                    self.state = SweepState::Done;
                    tracing::warn!(repetition, step, hz, error = %e, "Sweep step failed");
                    return Err(Sg6000Error::SweepAborted {
                        repetition,
                        step: step as u64,
                        frequency_hz: hz,
                        source: Box::new(e),
                    });
                }
                report.steps += 1;
                if !hold.is_zero() {
                    tokio::time::sleep(hold).await;
                }
            }

            remaining -= 1;
            report.repetitions += 1;
            tracing::debug!(repetition, remaining, "Sweep repetition complete");
        }

        self.state = SweepState::Done;
        report.elapsed = started.elapsed();
        tracing::info!(
            steps = report.steps,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Records every frequency and optionally fails at a given call.
    struct Recorder {
        settle: Duration,
        calls: Vec<f64>,
        fail_at: Option<usize>,
    }

    impl Recorder {
        fn new(settle: Duration) -> Self {
            Self {
                settle,
                calls: Vec::new(),
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl FrequencyTunable for Recorder {
        async fn set_frequency(&mut self, hz: f64) -> Result<()> {
            if self.fail_at == Some(self.calls.len()) {
                return Err(Sg6000Error::Io(std::io::Error::from(
                    std::io::ErrorKind::BrokenPipe,
                )));
            }
            self.calls.push(hz);
            tokio::time::sleep(self.settle).await;
            Ok(())
        }

        fn settle_delay(&self) -> Duration {
            self.settle
        }
    }

    fn plan(start: f64, stop: f64, step: f64, dwell_ms: u64, reps: u32) -> SweepPlan {
        SweepPlan {
            start_hz: start,
            stop_hz: stop,
            step_hz: step,
            dwell: Duration::from_millis(dwell_ms),
            repetitions: reps,
        }
    }

    #[test]
    fn step_count_is_inclusive_of_stop() {
        assert_eq!(plan(50e6, 55e6, 1e6, 10, 1).step_count(), 6);
        assert_eq!(plan(1.0, 1.0, 1.0, 10, 1).step_count(), 1);
        assert_eq!(plan(0.1, 0.3, 0.1, 10, 1).step_count(), 3);
    }

    #[test]
    fn last_frequency_never_overshoots_stop() {
        let p = plan(100.0, 1050.0, 100.0, 10, 1);
        let freqs: Vec<f64> = p.frequencies().collect();
        assert_eq!(freqs.len(), 10);
        assert_eq!(freqs.last().copied(), Some(1000.0));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let err = SweepPlan::new(1.0, 1e18, 1e-300, Duration::ZERO, 1).unwrap_err();
        assert!(err.is_invalid_argument());
        let err = SweepPlan::new(1.0, 1e30, 1e-3, Duration::ZERO, 1).unwrap_err();
        assert!(err.is_invalid_argument());

        // Hand-built plans saturate instead of wrapping.
        assert_eq!(plan(1.0, 1e18, 1e-300, 0, 1).step_count(), u64::MAX);
    }

    #[test]
    fn validation_rejects_bad_plans() {
        for bad in [
            plan(1e6, 2e6, 0.0, 10, 1),
            plan(1e6, 2e6, -1e3, 10, 1),
            plan(f64::NAN, 2e6, 1e3, 10, 1),
            plan(1e6, f64::INFINITY, 1e3, 10, 1),
            plan(2e6, 1e6, 1e3, 10, 1),
            plan(0.0, 1e6, 1e3, 10, 1),
        ] {
            let err = bad.validate().unwrap_err();
            assert!(err.is_invalid_argument(), "{:?} should be rejected", bad);
        }
        assert!(SweepPlan::new(1e6, 2e6, 1e3, Duration::ZERO, 0).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dwell_is_net_of_settle_delay() {
        let mut dev = Recorder::new(Duration::from_millis(100));
        let report = Sweeper::new(&mut dev)
            .run(&plan(1e6, 3e6, 1e6, 250, 2))
            .await
            .unwrap();

        assert_eq!(dev.calls, vec![1e6, 2e6, 3e6, 1e6, 2e6, 3e6]);
        assert_eq!(report.steps, 6);
        assert_eq!(report.repetitions, 2);
        assert_eq!(report.elapsed, Duration::from_millis(6 * 250));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_repetitions_sends_nothing() {
        let mut dev = Recorder::new(Duration::from_millis(100));
        let mut sweeper = Sweeper::new(&mut dev);
        assert_eq!(sweeper.state(), SweepState::Idle);

        let report = sweeper.run(&plan(1e6, 3e6, 1e6, 10, 0)).await.unwrap();
        assert_eq!(sweeper.state(), SweepState::Done);
        assert_eq!(report.steps, 0);
        assert_eq!(report.elapsed, Duration::ZERO);
        assert!(dev.calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_step_fails_before_any_call() {
        let mut dev = Recorder::new(Duration::from_millis(100));
        let mut sweeper = Sweeper::new(&mut dev);

        let err = sweeper.run(&plan(1e6, 3e6, 0.0, 10, 1)).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(sweeper.state(), SweepState::Idle);
        assert!(dev.calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_step_aborts_remaining_work() {
        let mut dev = Recorder::new(Duration::from_millis(100));
        dev.fail_at = Some(4);
        let mut sweeper = Sweeper::new(&mut dev);

        let err = sweeper.run(&plan(1e6, 3e6, 1e6, 10, 3)).await.unwrap_err();
        match err {
            Sg6000Error::SweepAborted {
                repetition,
                step,
                frequency_hz,
                ..
            } => {
                assert_eq!(repetition, 1);
                assert_eq!(step, 1);
                assert_eq!(frequency_hz, 2e6);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sweeper.state(), SweepState::Done);
        assert_eq!(dev.calls, vec![1e6, 2e6, 3e6, 1e6]);
    }
}
