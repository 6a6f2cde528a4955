//! Serial control client for DS Instruments SG6000 signal generators.
//!
//! The instrument speaks a small SCPI-like ASCII protocol over a USB serial
//! link (115200 baud, CR-terminated commands). This crate provides:
//!
//! - [`serial::Session`]: exclusive, line-oriented serial session with a timed
//!   line read
//! - [`Sg6000`]: typed operations (identity, reset, frequency, power, RF output,
//!   buzzer) with the inter-command pacing the hardware needs
//! - [`sweep::Sweeper`]: stepped frequency sweeps with dwell compensation
//! - [`mock::SimulatedInstrument`]: an in-memory instrument for tests and demos
//! - [`config`] and [`logging`]: Figment configuration and tracing setup for the
//!   `sg6000` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use sg6000::{Sg6000, SerialSettings};
//! use sg6000::sweep::{SweepPlan, Sweeper};
//! use std::time::Duration;
//!
//! let mut synth = Sg6000::connect("/dev/ttyUSB0", &SerialSettings::default()).await?;
//! println!("IDN = {}", synth.get_identity().await?);
//!
//! let plan = SweepPlan::new(50e6, 55e6, 1e6, Duration::from_millis(10), 1)?;
//! Sweeper::new(&mut synth).run(&plan).await?;
//! ```

pub mod capabilities;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mock;
pub mod serial;
pub mod sweep;

pub use capabilities::FrequencyTunable;
pub use commands::{Command, OutputState};
pub use driver::Sg6000;
pub use error::{Result, Sg6000Error};
pub use serial::{SerialSettings, Session};
pub use sweep::{SweepPlan, SweepReport, SweepState, Sweeper};
