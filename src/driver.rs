//! DS Instruments SG6000 Signal Generator Driver
//!
//! Reference: DS Instruments SCPI command list
//!
//! Protocol Overview:
//! - Format: SCPI-like ASCII (see [`crate::commands`])
//! - Baud: 115200, 8N1, no flow control
//! - Terminator: CR only (`\r`) on commands; responses end in CR and/or LF
//! - Pacing: the instrument drops back-to-back commands, so every command is
//!   followed by a fixed pause (100 ms by default) before the next one
//!
//! Queries return the trimmed response line verbatim. Frequency responses keep
//! their unit suffix (`"500000000Hz"`); nothing is parsed numerically.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sg6000::{Sg6000, SerialSettings};
//!
//! let mut synth = Sg6000::connect("/dev/ttyUSB0", &SerialSettings::default()).await?;
//! synth.reset().await?;
//! println!("IDN = {}", synth.get_identity().await?);
//! synth.set_frequency(500e6).await?;
//! synth.set_power(-15.0).await?;
//! synth.set_rf_output("on").await?;
//! ```

use crate::capabilities::FrequencyTunable;
use crate::commands::{self, Command};
use crate::error::Result;
use crate::serial::{SerialSettings, Session};
use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

/// Driver for an SG6000 signal generator.
///
/// Owns its [`Session`] exclusively. Holds no cached instrument state; every
/// getter goes to the hardware.
#[derive(Debug)]
pub struct Sg6000 {
    session: Session,
    send_delay: Duration,
}

impl Sg6000 {
    /// Open `device` and build a driver over it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Sg6000Error::Connection`] if the serial port cannot
    /// be opened. Deciding whether that ends the process is up to the caller.
    pub async fn connect(device: &str, settings: &SerialSettings) -> Result<Self> {
        let session = Session::open(device, settings).await?;
        tracing::info!(device, "SG6000 connected");
        Ok(Self::new(session, settings.send_delay))
    }

    /// Build a driver over an already-open session.
    pub fn new(session: Session, send_delay: Duration) -> Self {
        Self {
            session,
            send_delay,
        }
    }

    /// Pause applied after every command.
    pub fn delay(&self) -> Duration {
        self.send_delay
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Close the serial session. Further commands fail with an I/O error.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Send a command that produces no response.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        self.session.write_line(command).await?;
        self.pace().await;
        Ok(())
    }

    /// Send a query and return its trimmed response line.
    ///
    /// A query that gets no answer within the read timeout yields `""`.
    pub async fn send_command_with_response(&mut self, command: &str) -> Result<String> {
        self.session.discard_buffered();
        self.session.write_line(command).await?;
        let response = self.session.read_line().await?;
        self.pace().await;

        let trimmed = response.trim().to_string();
        if trimmed.is_empty() {
            tracing::debug!(cmd = %command, "SG6000: no response");
        } else {
            tracing::debug!(cmd = %command, "SG6000: response {:?}", trimmed);
        }
        Ok(trimmed)
    }

    async fn pace(&mut self) {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Read the identification string (`*IDN?`).
    #[instrument(skip(self), err)]
    pub async fn get_identity(&mut self) -> Result<String> {
        self.send_command_with_response(&Command::Identify.query())
            .await
    }

    /// Reset the instrument (`*RST`).
    #[instrument(skip(self), err)]
    pub async fn reset(&mut self) -> Result<()> {
        self.send_command(&Command::Reset.bare()).await
    }

    /// Read the CW frequency (`FREQ:CW?`), unit suffix included.
    #[instrument(skip(self), err)]
    pub async fn get_frequency(&mut self) -> Result<String> {
        self.send_command_with_response(&Command::Frequency.query())
            .await
    }

    /// Set the CW frequency (`FREQ:CW <hz>`).
    ///
    /// Fractional hertz are truncated. Non-finite or out-of-range values fail
    /// with `InvalidArgument` and nothing is written.
    #[instrument(skip(self), err)]
    pub async fn set_frequency(&mut self, hz: f64) -> Result<()> {
        let whole_hz = commands::frequency_hz(hz)?;
        self.send_command(&Command::Frequency.with_arg(whole_hz))
            .await
    }

    /// Read the output level (`POWER?`).
    #[instrument(skip(self), err)]
    pub async fn get_power(&mut self) -> Result<String> {
        self.send_command_with_response(&Command::Power.query()).await
    }

    /// Set the output level in dBm (`POWER <dbm>`).
    #[instrument(skip(self), err)]
    pub async fn set_power(&mut self, dbm: f64) -> Result<()> {
        let level = commands::power_dbm(dbm)?;
        self.send_command(&Command::Power.with_arg(level)).await
    }

    /// Read the RF output state (`OUTP:STAT?`) as the instrument words it.
    #[instrument(skip(self), err)]
    pub async fn get_rf_output(&mut self) -> Result<String> {
        self.send_command_with_response(&Command::RfOutput.query())
            .await
    }

    /// Set the RF output state (`OUTP:STAT <state>`).
    ///
    /// `state` is passed through as given, e.g. `"on"`, `"OFF"` or an
    /// [`commands::OutputState`].
    #[instrument(skip(self, state), fields(state = state.as_ref()), err)]
    pub async fn set_rf_output(&mut self, state: impl AsRef<str> + Send) -> Result<()> {
        let token = commands::state_token(state.as_ref())?;
        self.send_command(&Command::RfOutput.with_arg(token)).await
    }

    /// Set the buzzer state (`*BUZZER <state>`). Same pass-through rule as
    /// [`Sg6000::set_rf_output`].
    #[instrument(skip(self, state), fields(state = state.as_ref()), err)]
    pub async fn set_buzzer(&mut self, state: impl AsRef<str> + Send) -> Result<()> {
        let token = commands::state_token(state.as_ref())?;
        self.send_command(&Command::Buzzer.with_arg(token)).await
    }
}

#[async_trait]
impl FrequencyTunable for Sg6000 {
    async fn set_frequency(&mut self, hz: f64) -> Result<()> {
        Sg6000::set_frequency(self, hz).await
    }

    fn settle_delay(&self) -> Duration {
        self.send_delay
    }
}
