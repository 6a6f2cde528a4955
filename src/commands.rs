//! SG6000 command table and line formatting.
//!
//! Reference: DS Instruments SCPI command list for the SG6000 series.
//!
//! Protocol Overview:
//! - Format: SCPI-like ASCII, one command per line
//! - Terminator: CR only (`\r`), appended by the transport session
//! - Queries: token followed by `?`, no argument (e.g. `FREQ:CW?`)
//! - Writes: token, a space, then the argument (e.g. `FREQ:CW 500000000`)

use crate::error::{Result, Sg6000Error};
use std::fmt;
use std::str::FromStr;

/// Logical operations understood by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `*IDN` - identification string
    Identify,
    /// `*RST` - reset instrument
    Reset,
    /// `FREQ:CW` - CW frequency in Hz
    Frequency,
    /// `POWER` - output level in dBm
    Power,
    /// `OUTP:STAT` - RF output enable
    RfOutput,
    /// `*BUZZER` - audible buzzer enable
    Buzzer,
}

impl Command {
    /// Every command in the table.
    pub const ALL: [Command; 6] = [
        Command::Identify,
        Command::Reset,
        Command::Frequency,
        Command::Power,
        Command::RfOutput,
        Command::Buzzer,
    ];

    /// Protocol token for this command.
    pub const fn token(self) -> &'static str {
        match self {
            Command::Identify => "*IDN",
            Command::Reset => "*RST",
            Command::Frequency => "FREQ:CW",
            Command::Power => "POWER",
            Command::RfOutput => "OUTP:STAT",
            Command::Buzzer => "*BUZZER",
        }
    }

    /// Query line, e.g. `FREQ:CW?`.
    pub fn query(self) -> String {
        format!("{}?", self.token())
    }

    /// Bare command line with no argument, e.g. `*RST`.
    pub fn bare(self) -> String {
        self.token().to_string()
    }

    /// Command line carrying an argument, e.g. `POWER -15.0`.
    pub fn with_arg(self, arg: impl fmt::Display) -> String {
        format!("{} {}", self.token(), arg)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Coerce a frequency to whole hertz.
///
/// Fractional hertz are truncated toward zero. NaN, infinities and values
/// outside the `i64` range cannot be represented and are rejected.
pub fn frequency_hz(hz: f64) -> Result<i64> {
    if !hz.is_finite() {
        return Err(Sg6000Error::invalid(format!(
            "frequency must be a finite number of Hz, got {}",
            hz
        )));
    }
    let truncated = hz.trunc();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Sg6000Error::invalid(format!(
            "frequency {} Hz is not representable as an integer",
            hz
        )));
    }
    Ok(truncated as i64)
}

/// Render a power level the way the instrument expects it.
///
/// Ordinary levels always carry a decimal point (`-15` becomes `-15.0`).
/// Nonzero magnitudes below `1e-4` or from `1e16` up switch to exponent form
/// (`1e-6`, `1e16`), which is far outside any level the instrument accepts.
pub fn power_dbm(dbm: f64) -> Result<String> {
    if !dbm.is_finite() {
        return Err(Sg6000Error::invalid(format!(
            "power must be a finite number of dBm, got {}",
            dbm
        )));
    }
    Ok(format!("{:?}", dbm))
}

/// Validate a pass-through state token (`on`, `off`, or anything the
/// instrument accepts). Case is preserved.
///
/// Line breaks are rejected so one call always writes exactly one command.
pub fn state_token(state: &str) -> Result<&str> {
    if state.trim().is_empty() {
        return Err(Sg6000Error::invalid("state token must not be empty"));
    }
    if state.contains(['\r', '\n']) {
        return Err(Sg6000Error::invalid(format!(
            "state token {:?} must not contain line breaks",
            state
        )));
    }
    Ok(state)
}

/// On/off state for RF output and buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Enabled
    On,
    /// Disabled
    Off,
}

impl OutputState {
    /// Lowercase token sent on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            OutputState::On => "on",
            OutputState::Off => "off",
        }
    }
}

impl AsRef<str> for OutputState {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for OutputState {
    fn from(enabled: bool) -> Self {
        if enabled {
            OutputState::On
        } else {
            OutputState::Off
        }
    }
}

impl FromStr for OutputState {
    type Err = Sg6000Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" => Ok(OutputState::On),
            "off" | "0" => Ok(OutputState::Off),
            other => Err(Sg6000Error::invalid(format!(
                "expected 'on' or 'off', got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_command_list() {
        let tokens: Vec<_> = Command::ALL.iter().map(|c| c.token()).collect();
        assert_eq!(
            tokens,
            vec!["*IDN", "*RST", "FREQ:CW", "POWER", "OUTP:STAT", "*BUZZER"]
        );
    }

    #[test]
    fn query_and_argument_lines() {
        assert_eq!(Command::Identify.query(), "*IDN?");
        assert_eq!(Command::Reset.bare(), "*RST");
        assert_eq!(Command::Frequency.with_arg(500_000_000), "FREQ:CW 500000000");
        assert_eq!(Command::Buzzer.with_arg("off"), "*BUZZER off");
    }

    #[test]
    fn frequency_truncates_toward_zero() {
        assert_eq!(frequency_hz(500e6).unwrap(), 500_000_000);
        assert_eq!(frequency_hz(1234.9).unwrap(), 1234);
        assert_eq!(frequency_hz(-0.5).unwrap(), 0);
    }

    #[test]
    fn frequency_rejects_unrepresentable_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e19, -1e19] {
            let err = frequency_hz(bad).unwrap_err();
            assert!(err.is_invalid_argument(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn power_always_has_decimal_point() {
        assert_eq!(power_dbm(-15.0).unwrap(), "-15.0");
        assert_eq!(power_dbm(2.5).unwrap(), "2.5");
        assert_eq!(power_dbm(0.0).unwrap(), "0.0");
        assert!(power_dbm(f64::NAN).is_err());
    }

    #[test]
    fn state_token_passes_case_through() {
        assert_eq!(state_token("ON").unwrap(), "ON");
        assert_eq!(state_token("off").unwrap(), "off");
        assert!(state_token("").is_err());
        assert!(state_token("   ").is_err());
    }

    #[test]
    fn state_token_rejects_line_breaks() {
        for bad in ["on\rFREQ:CW 1", "off\n", "\r\non"] {
            assert!(state_token(bad).unwrap_err().is_invalid_argument());
        }
    }

    #[test]
    fn extreme_power_levels_use_exponent_form() {
        assert_eq!(power_dbm(1e-6).unwrap(), "1e-6");
        assert_eq!(power_dbm(1e16).unwrap(), "1e16");
    }

    #[test]
    fn output_state_parsing() {
        assert_eq!("On".parse::<OutputState>().unwrap(), OutputState::On);
        assert_eq!("0".parse::<OutputState>().unwrap(), OutputState::Off);
        assert!("maybe".parse::<OutputState>().is_err());
        assert_eq!(OutputState::from(true).to_string(), "on");
    }
}
