//! Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. A TOML file (`sg6000.toml` unless another path is given)
//! 3. Environment variables prefixed with `SG6000_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use sg6000::config::Sg6000Config;
//!
//! let config = Sg6000Config::load_from("sg6000.toml")?;
//! println!("device: {:?}", config.device.port);
//! # Ok::<(), sg6000::Sg6000Error>(())
//! ```
//!
//! ```toml
//! log_level = "debug"
//!
//! [device]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout = "1s"
//! send_delay = "100ms"
//!
//! [sweep]
//! start_hz = 50000000.0
//! stop_hz = 55000000.0
//! step_hz = 1000000.0
//! dwell = "10ms"
//! repetitions = 1
//! ```

use crate::error::{Result, Sg6000Error};
use crate::serial::SerialSettings;
use crate::sweep::SweepPlan;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sg6000.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SG6000_";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sg6000Config {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Serial device and link settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// Default sweep used when the CLI is not given one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepPlan>,
}

/// Serial device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Link parameters
    #[serde(flatten)]
    pub serial: SerialSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Sg6000Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            device: DeviceConfig::default(),
            sweep: None,
        }
    }
}

impl Sg6000Config {
    /// Load from [`DEFAULT_CONFIG_FILE`] (if present) and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path (if present) and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Provider stack behind [`Sg6000Config::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Sg6000Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Sg6000Error::invalid_config(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.device.serial.baud_rate == 0 {
            return Err(Sg6000Error::invalid_config("baud_rate must be non-zero"));
        }

        if self.device.serial.read_timeout.is_zero() {
            return Err(Sg6000Error::invalid_config("read_timeout must be non-zero"));
        }

        if let Some(port) = &self.device.port {
            if port.trim().is_empty() {
                return Err(Sg6000Error::invalid_config("device port must not be empty"));
            }
        }

        if let Some(plan) = &self.sweep {
            plan.validate()
                .map_err(|e| Sg6000Error::invalid_config(format!("[sweep] {}", e)))?;
        }

        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Sg6000Error::invalid_config(format!("cannot render configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DEFAULT_SEND_DELAY};
    use serial_test::serial;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn missing_file_yields_defaults() {
        let config = Sg6000Config::load_from("/nonexistent/sg6000.toml").unwrap();
        assert_eq!(config, Sg6000Config::default());
        assert_eq!(config.device.serial.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.device.serial.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.device.serial.send_delay, DEFAULT_SEND_DELAY);
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
            log_level = "debug"

            [device]
            port = "/dev/ttyUSB3"
            send_delay = "150ms"

            [sweep]
            start_hz = 50000000.0
            stop_hz = 55000000.0
            step_hz = 1000000.0
            dwell = "10ms"
            repetitions = 2
            "#,
        );

        let config = Sg6000Config::load_from(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyUSB3"));
        assert_eq!(config.device.serial.send_delay, Duration::from_millis(150));
        assert_eq!(config.device.serial.baud_rate, DEFAULT_BAUD_RATE);

        let sweep = config.sweep.unwrap();
        assert_eq!(sweep.step_count(), 6);
        assert_eq!(sweep.repetitions, 2);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let file = write_config("[device]\nport = \"/dev/ttyUSB0\"\n");
        std::env::set_var("SG6000_DEVICE__PORT", "/dev/ttyACM1");
        let result = Sg6000Config::load_from(file.path());
        std::env::remove_var("SG6000_DEVICE__PORT");

        assert_eq!(result.unwrap().device.port.as_deref(), Some("/dev/ttyACM1"));
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        let file = write_config("log_level = \"loud\"\n");
        let err = Sg6000Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Sg6000Error::InvalidConfig(_)));

        let file = write_config("[device]\nbaud_rate = 0\n");
        let err = Sg6000Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Sg6000Error::InvalidConfig(_)));

        let file = write_config("[sweep]\nstart_hz = 1.0\nstop_hz = 2.0\nstep_hz = 0.0\ndwell = \"1ms\"\nrepetitions = 1\n");
        let err = Sg6000Config::load_from(file.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("[sweep]"));

        let file = write_config("[device]\nbaud_rate = \"fast\"\n");
        let err = Sg6000Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Sg6000Error::Config(_)));
    }

    #[test]
    fn renders_as_toml() {
        let rendered = Sg6000Config::default().to_toml().unwrap();
        assert!(rendered.contains("log_level = \"info\""));
        assert!(rendered.contains("send_delay = \"100ms\""));
    }
}
