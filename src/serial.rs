//! Line-oriented serial session.
//!
//! This module owns the byte stream to the instrument and exposes the two
//! primitives the driver is built from: write one CR-terminated line and read
//! one response line with a timeout.
//!
//! # Types
//!
//! - [`SerialPortIO`]: Trait alias combining AsyncRead + AsyncWrite for serial ports
//! - [`DynSerial`]: Type-erased boxed serial port
//! - [`SerialSettings`]: Fixed link parameters (baud, read timeout, send delay)
//! - [`Session`]: Exclusive owner of one open stream
//!
//! # Example
//!
//! ```rust,ignore
//! use sg6000::serial::{Session, SerialSettings};
//!
//! let mut session = Session::open("/dev/ttyUSB0", &SerialSettings::default()).await?;
//! session.write_line("*IDN?").await?;
//! let idn = session.read_line().await?;
//! session.close().await;
//! ```

use crate::error::{Result, Sg6000Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::spawn_blocking;
use tokio_serial::SerialPortBuilderExt;

/// Line delimiter appended to every command.
pub const DELIMITER: &str = "\r";

/// Default baud rate of the SG6000 USB serial interface.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default time `read_line` waits for a response line.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default quiescent pause after every command.
///
/// Back-to-back commands are dropped by the instrument without it.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Serial Port Trait
// =============================================================================

/// Trait alias for async serial port I/O.
///
/// Any type implementing `AsyncRead + AsyncWrite + Unpin + Send` can be used
/// as a serial port. This includes:
/// - `tokio_serial::SerialStream` (real hardware)
/// - `tokio::io::DuplexStream` (testing, simulated instrument)
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

// Blanket implementation for all types meeting the requirements
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed serial port.
pub type DynSerial = Box<dyn SerialPortIO>;

// =============================================================================
// Settings
// =============================================================================

/// Serial link parameters, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate (115200 for the SG6000)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Upper bound on a single `read_line`
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Pause after every command before the next may be sent
    #[serde(default = "default_send_delay", with = "humantime_serde")]
    pub send_delay: Duration,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_send_delay() -> Duration {
    DEFAULT_SEND_DELAY
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            send_delay: DEFAULT_SEND_DELAY,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Exclusive owner of one open serial stream.
///
/// The stream is released on [`Session::close`] or when the session is
/// dropped, whichever comes first.
pub struct Session {
    device: String,
    port: Option<BufReader<DynSerial>>,
    read_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("open", &self.is_open())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl Session {
    /// Open the serial device at `device` with 8N1 framing and no flow control.
    ///
    /// The open runs on a blocking thread so the runtime is not stalled.
    ///
    /// # Errors
    ///
    /// Returns [`Sg6000Error::Connection`] if the port cannot be opened
    /// (not found, permission denied, busy).
    pub async fn open(device: &str, settings: &SerialSettings) -> Result<Self> {
        let path = device.to_string();
        let baud_rate = settings.baud_rate;
        let read_timeout = settings.read_timeout;

        let opened = spawn_blocking(move || {
            tokio_serial::new(&path, baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .timeout(read_timeout)
                .open_native_async()
        })
        .await
        .map_err(|e| Sg6000Error::Connection {
            device: device.to_string(),
            source: std::io::Error::other(e),
        })?;

        let port = opened.map_err(|e| Sg6000Error::Connection {
            device: device.to_string(),
            source: e.into(),
        })?;

        tracing::info!(device, baud_rate, "Opened serial session");
        Ok(Self::from_stream(device, Box::new(port), settings))
    }

    /// Wrap an already-open stream (simulated instrument, test pipe).
    pub fn from_stream(device: impl Into<String>, stream: DynSerial, settings: &SerialSettings) -> Self {
        Self {
            device: device.into(),
            port: Some(BufReader::new(stream)),
            read_timeout: settings.read_timeout,
        }
    }

    /// Device path or label this session was opened for.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Read timeout applied to every `read_line`.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// True until [`Session::close`] has been called.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> Result<&mut BufReader<DynSerial>> {
        self.port.as_mut().ok_or_else(|| {
            Sg6000Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "serial session is closed",
            ))
        })
    }

    /// Write `text` followed by the CR delimiter and flush it to the OS.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let line = format!("{}{}", text, DELIMITER);
        tracing::debug!(device = %self.device, "serial write: {:?}", line);

        let port = self.port_mut()?.get_mut();
        port.write_all(line.as_bytes()).await?;
        port.flush().await?;
        Ok(())
    }

    /// Read one response line.
    ///
    /// Accumulates bytes until `\n` or `\r` arrives or the read timeout
    /// elapses. Whatever was received is returned with the terminator removed;
    /// a timeout or end-of-stream simply yields a shorter (possibly empty)
    /// string.
    pub async fn read_line(&mut self) -> Result<String> {
        let read_timeout = self.read_timeout;
        let device = self.device.clone();
        let port = self.port_mut()?;

        let mut raw = Vec::new();
        let deadline = tokio::time::Instant::now() + read_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::debug!(device = %device, "serial read timed out after {:?}", read_timeout);
                break;
            }

            let buf = match tokio::time::timeout(remaining, port.fill_buf()).await {
                Ok(Ok(buf)) => buf,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    tracing::debug!(device = %device, "serial read timed out after {:?}", read_timeout);
                    break;
                }
            };

            if buf.is_empty() {
                // End of stream
                break;
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                raw.extend_from_slice(&buf[..pos]);
                port.consume(pos + 1);
                if !raw.is_empty() {
                    break;
                }
                // Leading terminator left over from a CRLF pair; keep reading.
                continue;
            }

            let len = buf.len();
            raw.extend_from_slice(buf);
            port.consume(len);
        }

        let line = String::from_utf8_lossy(&raw).into_owned();
        tracing::debug!(device = %device, "serial read: {:?}", line);
        Ok(line)
    }

    /// Drop bytes already sitting in the read buffer (late replies to an
    /// earlier, timed-out query). Does not wait for new data.
    pub fn discard_buffered(&mut self) -> usize {
        let Some(port) = self.port.as_mut() else {
            return 0;
        };
        let len = port.buffer().len();
        if len > 0 {
            tracing::debug!(device = %self.device, "discarding {} stale bytes", len);
            port.consume(len);
        }
        len
    }

    /// Release the stream. Calling this more than once is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.get_mut().shutdown().await {
                tracing::debug!(device = %self.device, "error while closing serial session: {}", e);
            }
            tracing::info!(device = %self.device, "Closed serial session");
        }
    }
}
