//! Simulated SG6000 for testing without hardware.
//!
//! [`SimulatedInstrument`] runs as a Tokio task on the far end of a
//! `tokio::io::duplex` pipe. It splits incoming bytes on CR, records every
//! command line, applies writes to its state, and answers queries from that
//! state the way the real instrument does (CR LF terminated).
//!
//! # Example
//!
//! ```rust,ignore
//! use sg6000::mock::SimulatedInstrument;
//!
//! let (mut synth, handle) = SimulatedInstrument::new().connect_default();
//! synth.set_rf_output("on").await?;
//! assert_eq!(synth.get_rf_output().await?, "on");
//! assert_eq!(handle.commands(), vec!["OUTP:STAT on", "OUTP:STAT?"]);
//! ```

use crate::commands::Command;
use crate::driver::Sg6000;
use crate::serial::{SerialSettings, Session};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Identification string reported by default.
pub const DEFAULT_IDENTITY: &str = "DS INSTRUMENTS,SG6000PRO,SIMULATED,1.0";

/// Instrument state as the simulator tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedState {
    /// Reply to `*IDN?`
    pub identity: String,
    /// Last frequency set, in Hz
    pub frequency_hz: i64,
    /// Last power argument, verbatim
    pub power: String,
    /// Last RF output argument, verbatim
    pub rf_output: String,
    /// Last buzzer argument, verbatim
    pub buzzer: String,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            frequency_hz: 1_000_000_000,
            power: "0.0".to_string(),
            rf_output: "OFF".to_string(),
            buzzer: "ON".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: SimulatedState,
    commands: Vec<String>,
    raw: Vec<u8>,
    closed: bool,
}

/// Builder for a simulated instrument.
#[derive(Debug, Clone, Default)]
pub struct SimulatedInstrument {
    state: SimulatedState,
    silent: bool,
    hang_up_after: Option<usize>,
}

impl SimulatedInstrument {
    /// Instrument with default state that answers every query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `identity` for `*IDN?`.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.state.identity = identity.into();
        self
    }

    /// Never answer queries (every query times out).
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Drop the link after `count` command lines have been received, as if
    /// the USB cable were pulled.
    pub fn hang_up_after(mut self, count: usize) -> Self {
        self.hang_up_after = Some(count);
        self
    }

    /// Start the simulator and return the client end of the pipe.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> (DuplexStream, SimulatedHandle) {
        let (client, device) = tokio::io::duplex(1024);
        let shared = Arc::new(Mutex::new(Shared {
            state: self.state,
            ..Default::default()
        }));

        let task = tokio::spawn(run(
            device,
            Arc::clone(&shared),
            self.silent,
            self.hang_up_after,
        ));

        (client, SimulatedHandle { shared, task })
    }

    /// Start the simulator and build a driver over it.
    pub fn connect(self, settings: &SerialSettings) -> (Sg6000, SimulatedHandle) {
        let (client, handle) = self.spawn();
        let session = Session::from_stream("simulated", Box::new(client), settings);
        (Sg6000::new(session, settings.send_delay), handle)
    }

    /// [`SimulatedInstrument::connect`] with default serial settings.
    pub fn connect_default(self) -> (Sg6000, SimulatedHandle) {
        self.connect(&SerialSettings::default())
    }
}

/// Test-side view of a running simulator.
#[derive(Debug)]
pub struct SimulatedHandle {
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl SimulatedHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Every command line received so far, without the CR.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Every byte received so far.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.lock().raw.clone()
    }

    /// Snapshot of the simulated state.
    pub fn state(&self) -> SimulatedState {
        self.lock().state.clone()
    }

    /// Last frequency set, in Hz.
    pub fn frequency_hz(&self) -> i64 {
        self.lock().state.frequency_hz
    }

    /// Last buzzer state, verbatim.
    pub fn buzzer(&self) -> String {
        self.lock().state.buzzer.clone()
    }

    /// True once the client side has closed the link (or the simulator hung up).
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Stop the simulator task.
    pub fn abort(&self) {
        self.task.abort();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run(
    mut device: DuplexStream,
    shared: Arc<Mutex<Shared>>,
    silent: bool,
    hang_up_after: Option<usize>,
) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 256];

    loop {
        let n = match device.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);
        lock(&shared).raw.extend_from_slice(&buf[..n]);

        while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]).into_owned();

            let (reply, received) = {
                let mut guard = lock(&shared);
                guard.commands.push(line.clone());
                let reply = apply(&mut guard.state, &line);
                (reply, guard.commands.len())
            };

            if hang_up_after.is_some_and(|limit| received >= limit) {
                tracing::debug!("simulated SG6000 hanging up after {} commands", received);
                lock(&shared).closed = true;
                return;
            }

            if let (Some(reply), false) = (reply, silent) {
                let framed = format!("{}\r\n", reply);
                if device.write_all(framed.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    }

    lock(&shared).closed = true;
}

/// Apply one command line to `state`; returns the reply for queries.
fn apply(state: &mut SimulatedState, line: &str) -> Option<String> {
    let (head, arg) = match line.split_once(' ') {
        Some((head, arg)) => (head, Some(arg.trim())),
        None => (line.trim(), None),
    };

    if let Some(token) = head.strip_suffix('?') {
        return match token {
            t if t == Command::Identify.token() => Some(state.identity.clone()),
            t if t == Command::Frequency.token() => Some(format!("{}Hz", state.frequency_hz)),
            t if t == Command::Power.token() => Some(state.power.clone()),
            t if t == Command::RfOutput.token() => Some(state.rf_output.clone()),
            t if t == Command::Buzzer.token() => Some(state.buzzer.clone()),
            _ => None,
        };
    }

    match (head, arg) {
        (t, None) if t == Command::Reset.token() => {
            let identity = std::mem::take(&mut state.identity);
            *state = SimulatedState {
                identity,
                ..Default::default()
            };
        }
        (t, Some(arg)) if t == Command::Frequency.token() => {
            if let Ok(hz) = arg.parse() {
                state.frequency_hz = hz;
            }
        }
        (t, Some(arg)) if t == Command::Power.token() => state.power = arg.to_string(),
        (t, Some(arg)) if t == Command::RfOutput.token() => state.rf_output = arg.to_string(),
        (t, Some(arg)) if t == Command::Buzzer.token() => state.buzzer = arg.to_string(),
        _ => tracing::debug!("simulated SG6000 ignoring {:?}", line),
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_report_state() {
        let mut state = SimulatedState::default();
        assert_eq!(apply(&mut state, "*IDN?").as_deref(), Some(DEFAULT_IDENTITY));
        assert_eq!(apply(&mut state, "FREQ:CW?").as_deref(), Some("1000000000Hz"));
        assert_eq!(apply(&mut state, "BOGUS?"), None);
    }

    #[test]
    fn writes_update_state_verbatim() {
        let mut state = SimulatedState::default();
        assert_eq!(apply(&mut state, "FREQ:CW 50000000"), None);
        assert_eq!(apply(&mut state, "POWER -15.0"), None);
        assert_eq!(apply(&mut state, "OUTP:STAT On"), None);
        assert_eq!(state.frequency_hz, 50_000_000);
        assert_eq!(state.power, "-15.0");
        assert_eq!(state.rf_output, "On");
    }

    #[test]
    fn reset_restores_defaults_but_keeps_identity() {
        let mut state = SimulatedState {
            identity: "custom".to_string(),
            ..Default::default()
        };
        apply(&mut state, "POWER 3.0");
        apply(&mut state, "*RST");
        assert_eq!(state.power, "0.0");
        assert_eq!(state.identity, "custom");
    }

    #[tokio::test]
    async fn closing_the_client_ends_the_task() {
        let (client, handle) = SimulatedInstrument::new().spawn();
        drop(client);
        // Give the simulator a chance to observe EOF.
        for _ in 0..10 {
            if handle.is_closed() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(handle.is_closed());
    }
}
