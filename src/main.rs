//! CLI Entry Point for sg6000
//!
//! Opens the signal generator on a serial port (or a simulated one with
//! `--mock`) and runs a single operation, a sweep, or the demonstration
//! sequence.
//!
//! # Usage
//!
//! ```bash
//! sg6000 --port /dev/ttyUSB0 status
//! sg6000 --port /dev/ttyUSB0 freq 500e6
//! sg6000 --port /dev/ttyUSB0 power -15
//! sg6000 --port /dev/ttyUSB0 rf on
//! sg6000 --port /dev/ttyUSB0 sweep --start 50e6 --stop 55e6 --step 1e6 --dwell-ms 10
//! sg6000 --mock demo
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sg6000::config::{Sg6000Config, DEFAULT_CONFIG_FILE};
use sg6000::logging::{self, LogFormat, TracingConfig};
use sg6000::mock::{SimulatedHandle, SimulatedInstrument};
use sg6000::sweep::{SweepPlan, Sweeper};
use sg6000::{OutputState, Sg6000};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sg6000")]
#[command(about = "Control a DS Instruments SG6000 signal generator over serial", long_about = None)]
struct Cli {
    /// Serial port (overrides the configuration file)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Talk to a simulated instrument instead of hardware
    #[arg(long, global = true, conflicts_with = "port")]
    mock: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (overrides the configuration file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the identification string
    Identify,

    /// Reset the instrument
    Reset,

    /// Print identity, frequency, power and RF output state
    Status,

    /// Get, or set when HZ is given, the CW frequency
    Freq {
        /// Frequency in Hz (e.g. 500e6)
        hz: Option<f64>,
    },

    /// Get, or set when DBM is given, the output power
    Power {
        /// Output level in dBm
        #[arg(allow_negative_numbers = true)]
        dbm: Option<f64>,
    },

    /// Get, or set when STATE is given, the RF output
    Rf {
        /// "on" or "off" (passed through as typed)
        state: Option<String>,
    },

    /// Set the buzzer state
    Buzzer {
        /// "on" or "off" (passed through as typed)
        state: String,
    },

    /// Run a stepped frequency sweep
    Sweep {
        /// First frequency in Hz
        #[arg(long)]
        start: Option<f64>,
        /// Last frequency in Hz (inclusive)
        #[arg(long)]
        stop: Option<f64>,
        /// Step in Hz
        #[arg(long)]
        step: Option<f64>,
        /// Dwell per step in milliseconds
        #[arg(long)]
        dwell_ms: Option<u64>,
        /// Number of passes
        #[arg(long)]
        reps: Option<u32>,
    },

    /// Reset, report, set 500 MHz at -15 dBm, pulse the RF output for 2 s
    Demo,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Sg6000Config::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    logging::init(TracingConfig::from_level_name(level)?.with_format(cli.log_format))?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let (mut synth, simulator) = open(&cli, &config).await?;
    let result = run(&mut synth, cli.command, &config).await;
    synth.close().await;
    if let Some(handle) = simulator {
        handle.abort();
    }
    result
}

/// Open the instrument. Failing to open the port ends the program.
async fn open(cli: &Cli, config: &Sg6000Config) -> Result<(Sg6000, Option<SimulatedHandle>)> {
    let settings = &config.device.serial;

    if cli.mock {
        let (synth, handle) = SimulatedInstrument::new().connect(settings);
        return Ok((synth, Some(handle)));
    }

    let Some(port) = cli.port.as_deref().or(config.device.port.as_deref()) else {
        bail!("No serial port given; use --port, set device.port in the configuration, or pass --mock");
    };

    let synth = Sg6000::connect(port, settings)
        .await
        .with_context(|| format!("Cannot talk to the SG6000 on {}", port))?;
    Ok((synth, None))
}

async fn run(synth: &mut Sg6000, command: Commands, config: &Sg6000Config) -> Result<()> {
    match command {
        Commands::Identify => println!("{}", synth.get_identity().await?),
        Commands::Reset => synth.reset().await?,
        Commands::Status => {
            println!("IDN = {}", synth.get_identity().await?);
            println!("freq = {}", synth.get_frequency().await?);
            println!("Power = {} dBm", synth.get_power().await?);
            println!("RF output = {}", synth.get_rf_output().await?);
        }
        Commands::Freq { hz: Some(hz) } => synth.set_frequency(hz).await?,
        Commands::Freq { hz: None } => println!("{}", synth.get_frequency().await?),
        Commands::Power { dbm: Some(dbm) } => synth.set_power(dbm).await?,
        Commands::Power { dbm: None } => println!("{}", synth.get_power().await?),
        Commands::Rf { state: Some(state) } => synth.set_rf_output(state).await?,
        Commands::Rf { state: None } => println!("{}", synth.get_rf_output().await?),
        Commands::Buzzer { state } => synth.set_buzzer(state).await?,
        Commands::Sweep {
            start,
            stop,
            step,
            dwell_ms,
            reps,
        } => {
            let plan = sweep_plan(config.sweep.as_ref(), start, stop, step, dwell_ms, reps)?;
            let report = Sweeper::new(synth).run(&plan).await?;
            println!(
                "Swept {} steps over {} repetition(s) in {:.3} s",
                report.steps,
                report.repetitions,
                report.elapsed.as_secs_f64()
            );
        }
        Commands::Demo => demo(synth).await?,
        Commands::Config => {}
    }
    Ok(())
}

/// Merge command-line sweep options over the configured default sweep.
fn sweep_plan(
    configured: Option<&SweepPlan>,
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
    dwell_ms: Option<u64>,
    reps: Option<u32>,
) -> Result<SweepPlan> {
    let pick = |given: Option<f64>, fallback: Option<f64>, name: &str| {
        given
            .or(fallback)
            .with_context(|| format!("Sweep needs --{} (or a [sweep] section in the configuration)", name))
    };

    let plan = SweepPlan::new(
        pick(start, configured.map(|p| p.start_hz), "start")?,
        pick(stop, configured.map(|p| p.stop_hz), "stop")?,
        pick(step, configured.map(|p| p.step_hz), "step")?,
        dwell_ms
            .map(Duration::from_millis)
            .or(configured.map(|p| p.dwell))
            .unwrap_or(Duration::from_millis(100)),
        reps.or(configured.map(|p| p.repetitions)).unwrap_or(1),
    )?;
    Ok(plan)
}

async fn demo(synth: &mut Sg6000) -> Result<()> {
    synth.reset().await?;

    println!("IDN = {}", synth.get_identity().await?);
    // Hz is part of the returned string
    println!("freq = {}", synth.get_frequency().await?);

    synth.set_frequency(500e6).await?;

    println!("Power = {} dBm", synth.get_power().await?);
    synth.set_power(-15.0).await?;

    synth.set_rf_output(OutputState::On).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    synth.set_rf_output(OutputState::Off).await?;
    Ok(())
}
