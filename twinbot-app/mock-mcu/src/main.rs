mod host;
mod scenario;
mod settings;

use std::{path::PathBuf, sync::atomic::Ordering, thread, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use embassy_time::Delay;
use tracing::{error, info};
use twinbot_core::utils::{
    config::{CarConfig, DispenserConfig},
    connection::{SerialLink, Source},
    controllers::{CarController, CycleOutcome, Dispenser, MotorDriver, PumpBank},
};

use host::{LogPin, StdinConsole, TcpLink};
use scenario::Scenario;
use settings::Settings;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON file overriding the default tunables
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    sketch: Sketch,
}

#[derive(Subcommand)]
enum Sketch {
    /// Drive the car from stdin and an optional TCP "Bluetooth" client
    Car {
        /// port on 127.0.0.1 standing in for the Bluetooth module
        #[clap(long)]
        bt_port: Option<u16>,
    },
    /// Run the dispenser against scripted sensor readings
    Dispenser {
        /// JSON scenario with calibration samples and per-cycle readings
        #[clap(long)]
        scenario: PathBuf,
        /// answer the three calibration prompts without waiting for stdin
        #[clap(long)]
        auto_calibrate: bool,
    },
}

/// Pause between polling passes so the host loop does not spin.
const CAR_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn run_car(
    config: CarConfig,
    bt_port: Option<u16>,
) -> Result<()> {
    let motors = MotorDriver::new(
        LogPin::new("IN1"),
        LogPin::new("IN2"),
        LogPin::new("IN3"),
        LogPin::new("IN4"),
    )?;
    let console = StdinConsole::spawn(true);
    let stdin_done = console.eof_flag();
    let bluetooth = match bt_port {
        Some(port) => TcpLink::bind(port).with_context(|| format!("cannot listen on port {port}"))?,
        None => TcpLink::disconnected(),
    };

    let mut car = CarController::new(motors, console, bluetooth, Some(config));
    loop {
        // read before polling so that every byte sent before EOF is drained
        let stdin_closed = stdin_done.load(Ordering::Acquire);
        match car.poll() {
            Some(state) => match serde_json::to_string(&state) {
                Ok(json) => info!(target: "telemetry", "{}", json),
                Err(e) => error!("cannot encode motor state: {}", e),
            },
            // with no Bluetooth listener, end of stdin ends the session
            None if stdin_closed && bt_port.is_none() => break,
            None => thread::sleep(CAR_POLL_INTERVAL),
        }
    }
    info!("console closed, car stopped");
    Ok(())
}

fn run_dispenser(
    config: DispenserConfig,
    scenario: Scenario,
    auto_calibrate: bool,
) -> Result<()> {
    let (range, color) = scenario.sensors();
    let pumps = PumpBank::new([
        LogPin::new("PUMP1"),
        LogPin::new("PUMP2"),
        LogPin::new("PUMP3"),
    ])?;
    let mut console = StdinConsole::spawn(false);
    if auto_calibrate {
        console.preload(b"\n\n\n");
    }

    let mut dispenser = Dispenser::calibrate(
        range,
        color,
        pumps,
        Delay,
        SerialLink::new(console, Source::Console),
        Some(config),
    )
    .context("calibration aborted")?;

    for step in 0..scenario.cycles.len() {
        match dispenser.cycle() {
            CycleOutcome::Faulted(e) => error!(step, "cycle faulted: {}", e),
            outcome => info!(step, ?outcome, "cycle done"),
        }
    }
    info!("scenario finished");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let settings = Settings::load(opts.config.as_deref())?;

    match opts.sketch {
        Sketch::Car { bt_port } => run_car(settings.car, bt_port),
        Sketch::Dispenser {
            scenario,
            auto_calibrate,
        } => run_dispenser(settings.dispenser, Scenario::load(&scenario)?, auto_calibrate),
    }
}
