//! Color-triggered drink dispenser.
//!
//! After a one-time interactive calibration the dispenser polls forever:
//!
//! 1. range the space in front of the nozzle;
//! 2. if a glass is closer than the threshold, sample its color;
//! 3. pick the nearest calibrated reference;
//! 4. run that reference's pump for a fixed time.
//!
//! Every step blocks the loop, including the pump run. A cycle never carries
//! state into the next one.

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_io::{Read, Write};

use super::{pumps::PumpBank, ColorSensor, DeviceError, RangeSensor};
use crate::utils::{
    config::DispenserConfig,
    connection::serial::{say, SerialLink},
    math::color::{classify, CalibrationProfile, ColorSample, Reference},
};

/// Where the current cycle is.
///
/// Transitions are reported through `tracing` at trace level. `cycle` always
/// ends in `Idle`, so between cycles `Dispenser::phase` reads `Idle`; the
/// intermediate phases are only visible in the trace log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Detected,
    Classifying,
    Dispensing,
}

/// How a polling cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing in range, or the range sensor gave no usable reading.
    NoObject,
    /// A glass was present but the color sensor gave no usable reading.
    NoReading,
    /// No reference matched; nothing dispensed.
    Unknown,
    Dispensed(Reference),
    /// The pump relay could not be driven.
    Faulted(DeviceError),
}

/// Capture one sample per reference, prompting on `console` before each.
///
/// Blocks on the console until a byte arrives for every step. A step whose
/// sample times out is repeated.
pub fn calibrate<C, S>(
    console: &mut SerialLink<C>,
    sensor: &mut S,
) -> Result<CalibrationProfile, DeviceError>
where
    C: Read + Write,
    S: ColorSensor,
{
    say!(console, "Starting calibration...");

    let mut samples = [ColorSample::default(); 3];
    for reference in Reference::ALL {
        samples[reference.index()] = loop {
            say!(
                console,
                "Place {} object ({}) and press any key...",
                reference.key(),
                reference.drink()
            );
            console.wait_byte()?;

            match sensor.read_color() {
                Ok(Some(sample)) => break sample,
                Ok(None) => say!(console, "No color reading, try again."),
                Err(e) => {
                    tracing::warn!(?reference, "calibration sample failed: {}", e);
                    say!(console, "Color sensor error, try again.");
                }
            }
        };
        tracing::info!(?reference, sample = ?samples[reference.index()], "reference calibrated");
        say!(console, "{} calibrated.", reference);
    }

    let [black, white, orange] = samples;
    let profile = CalibrationProfile::new(black, white, orange);

    say!(console, "Calibration complete!");
    say!(console, "Calibration Values:");
    for (reference, sample) in profile.entries() {
        say!(console, "{}: {}", reference, sample);
    }
    Ok(profile)
}

pub struct Dispenser<R, S, P, D, C>
where
    P: OutputPin,
{
    range: R,
    color: S,
    pumps: PumpBank<P>,
    delay: D,
    console: SerialLink<C>,
    profile: CalibrationProfile,
    config: DispenserConfig,
    phase: Phase,
}

impl<R, S, P, D, C> Dispenser<R, S, P, D, C>
where
    R: RangeSensor,
    S: ColorSensor,
    P: OutputPin,
    D: DelayNs,
    C: Read + Write,
{
    /// Build a dispenser around an existing calibration.
    pub fn new(
        profile: CalibrationProfile,
        range: R,
        color: S,
        pumps: PumpBank<P>,
        delay: D,
        console: SerialLink<C>,
        config: Option<DispenserConfig>,
    ) -> Self {
        let config = config.unwrap_or_default();
        tracing::info!(
            baud = config.baud_rate,
            threshold_cm = config.distance_threshold_cm,
            "dispenser ready"
        );
        Dispenser {
            range,
            color,
            pumps,
            delay,
            console,
            profile,
            config,
            phase: Phase::Idle,
        }
    }

    /// Run the interactive calibration, then build the dispenser.
    pub fn calibrate(
        range: R,
        mut color: S,
        pumps: PumpBank<P>,
        delay: D,
        mut console: SerialLink<C>,
        config: Option<DispenserConfig>,
    ) -> Result<Self, DeviceError> {
        let profile = calibrate(&mut console, &mut color)?;
        Ok(Self::new(profile, range, color, pumps, delay, console, config))
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn config(&self) -> &DispenserConfig {
        &self.config
    }

    /// `Idle` whenever no cycle is running.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pumps(&self) -> &PumpBank<P> {
        &self.pumps
    }

    /// One full polling cycle, including the trailing pause.
    pub fn cycle(&mut self) -> CycleOutcome {
        let outcome = self.detect_and_dispense();
        self.enter(Phase::Idle);
        tracing::debug!(?outcome, "cycle finished");
        self.delay.delay_ms(self.config.cycle_pause_ms);
        outcome
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.cycle();
        }
    }

    /// Run the pump for `reference` for the configured time.
    ///
    /// The relay is released on every exit path, including unwinding out of
    /// the delay.
    pub fn dispense(
        &mut self,
        reference: Reference,
    ) -> Result<(), DeviceError> {
        let guard = self.pumps.open(reference)?;
        tracing::info!(pump = reference.pump(), ms = self.config.dispense_ms, "dispensing");
        self.delay.delay_ms(self.config.dispense_ms);
        guard.close()
    }

    fn enter(
        &mut self,
        phase: Phase,
    ) {
        if self.phase != phase {
            tracing::trace!(from = ?self.phase, to = ?phase, "dispenser phase");
            self.phase = phase;
        }
    }

    fn glass_present(&mut self) -> bool {
        let distance = match self.range.distance_cm() {
            Ok(Some(cm)) => {
                say!(self.console, "Distance: {} cm", cm);
                Some(cm)
            }
            Ok(None) => {
                say!(self.console, "Distance: no echo");
                None
            }
            Err(e) => {
                tracing::warn!("range sensor fault: {}", e);
                say!(self.console, "Distance: sensor fault");
                None
            }
        };
        distance.is_some_and(|cm| cm < self.config.distance_threshold_cm)
    }

    fn detect_and_dispense(&mut self) -> CycleOutcome {
        self.enter(Phase::Idle);
        if !self.glass_present() {
            say!(self.console, "No Glass Detected");
            return CycleOutcome::NoObject;
        }
        self.enter(Phase::Detected);
        say!(self.console, "Glass Detected");

        self.enter(Phase::Classifying);
        let sample = match self.color.read_color() {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                say!(self.console, "No color reading");
                return CycleOutcome::NoReading;
            }
            Err(e) => {
                tracing::warn!("color sensor fault: {}", e);
                say!(self.console, "No color reading");
                return CycleOutcome::NoReading;
            }
        };
        say!(
            self.console,
            "Raw Data - Red: {}, Green: {}, Blue: {}",
            sample.red,
            sample.green,
            sample.blue
        );

        let Some(reference) = classify(&sample, &self.profile) else {
            tracing::warn!(?sample, "no reference matched");
            say!(self.console, "Unknown color");
            return CycleOutcome::Unknown;
        };
        say!(self.console, "Detected: {}", reference);

        self.enter(Phase::Dispensing);
        match self.dispense(reference) {
            Ok(()) => CycleOutcome::Dispensed(reference),
            Err(e) => {
                tracing::error!(pump = reference.pump(), "dispense failed: {}", e);
                CycleOutcome::Faulted(e)
            }
        }
    }

    pub fn release(self) -> (R, S, PumpBank<P>, D, SerialLink<C>) {
        (self.range, self.color, self.pumps, self.delay, self.console)
    }
}
