//! Two-motor H-bridge control for the car.
//!
//! Each motor is driven by a pair of input lines (IN1/IN2 and IN3/IN4). A
//! single-character command selects one of five fixed line patterns.

use core::fmt;

use embedded_hal::digital::OutputPin;
use serde::{Deserialize, Serialize};

use super::DeviceError;

/// ON/OFF state of the four bridge inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub in1: bool,
    pub in2: bool,
    pub in3: bool,
    pub in4: bool,
}

impl MotorState {
    pub const STOP: MotorState = MotorState::new(false, false, false, false);
    pub const FORWARD: MotorState = MotorState::new(true, false, true, false);
    pub const BACKWARD: MotorState = MotorState::new(false, true, false, true);
    pub const LEFT: MotorState = MotorState::new(false, true, true, false);
    pub const RIGHT: MotorState = MotorState::new(true, false, false, true);

    pub const fn new(
        in1: bool,
        in2: bool,
        in3: bool,
        in4: bool,
    ) -> Self {
        Self { in1, in2, in3, in4 }
    }

    pub fn is_stopped(&self) -> bool {
        *self == Self::STOP
    }

    /// Status report lines, motor 1 first.
    pub fn report(&self) -> [MotorReport; 2] {
        [
            MotorReport {
                motor: 1,
                lines: ("IN1", "IN2"),
                state: (self.in1, self.in2),
            },
            MotorReport {
                motor: 2,
                lines: ("IN3", "IN4"),
                state: (self.in3, self.in4),
            },
        ]
    }
}

/// `Motor 1 (IN1, IN2): ON / OFF`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorReport {
    motor: u8,
    lines: (&'static str, &'static str),
    state: (bool, bool),
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for MotorReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "Motor {} ({}, {}): {} / {}",
            self.motor,
            self.lines.0,
            self.lines.1,
            on_off(self.state.0),
            on_off(self.state.1)
        )
    }
}

/// Car command set. Anything unrecognized stops the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Invalid(char),
}

impl From<char> for DriveCommand {
    fn from(c: char) -> Self {
        match c {
            'F' => DriveCommand::Forward,
            'B' => DriveCommand::Backward,
            'L' => DriveCommand::Left,
            'R' => DriveCommand::Right,
            'S' => DriveCommand::Stop,
            other => DriveCommand::Invalid(other),
        }
    }
}

impl DriveCommand {
    pub fn motor_state(self) -> MotorState {
        match self {
            DriveCommand::Forward => MotorState::FORWARD,
            DriveCommand::Backward => MotorState::BACKWARD,
            DriveCommand::Left => MotorState::LEFT,
            DriveCommand::Right => MotorState::RIGHT,
            DriveCommand::Stop | DriveCommand::Invalid(_) => MotorState::STOP,
        }
    }

    /// Status line announcing the movement.
    pub fn describe(self) -> &'static str {
        match self {
            DriveCommand::Forward => "Moving forward.",
            DriveCommand::Backward => "Moving backward.",
            DriveCommand::Left => "Turning left.",
            DriveCommand::Right => "Turning right.",
            DriveCommand::Stop | DriveCommand::Invalid(_) => "Motors stopped.",
        }
    }
}

/// Owns the four bridge inputs and remembers what was last written.
pub struct MotorDriver<IN1, IN2, IN3, IN4> {
    in1: IN1,
    in2: IN2,
    in3: IN3,
    in4: IN4,
    state: MotorState,
}

/// Drive one line and record the level only once the write went through.
fn drive<P: OutputPin>(
    pin: &mut P,
    cached: &mut bool,
    on: bool,
) -> Result<(), DeviceError> {
    if on {
        pin.set_high()
    } else {
        pin.set_low()
    }
    .map_err(DeviceError::pin)?;
    *cached = on;
    Ok(())
}

impl<IN1, IN2, IN3, IN4> MotorDriver<IN1, IN2, IN3, IN4>
where
    IN1: OutputPin,
    IN2: OutputPin,
    IN3: OutputPin,
    IN4: OutputPin,
{
    /// Take the pins and drive every line low.
    pub fn new(
        in1: IN1,
        in2: IN2,
        in3: IN3,
        in4: IN4,
    ) -> Result<Self, DeviceError> {
        let mut driver = Self {
            in1,
            in2,
            in3,
            in4,
            state: MotorState::STOP,
        };
        driver.apply(MotorState::STOP)?;
        Ok(driver)
    }

    /// Write all four lines, IN1 first.
    ///
    /// If any write fails, every line is driven low as a best-effort stop and
    /// the first error is returned. `state` always reflects the levels that
    /// were actually written.
    pub fn apply(
        &mut self,
        state: MotorState,
    ) -> Result<(), DeviceError> {
        let Err(e) = self.write_lines(state) else {
            return Ok(());
        };
        tracing::error!(?state, "motor line write failed, stopping: {}", e);
        if let Err(stop) = self.write_lines(MotorState::STOP) {
            tracing::error!(left = ?self.state, "emergency stop incomplete: {}", stop);
        }
        Err(e)
    }

    /// Attempt every line, returning the first error.
    fn write_lines(
        &mut self,
        target: MotorState,
    ) -> Result<(), DeviceError> {
        let r1 = drive(&mut self.in1, &mut self.state.in1, target.in1);
        let r2 = drive(&mut self.in2, &mut self.state.in2, target.in2);
        let r3 = drive(&mut self.in3, &mut self.state.in3, target.in3);
        let r4 = drive(&mut self.in4, &mut self.state.in4, target.in4);
        r1.and(r2).and(r3).and(r4)
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.apply(MotorState::STOP)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn release(self) -> (IN1, IN2, IN3, IN4) {
        (self.in1, self.in2, self.in3, self.in4)
    }
}
