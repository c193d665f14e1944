//! Module Exports
//!
//! Hardware-facing controllers for both sketches.
//!
//! - `motors`: the four H-bridge input lines of the car.
//! - `pumps`: active-low relay bank driving the dispenser pumps.
//! - `pulse`: software pulse-width timing shared by the sensors.
//! - `ultrasonic`: trigger/echo distance sensor.
//! - `color_sensor`: filter-selectable light-to-frequency color sensor.
//! - `car`: the command dispatcher loop.
//! - `dispenser`: calibration, classification and dispensing loop.

pub mod car;
pub mod color_sensor;
pub mod dispenser;
pub mod motors;
pub mod pulse;
pub mod pumps;
pub mod ultrasonic;

use core::fmt;

use embedded_hal::digital;

use crate::utils::math::color::ColorSample;

pub use car::CarController;
pub use color_sensor::Tcs3200;
pub use dispenser::{calibrate, CycleOutcome, Dispenser, Phase};
pub use motors::{DriveCommand, MotorDriver, MotorState};
pub use pumps::{PumpBank, PumpGuard};
pub use ultrasonic::Hcsr04;

/// Errors raised by pins and serial links.
///
/// Only the portable error kind is kept so that drivers built from pins of
/// different types share one error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    Pin(digital::ErrorKind),
    Serial(embedded_io::ErrorKind),
    /// A blocking read returned no data.
    LinkClosed,
}

impl DeviceError {
    pub fn pin<E: digital::Error>(e: E) -> Self {
        DeviceError::Pin(e.kind())
    }

    pub fn serial<E: embedded_io::Error>(e: E) -> Self {
        DeviceError::Serial(e.kind())
    }
}

impl fmt::Display for DeviceError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DeviceError::Pin(kind) => write!(f, "pin error: {:?}", kind),
            DeviceError::Serial(kind) => write!(f, "serial error: {:?}", kind),
            DeviceError::LinkClosed => f.write_str("serial link closed"),
        }
    }
}

impl core::error::Error for DeviceError {}

/// A presence sensor reporting distance in whole centimetres.
pub trait RangeSensor {
    /// `Ok(None)` when no echo came back.
    fn distance_cm(&mut self) -> Result<Option<u32>, DeviceError>;
}

/// A sensor producing one `ColorSample` per call.
pub trait ColorSensor {
    /// `Ok(None)` when any channel failed to produce a pulse.
    fn read_color(&mut self) -> Result<Option<ColorSample>, DeviceError>;
}

impl<T: RangeSensor + ?Sized> RangeSensor for &mut T {
    fn distance_cm(&mut self) -> Result<Option<u32>, DeviceError> {
        (**self).distance_cm()
    }
}

impl<T: ColorSensor + ?Sized> ColorSensor for &mut T {
    fn read_color(&mut self) -> Result<Option<ColorSample>, DeviceError> {
        (**self).read_color()
    }
}
