//! Tunables for both sketches.
//!
//! Defaults reproduce the values wired into the boards. Every field is
//! optional when deserializing, so a partial JSON object only overrides what it
//! names.

use serde::{Deserialize, Serialize};

use crate::utils::controllers::pulse::PulseTiming;

/// Settings for the serial-controlled car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    /// Console and Bluetooth links run at the same rate.
    pub baud_rate: u32,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self { baud_rate: 9600 }
    }
}

/// Settings for the color-sensing drink dispenser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenserConfig {
    pub baud_rate: u32,
    /// An object closer than this (cm) counts as a glass.
    pub distance_threshold_cm: u32,
    /// How long a pump relay stays closed.
    pub dispense_ms: u32,
    /// Pause at the end of every polling cycle.
    pub cycle_pause_ms: u32,
    pub echo_timeout_us: u32,
    pub color_timeout_us: u32,
    /// Sampling period used while timing a pulse.
    pub pulse_step_us: u32,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            distance_threshold_cm: 10,
            dispense_ms: 3000,
            cycle_pause_ms: 100,
            echo_timeout_us: 1_000_000,
            color_timeout_us: 1_000_000,
            pulse_step_us: 1,
        }
    }
}

impl DispenserConfig {
    /// Sampling budget for the ultrasonic echo.
    pub fn echo_timing(&self) -> PulseTiming {
        PulseTiming::new(self.pulse_step_us, self.echo_timeout_us)
    }

    /// Sampling budget for one color channel.
    pub fn color_timing(&self) -> PulseTiming {
        PulseTiming::new(self.pulse_step_us, self.color_timeout_us)
    }
}
