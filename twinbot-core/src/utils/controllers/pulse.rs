//! Software pulse timing on a digital input.
//!
//! Both sensors on the dispenser report through pulse widths: the ultrasonic
//! echo as a HIGH pulse, the color sensor output as a LOW pulse. The width is
//! found by sampling the pin every `step_us` microseconds.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, PinState},
};

use super::DeviceError;

/// Sampling parameters for `pulse_width_us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pub step_us: u32,
    /// Budget shared by all three phases of a measurement.
    pub timeout_us: u32,
}

impl PulseTiming {
    pub fn new(
        step_us: u32,
        timeout_us: u32,
    ) -> Self {
        Self {
            step_us: step_us.max(1),
            timeout_us,
        }
    }
}

fn at_level<P: InputPin>(
    pin: &mut P,
    level: PinState,
) -> Result<bool, DeviceError> {
    match level {
        PinState::High => pin.is_high(),
        PinState::Low => pin.is_low(),
    }
    .map_err(DeviceError::pin)
}

/// Measure the width (µs) of the next pulse at `level` on `pin`.
///
/// A pulse already in progress is skipped, then the function waits for the
/// pulse to start and counts until it ends. Returns `Ok(None)` when the budget
/// runs out in any phase.
pub fn pulse_width_us<P, D>(
    pin: &mut P,
    delay: &mut D,
    level: PinState,
    timing: PulseTiming,
) -> Result<Option<u32>, DeviceError>
where
    P: InputPin,
    D: DelayNs,
{
    let mut waited: u32 = 0;

    // let a pulse already in progress finish
    while at_level(pin, level)? {
        if waited >= timing.timeout_us {
            return Ok(None);
        }
        delay.delay_us(timing.step_us);
        waited = waited.saturating_add(timing.step_us);
    }

    while !at_level(pin, level)? {
        if waited >= timing.timeout_us {
            return Ok(None);
        }
        delay.delay_us(timing.step_us);
        waited = waited.saturating_add(timing.step_us);
    }

    let mut width: u32 = 0;
    while at_level(pin, level)? {
        if waited >= timing.timeout_us {
            return Ok(None);
        }
        delay.delay_us(timing.step_us);
        waited = waited.saturating_add(timing.step_us);
        width = width.saturating_add(timing.step_us);
    }

    Ok(Some(width))
}
