//! Light-to-frequency color sensor (TCS3200 style).
//!
//! S0/S1 select the output frequency scaling, S2/S3 the photodiode filter.
//! A reading is the width of one LOW half-period on OUT, so a brighter channel
//! gives a *smaller* number.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin, PinState},
};

use super::{
    pulse::{pulse_width_us, PulseTiming},
    ColorSensor, DeviceError,
};
use crate::utils::math::color::ColorSample;

/// Photodiode filter selected through S2/S3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Red,
    Green,
    Blue,
}

impl Filter {
    /// Sampling order of a full `ColorSample`.
    pub const ORDER: [Filter; 3] = [Filter::Red, Filter::Green, Filter::Blue];

    /// `(S2, S3)` levels for this filter.
    pub const fn select_lines(self) -> (PinState, PinState) {
        match self {
            Filter::Red => (PinState::Low, PinState::Low),
            Filter::Green => (PinState::High, PinState::High),
            Filter::Blue => (PinState::Low, PinState::High),
        }
    }
}

pub struct Tcs3200<S0, S1, S2, S3, OUT, D> {
    s0: S0,
    s1: S1,
    s2: S2,
    s3: S3,
    out: OUT,
    delay: D,
    timing: PulseTiming,
}

impl<S0, S1, S2, S3, OUT, D> Tcs3200<S0, S1, S2, S3, OUT, D>
where
    S0: OutputPin,
    S1: OutputPin,
    S2: OutputPin,
    S3: OutputPin,
    OUT: InputPin,
    D: DelayNs,
{
    /// Take the pins and set 20% frequency scaling (S0 HIGH, S1 LOW).
    pub fn new(
        mut s0: S0,
        mut s1: S1,
        s2: S2,
        s3: S3,
        out: OUT,
        delay: D,
        timing: PulseTiming,
    ) -> Result<Self, DeviceError> {
        s0.set_high().map_err(DeviceError::pin)?;
        s1.set_low().map_err(DeviceError::pin)?;
        Ok(Self {
            s0,
            s1,
            s2,
            s3,
            out,
            delay,
            timing,
        })
    }

    /// Select `filter` and time one LOW pulse on OUT.
    pub fn read_channel(
        &mut self,
        filter: Filter,
    ) -> Result<Option<u32>, DeviceError> {
        let (s2, s3) = filter.select_lines();
        self.s2.set_state(s2).map_err(DeviceError::pin)?;
        self.s3.set_state(s3).map_err(DeviceError::pin)?;
        pulse_width_us(&mut self.out, &mut self.delay, PinState::Low, self.timing)
    }

    pub fn release(self) -> (S0, S1, S2, S3, OUT, D) {
        (self.s0, self.s1, self.s2, self.s3, self.out, self.delay)
    }
}

impl<S0, S1, S2, S3, OUT, D> ColorSensor for Tcs3200<S0, S1, S2, S3, OUT, D>
where
    S0: OutputPin,
    S1: OutputPin,
    S2: OutputPin,
    S3: OutputPin,
    OUT: InputPin,
    D: DelayNs,
{
    fn read_color(&mut self) -> Result<Option<ColorSample>, DeviceError> {
        let mut widths = [0u32; 3];
        for (slot, filter) in widths.iter_mut().zip(Filter::ORDER) {
            match self.read_channel(filter)? {
                Some(w) => *slot = w,
                None => {
                    tracing::warn!(?filter, "color channel timed out");
                    return Ok(None);
                }
            }
        }
        let [red, green, blue] = widths;
        Ok(Some(ColorSample::new(red, green, blue)))
    }
}
