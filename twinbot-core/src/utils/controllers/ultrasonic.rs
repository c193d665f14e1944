//! Trigger/echo ultrasonic range finder (HC-SR04 style).

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin, PinState},
};

use super::{
    pulse::{pulse_width_us, PulseTiming},
    DeviceError, RangeSensor,
};

/// Round-trip echo time (µs) to distance (cm), truncated.
///
/// Sound covers roughly 1 cm every 29.1 µs; the echo travels there and back.
pub fn echo_to_cm(echo_us: u32) -> u32 {
    (u64::from(echo_us / 2) * 10 / 291) as u32
}

pub struct Hcsr04<TRIG, ECHO, D> {
    trig: TRIG,
    echo: ECHO,
    delay: D,
    timing: PulseTiming,
}

impl<TRIG, ECHO, D> Hcsr04<TRIG, ECHO, D>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
{
    pub fn new(
        trig: TRIG,
        echo: ECHO,
        delay: D,
        timing: PulseTiming,
    ) -> Self {
        Self {
            trig,
            echo,
            delay,
            timing,
        }
    }

    /// Fire one 10 µs trigger pulse and time the echo.
    pub fn echo_us(&mut self) -> Result<Option<u32>, DeviceError> {
        self.trig.set_low().map_err(DeviceError::pin)?;
        self.delay.delay_us(2);
        self.trig.set_high().map_err(DeviceError::pin)?;
        self.delay.delay_us(10);
        self.trig.set_low().map_err(DeviceError::pin)?;

        pulse_width_us(&mut self.echo, &mut self.delay, PinState::High, self.timing)
    }

    pub fn release(self) -> (TRIG, ECHO, D) {
        (self.trig, self.echo, self.delay)
    }
}

impl<TRIG, ECHO, D> RangeSensor for Hcsr04<TRIG, ECHO, D>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
{
    fn distance_cm(&mut self) -> Result<Option<u32>, DeviceError> {
        // a zero-width echo is as good as no echo
        Ok(self.echo_us()?.filter(|&us| us > 0).map(echo_to_cm))
    }
}
