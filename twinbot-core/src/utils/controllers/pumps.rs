//! Relay bank switching the three drink pumps.
//!
//! The relay module closes its normally-open contact when its input is pulled
//! LOW, so lines are driven HIGH while idle. A pump only runs while a
//! `PumpGuard` is alive.

use embedded_hal::digital::OutputPin;

use super::DeviceError;
use crate::utils::math::color::Reference;

/// Line level that energizes the relay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// A single relay input that remembers its active level and last state.
pub struct Relay<PIN: OutputPin> {
    pin: PIN,
    active: ActiveLevel,
    energized: bool,
}

impl<PIN: OutputPin> Relay<PIN> {
    /// Wrap `pin` and release the relay.
    pub fn new(
        pin: PIN,
        active: ActiveLevel,
    ) -> Result<Self, DeviceError> {
        let mut relay = Self {
            pin,
            active,
            energized: true,
        };
        relay.set(false)?;
        Ok(relay)
    }

    pub fn active_low(pin: PIN) -> Result<Self, DeviceError> {
        Self::new(pin, ActiveLevel::Low)
    }

    pub fn set(
        &mut self,
        energized: bool,
    ) -> Result<(), DeviceError> {
        match (self.active, energized) {
            (ActiveLevel::High, true) | (ActiveLevel::Low, false) => self.pin.set_high(),
            (ActiveLevel::High, false) | (ActiveLevel::Low, true) => self.pin.set_low(),
        }
        .map_err(DeviceError::pin)?;
        self.energized = energized;
        Ok(())
    }

    #[inline]
    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

/// The three pump relays, indexed by `Reference::index`.
pub struct PumpBank<PIN: OutputPin> {
    relays: [Relay<PIN>; 3],
}

impl<PIN: OutputPin> PumpBank<PIN> {
    /// Take one pin per pump (pump 1 first) and switch them all off.
    pub fn new(pins: [PIN; 3]) -> Result<Self, DeviceError> {
        let [p1, p2, p3] = pins;
        Ok(Self {
            relays: [
                Relay::active_low(p1)?,
                Relay::active_low(p2)?,
                Relay::active_low(p3)?,
            ],
        })
    }

    /// Energize the pump for `reference` until the returned guard is closed
    /// or dropped.
    pub fn open(
        &mut self,
        reference: Reference,
    ) -> Result<PumpGuard<'_, PIN>, DeviceError> {
        let relay = &mut self.relays[reference.index()];
        relay.set(true)?;
        tracing::debug!(pump = reference.pump(), "pump relay closed");
        Ok(PumpGuard {
            relay,
            reference,
            closed: false,
        })
    }

    /// Whether any pump is currently running.
    pub fn any_running(&self) -> bool {
        self.relays.iter().any(Relay::is_energized)
    }

    pub fn is_running(
        &self,
        reference: Reference,
    ) -> bool {
        self.relays[reference.index()].is_energized()
    }

    pub fn free(self) -> [PIN; 3] {
        self.relays.map(Relay::free)
    }
}

/// Exclusive hold on one running pump; the relay opens again on drop.
pub struct PumpGuard<'a, PIN: OutputPin> {
    relay: &'a mut Relay<PIN>,
    reference: Reference,
    closed: bool,
}

impl<PIN: OutputPin> PumpGuard<'_, PIN> {
    pub fn reference(&self) -> Reference {
        self.reference
    }

    /// Stop the pump and report whether the relay line could be released.
    ///
    /// On failure the guard's drop makes one more release attempt.
    pub fn close(mut self) -> Result<(), DeviceError> {
        self.relay.set(false)?;
        self.closed = true;
        tracing::debug!(pump = self.reference.pump(), "pump relay opened");
        Ok(())
    }
}

impl<PIN: OutputPin> Drop for PumpGuard<'_, PIN> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.relay.set(false) {
            tracing::error!(pump = self.reference.pump(), "failed to release pump relay: {:?}", e);
        }
    }
}
