//! Command dispatcher for the serial/Bluetooth car.
//!
//! Each polling pass checks the console first and the Bluetooth link second.
//! A waiting byte on either link is applied immediately, so when both links
//! deliver a command in the same pass the Bluetooth one is left standing.
//! Every status line is written to both links.

use core::fmt;

use embedded_hal::digital::OutputPin;
use embedded_io::{Read, ReadReady, Write};

use super::{
    motors::{DriveCommand, MotorDriver, MotorState},
    DeviceError,
};
use crate::utils::{
    config::CarConfig,
    connection::serial::{say, SerialLink, Source},
};

pub struct CarController<IN1, IN2, IN3, IN4, C, B> {
    motors: MotorDriver<IN1, IN2, IN3, IN4>,
    console: SerialLink<C>,
    bluetooth: SerialLink<B>,
    config: CarConfig,
}

impl<IN1, IN2, IN3, IN4, C, B> CarController<IN1, IN2, IN3, IN4, C, B>
where
    IN1: OutputPin,
    IN2: OutputPin,
    IN3: OutputPin,
    IN4: OutputPin,
    C: Read + ReadReady + Write,
    B: Read + ReadReady + Write,
{
    /// Wire up the controller and print the startup banner.
    ///
    /// The motor driver has already forced every line low.
    pub fn new(
        motors: MotorDriver<IN1, IN2, IN3, IN4>,
        console: C,
        bluetooth: B,
        config: Option<CarConfig>,
    ) -> Self {
        let config = config.unwrap_or_default();
        let mut car = CarController {
            motors,
            console: SerialLink::new(console, Source::Console),
            bluetooth: SerialLink::new(bluetooth, Source::Bluetooth),
            config,
        };

        tracing::info!(baud = config.baud_rate, "car controller ready");
        car.broadcast(format_args!("Bluetooth and Serial Robot Control Initialized."));
        car.broadcast(format_args!("Send commands via Serial Monitor or Bluetooth terminal."));
        car.broadcast(format_args!(
            "Commands: F (Forward), B (Backward), L (Left), R (Right), S (Stop)."
        ));
        car
    }

    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    pub fn motor_state(&self) -> MotorState {
        self.motors.state()
    }

    /// Apply one command character and report the resulting line state.
    ///
    /// Unknown characters stop the car after an "Invalid command" notice.
    pub fn dispatch(
        &mut self,
        command: char,
    ) -> Result<MotorState, DeviceError> {
        let cmd = DriveCommand::from(command);
        if let DriveCommand::Invalid(c) = cmd {
            tracing::warn!(?c, "invalid drive command");
            self.broadcast(format_args!("Invalid command. Stopping motors."));
        }

        let state = cmd.motor_state();
        self.motors.apply(state)?;
        tracing::info!(?cmd, ?state, "drive command applied");

        self.broadcast(format_args!("{}", cmd.describe()));
        for line in state.report() {
            self.broadcast(format_args!("{}", line));
        }
        Ok(state)
    }

    /// One pass over both links, console first.
    ///
    /// Returns the state left by the last command applied in this pass.
    pub fn poll(&mut self) -> Option<MotorState> {
        let mut last = None;
        for source in [Source::Console, Source::Bluetooth] {
            match self.poll_source(source) {
                Ok(Some(state)) => last = Some(state),
                Ok(None) => {}
                Err(e) => tracing::error!(?source, "command handling failed: {}", e),
            }
        }
        last
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    fn poll_source(
        &mut self,
        source: Source,
    ) -> Result<Option<MotorState>, DeviceError> {
        let byte = match source {
            Source::Console => self.console.poll_byte()?,
            Source::Bluetooth => self.bluetooth.poll_byte()?,
        };
        let Some(byte) = byte else {
            return Ok(None);
        };

        self.acknowledge(source, byte);
        self.dispatch(char::from(byte)).map(Some)
    }

    /// Echo the received byte as-is, so bytes above 0x7F are not re-encoded.
    fn acknowledge(
        &mut self,
        source: Source,
        byte: u8,
    ) {
        let label = source.label();
        if let Err(e) = self.console.println_raw(format_args!("Received from {}: ", label), &[byte]) {
            tracing::warn!(source = ?Source::Console, "status line dropped: {}", e);
        }
        if let Err(e) = self.bluetooth.println_raw(format_args!("Received from {}: ", label), &[byte]) {
            tracing::warn!(source = ?Source::Bluetooth, "status line dropped: {}", e);
        }
    }

    fn broadcast(
        &mut self,
        args: fmt::Arguments<'_>,
    ) {
        say!(self.console, "{}", args);
        say!(self.bluetooth, "{}", args);
    }

    pub fn release(self) -> (MotorDriver<IN1, IN2, IN3, IN4>, C, B) {
        (self.motors, self.console.release(), self.bluetooth.release())
    }
}
