//! Core logic for two small robot sketches on no-std embedded platforms: a
//! serial/Bluetooth-driven two-motor car and a color-sensing drink dispenser.
//!
//! For a host-side runner, see the `mock-mcu` crate in `twinbot-app/`.
#![no_std]

pub mod utils;
