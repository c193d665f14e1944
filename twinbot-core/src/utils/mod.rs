//! Utility re-exports for the twinbot sketches.
//!
//! - `connection`: serial links carrying commands and status text
//! - `controllers`: motor, relay and sensor drivers plus the car and
//!   dispenser control loops
//! - `math`: color distance and nearest-reference classification
//! - `config`: tunables for both sketches

pub mod config;
pub mod connection;
pub mod controllers;
pub mod math;

pub use config::{CarConfig, DispenserConfig};
pub use controllers::{CarController, Dispenser};
pub use math::color::{classify, is_closest_color, CalibrationProfile, ColorSample, Reference};
