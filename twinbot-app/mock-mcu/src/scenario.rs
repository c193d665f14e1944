//! Scripted sensor readings for running the dispenser on the host.
//!
//! ```json
//! {
//!   "calibration": [
//!     { "red": 5, "green": 90, "blue": 90 },
//!     { "red": 90, "green": 5, "blue": 5 },
//!     { "red": 40, "green": 40, "blue": 10 }
//!   ],
//!   "cycles": [
//!     { "distance_cm": 15 },
//!     { "distance_cm": 5, "color": { "red": 10, "green": 80, "blue": 80 } },
//!     { "distance_cm": null }
//!   ]
//! }
//! ```

use std::{cell::RefCell, collections::VecDeque, fs, path::Path, rc::Rc};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use twinbot_core::utils::{
    controllers::{ColorSensor, DeviceError, RangeSensor},
    math::color::ColorSample,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Black, white and orange samples, in that order.
    pub calibration: Vec<ColorSample>,
    pub cycles: Vec<Cycle>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Cycle {
    /// `null` or missing simulates an echo that never returns.
    #[serde(default)]
    pub distance_cm: Option<u32>,
    /// Missing simulates a color channel that times out.
    #[serde(default)]
    pub color: Option<ColorSample>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(text).context("invalid scenario")?;
        ensure!(
            scenario.calibration.len() == 3,
            "scenario needs exactly 3 calibration samples, got {}",
            scenario.calibration.len()
        );
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Split the script into a range sensor and a color sensor that replay it.
    pub fn sensors(&self) -> (SimRange, SimColor) {
        let state = Rc::new(RefCell::new(Playback {
            calibration: self.calibration.iter().copied().collect(),
            cycles: self.cycles.iter().copied().collect(),
            current: None,
        }));
        (SimRange(state.clone()), SimColor(state))
    }
}

struct Playback {
    calibration: VecDeque<ColorSample>,
    cycles: VecDeque<Cycle>,
    current: Option<Cycle>,
}

/// Replays `Cycle::distance_cm`; each read starts the next cycle.
pub struct SimRange(Rc<RefCell<Playback>>);

/// Replays calibration samples first, then the color of the current cycle.
pub struct SimColor(Rc<RefCell<Playback>>);

impl RangeSensor for SimRange {
    fn distance_cm(&mut self) -> Result<Option<u32>, DeviceError> {
        let mut playback = self.0.borrow_mut();
        playback.current = playback.cycles.pop_front();
        Ok(playback.current.and_then(|c| c.distance_cm))
    }
}

impl ColorSensor for SimColor {
    fn read_color(&mut self) -> Result<Option<ColorSample>, DeviceError> {
        let mut playback = self.0.borrow_mut();
        if let Some(sample) = playback.calibration.pop_front() {
            return Ok(Some(sample));
        }
        Ok(playback.current.and_then(|c| c.color))
    }
}
