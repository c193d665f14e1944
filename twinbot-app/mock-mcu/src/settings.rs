//! Optional JSON overrides for both sketches.
//!
//! ```json
//! { "car": { "baud_rate": 9600 }, "dispenser": { "dispense_ms": 1500 } }
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use twinbot_core::utils::config::{CarConfig, DispenserConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub car: CarConfig,
    pub dispenser: DispenserConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}
