//! Math utilities for the twinbot sketches.
//!
//! This module provides the color distance and nearest-reference selection
//! used by the dispenser.

pub mod color;
