//! Nearest-color classification for the drink dispenser.
//!
//! A `ColorSample` holds three pulse widths (µs) read from the color sensor,
//! one per filter channel. Widths shrink as light on the channel grows, and the
//! calibration profile is captured under the same inversion, so samples are
//! compared as-is.
//!
//! # Example
//! ```rust
//! use twinbot_core::utils::math::color::{classify, CalibrationProfile, ColorSample, Reference};
//! let profile = CalibrationProfile::new(
//!     ColorSample::new(5, 90, 90),
//!     ColorSample::new(90, 5, 5),
//!     ColorSample::new(40, 40, 10),
//! );
//! assert_eq!(classify(&ColorSample::new(10, 80, 80), &profile), Some(Reference::Black));
//! ```
use core::fmt;

use serde::{Deserialize, Serialize};

/// Raw pulse widths for the red, green and blue filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorSample {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl ColorSample {
    pub const fn new(
        red: u32,
        green: u32,
        blue: u32,
    ) -> Self {
        Self { red, green, blue }
    }

    /// Sum of absolute per-channel differences, widened so it cannot overflow.
    pub fn manhattan(
        &self,
        other: &ColorSample,
    ) -> u64 {
        u64::from(self.red.abs_diff(other.red))
            + u64::from(self.green.abs_diff(other.green))
            + u64::from(self.blue.abs_diff(other.blue))
    }
}

impl fmt::Display for ColorSample {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "R={}, G={}, B={}", self.red, self.green, self.blue)
    }
}

/// The reference colors the dispenser knows, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    /// Coca-Cola, pump 1.
    Black,
    /// Sprite, pump 2.
    White,
    /// Mirinda, pump 3.
    Orange,
}

impl Reference {
    /// Declared order; ties resolve to the earlier entry.
    pub const ALL: [Reference; 3] = [Reference::Black, Reference::White, Reference::Orange];

    pub const fn index(self) -> usize {
        match self {
            Reference::Black => 0,
            Reference::White => 1,
            Reference::Orange => 2,
        }
    }

    /// 1-based pump number wired to this drink.
    pub const fn pump(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Lowercase name used in operator prompts.
    pub const fn key(self) -> &'static str {
        match self {
            Reference::Black => "black",
            Reference::White => "white",
            Reference::Orange => "orange",
        }
    }

    pub const fn color_name(self) -> &'static str {
        match self {
            Reference::Black => "Black",
            Reference::White => "White",
            Reference::Orange => "Orange",
        }
    }

    pub const fn drink(self) -> &'static str {
        match self {
            Reference::Black => "Coca-Cola",
            Reference::White => "Sprite",
            Reference::Orange => "Mirinda",
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} ({})", self.color_name(), self.drink())
    }
}

/// One calibrated sample per `Reference`, fixed after calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    black: ColorSample,
    white: ColorSample,
    orange: ColorSample,
}

impl CalibrationProfile {
    pub const fn new(
        black: ColorSample,
        white: ColorSample,
        orange: ColorSample,
    ) -> Self {
        Self {
            black,
            white,
            orange,
        }
    }

    pub fn get(
        &self,
        reference: Reference,
    ) -> &ColorSample {
        match reference {
            Reference::Black => &self.black,
            Reference::White => &self.white,
            Reference::Orange => &self.orange,
        }
    }

    /// Entries in declared order.
    pub fn entries(&self) -> impl Iterator<Item = (Reference, &ColorSample)> + '_ {
        Reference::ALL.into_iter().map(move |r| (r, self.get(r)))
    }

    /// Distance from `sample` to every entry, indexed by `Reference::index`.
    pub fn distances(
        &self,
        sample: &ColorSample,
    ) -> [u64; 3] {
        let mut out = [0; 3];
        for (reference, entry) in self.entries() {
            out[reference.index()] = sample.manhattan(entry);
        }
        out
    }
}

/// Pick the reference nearest to `sample`.
///
/// Equal distances go to the first reference in `Reference::ALL`. `None` is
/// only possible for an empty profile, which this type cannot hold; callers
/// still handle it as "unknown color".
pub fn classify(
    sample: &ColorSample,
    profile: &CalibrationProfile,
) -> Option<Reference> {
    profile
        .entries()
        .map(|(reference, entry)| (reference, sample.manhattan(entry)))
        .min_by_key(|&(_, distance)| distance)
        .map(|(reference, _)| reference)
}

/// Whether `target` is the reference `classify` selects for `sample`.
pub fn is_closest_color(
    sample: &ColorSample,
    profile: &CalibrationProfile,
    target: Reference,
) -> bool {
    classify(sample, profile) == Some(target)
}
