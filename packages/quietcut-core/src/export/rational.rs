//! Reduced rational seconds for the structural editor XML.
//!
//! Frame-exact times are emitted as `NUM/DENs` fractions, never as floating
//! point. All values derive from integer frame counts on the export grid, so
//! numerators stay integral by construction.

use std::fmt;

use crate::timeline::Fps;

/// A non-negative rational number of seconds, reduced to lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    /// Creates a reduced rational. `den` must be positive.
    #[must_use]
    pub fn new(num: i64, den: i64) -> Self {
        debug_assert!(den > 0, "rational denominator must be positive");
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i64;
        Self {
            num: num / g,
            den: den / g,
        }
    }

    /// Zero seconds.
    pub const ZERO: Rational = Rational { num: 0, den: 1 };

    /// Converts a frame count on the given grid into seconds:
    /// `frames * den / num` for an `num/den` frame rate.
    #[must_use]
    pub fn from_frames(frames: i64, fps: Fps) -> Self {
        Self::new(frames * fps.denominator() as i64, fps.numerator() as i64)
    }

    /// Numerator after reduction.
    #[must_use]
    pub fn numerator(&self) -> i64 {
        self.num
    }

    /// Denominator after reduction (always positive).
    #[must_use]
    pub fn denominator(&self) -> i64 {
        self.den
    }

    /// Value as a float, for comparisons only (never emitted).
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rational {
    /// Formats as the structural XML expects: `"0s"`, `"5s"`, `"62/15s"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num == 0 {
            write!(f, "0s")
        } else if self.den == 1 {
            write!(f, "{}s", self.num)
        } else {
            write!(f, "{}/{}s", self.num, self.den)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Frame duration of the grid as a rational string (`"1001/30000s"`, `"1/30s"`).
#[must_use]
pub fn frame_duration_string(fps: Fps) -> String {
    let (num, den) = fps.frame_duration();
    format!("{num}/{den}s")
}

/// Parses a rational-seconds attribute back into seconds.
///
/// Accepts the same three shapes [`Rational`] emits. Used by the agreement
/// checker when reading exported documents.
#[must_use]
pub fn parse_rational_seconds(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().strip_suffix('s')?;
    if let Some((num, den)) = trimmed.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        trimmed.trim().parse().ok()
    }
}
