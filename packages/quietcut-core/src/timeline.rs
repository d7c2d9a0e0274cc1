//! Core timeline data model.
//!
//! Everything downstream of the analyzer speaks in these terms: half-open
//! [`TimeInterval`]s over source-media seconds, the [`Fps`] frame grid applied
//! at export time, and [`Cut`]s (keep-segments carrying their integer frame
//! indices).
//!
//! # Invariants
//!
//! - Any interval list handed between stages is sorted ascending by start and
//!   non-overlapping.
//! - No interval has duration <= 0.
//! - A cut always satisfies `out_frame > in_frame`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error constructing a [`TimeInterval`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntervalError {
    /// The end did not lie strictly after the start.
    #[error("interval end {end_s} must be greater than start {start_s}")]
    EmptyOrInverted { start_s: f64, end_s: f64 },

    /// The start was negative.
    #[error("interval start {0} must be non-negative")]
    NegativeStart(f64),
}

/// A half-open interval `[start_s, end_s)` over source-media time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Inclusive start, seconds from the beginning of the source.
    pub start_s: f64,
    /// Exclusive end, seconds from the beginning of the source.
    pub end_s: f64,
}

impl TimeInterval {
    /// Creates an interval, enforcing `0 <= start_s < end_s`.
    pub fn new(start_s: f64, end_s: f64) -> Result<Self, IntervalError> {
        if start_s < 0.0 {
            return Err(IntervalError::NegativeStart(start_s));
        }
        if end_s <= start_s {
            return Err(IntervalError::EmptyOrInverted { start_s, end_s });
        }
        Ok(Self { start_s, end_s })
    }

    /// Interval length in seconds.
    #[must_use]
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// Checks that a slice of intervals is sorted ascending by start and
/// pairwise non-overlapping.
#[must_use]
pub fn is_sorted_disjoint(intervals: &[TimeInterval]) -> bool {
    intervals
        .windows(2)
        .all(|pair| pair[0].end_s <= pair[1].start_s)
}

/// Sum of interval durations in seconds.
#[must_use]
pub fn total_duration_s(intervals: &[TimeInterval]) -> f64 {
    intervals.iter().map(TimeInterval::duration_s).sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame Rates
// ─────────────────────────────────────────────────────────────────────────────

/// The frame rates accepted by the export grid, as exact rationals.
///
/// NTSC members (23.976, 29.97, 59.94) are the `N000/1001` family; everything
/// else is integer. Only these eight values are accepted from job settings.
const SUPPORTED_FPS: &[(u32, u32)] = &[
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];

/// An exact frame rate `num/den` from the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fps {
    num: u32,
    den: u32,
}

impl Fps {
    /// The default frame grid (30 fps).
    pub const DEFAULT: Fps = Fps { num: 30, den: 1 };

    /// Resolves a nominal value (e.g. `29.97`, `30`) to a supported rate.
    ///
    /// Returns `None` for anything outside the supported set. A tolerance of
    /// 0.005 absorbs the difference between the conventional decimal and the
    /// exact rational (29.97 vs 30000/1001).
    #[must_use]
    pub fn from_nominal(value: f64) -> Option<Self> {
        SUPPORTED_FPS
            .iter()
            .find(|(num, den)| (value - *num as f64 / *den as f64).abs() < 0.005)
            .map(|&(num, den)| Self { num, den })
    }

    /// The exact rate as a float, e.g. `29.97002997...` for 30000/1001.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// The conventional decimal label (`29.97`, not `29.97002997`).
    #[must_use]
    pub fn nominal(&self) -> f64 {
        if self.den == 1001 {
            self.num as f64 / 1000.0
        } else {
            self.num as f64
        }
    }

    /// Rational numerator.
    #[must_use]
    pub fn numerator(&self) -> u32 {
        self.num
    }

    /// Rational denominator.
    #[must_use]
    pub fn denominator(&self) -> u32 {
        self.den
    }

    /// Whether this is one of the NTSC rates (23.976, 29.97, 59.94).
    #[must_use]
    pub fn is_ntsc(&self) -> bool {
        self.den == 1001
    }

    /// Integer timebase for the legacy editor XML (`round(fps)`).
    #[must_use]
    pub fn timebase(&self) -> u32 {
        (self.as_f64()).round() as u32
    }

    /// Frame duration as a rational number of seconds `(num, den)`.
    ///
    /// `1001/30000` for 29.97, `1/30` for 30.
    #[must_use]
    pub fn frame_duration(&self) -> (u32, u32) {
        (self.den, self.num)
    }

    /// Maps a source timestamp onto the frame grid: `floor(t * fps + 0.5)`.
    #[must_use]
    pub fn frame_index(&self, seconds: f64) -> i64 {
        (seconds * self.as_f64() + 0.5).floor() as i64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}", self.nominal())
        }
    }
}

impl Serialize for Fps {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.nominal())
    }
}

impl<'de> Deserialize<'de> for Fps {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        let value = match Repr::deserialize(deserializer)? {
            Repr::Number(n) => n,
            Repr::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("unparseable fps: {s:?}")))?,
        };

        Fps::from_nominal(value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unsupported fps {value}; expected one of 23.976, 24, 25, 29.97, 30, 50, 59.94, 60"
            ))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cuts
// ─────────────────────────────────────────────────────────────────────────────

/// A keep-segment: a source interval plus its frame indices on the export grid.
///
/// `in_frame`/`out_frame` are derived from the interval at planning time via
/// [`Fps::frame_index`]; the planner guarantees `out_frame > in_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    /// Source range that survives editing.
    pub interval: TimeInterval,
    /// First kept frame (inclusive) on the export grid.
    pub in_frame: i64,
    /// First dropped frame (exclusive) on the export grid.
    pub out_frame: i64,
}

impl Cut {
    /// Kept length in frames.
    #[must_use]
    pub fn frames(&self) -> i64 {
        self.out_frame - self.in_frame
    }
}

/// Sum of kept frames across a cut list.
#[must_use]
pub fn total_frames(cuts: &[Cut]) -> i64 {
    cuts.iter().map(Cut::frames).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_rejects_empty_and_inverted() {
        assert!(TimeInterval::new(1.0, 1.0).is_err());
        assert!(TimeInterval::new(2.0, 1.0).is_err());
        assert!(TimeInterval::new(-0.1, 1.0).is_err());
        assert!(TimeInterval::new(0.0, 0.5).is_ok());
    }

    #[test]
    fn sorted_disjoint_detects_overlap() {
        let a = TimeInterval::new(0.0, 1.0).unwrap();
        let b = TimeInterval::new(1.0, 2.0).unwrap();
        let c = TimeInterval::new(1.5, 3.0).unwrap();
        assert!(is_sorted_disjoint(&[a, b]));
        assert!(!is_sorted_disjoint(&[a, b, c]));
        assert!(is_sorted_disjoint(&[]));
    }

    #[test]
    fn fps_resolves_nominal_values() {
        assert_eq!(Fps::from_nominal(30.0), Some(Fps { num: 30, den: 1 }));
        assert_eq!(
            Fps::from_nominal(29.97),
            Some(Fps {
                num: 30000,
                den: 1001
            })
        );
        assert_eq!(
            Fps::from_nominal(23.976),
            Some(Fps {
                num: 24000,
                den: 1001
            })
        );
        assert_eq!(Fps::from_nominal(31.0), None);
    }

    #[test]
    fn fps_ntsc_classification() {
        assert!(Fps::from_nominal(59.94).unwrap().is_ntsc());
        assert!(!Fps::from_nominal(60.0).unwrap().is_ntsc());
        assert_eq!(Fps::from_nominal(29.97).unwrap().timebase(), 30);
        assert_eq!(Fps::from_nominal(23.976).unwrap().timebase(), 24);
    }

    #[test]
    fn fps_frame_index_rounds_half_up() {
        let fps = Fps::from_nominal(30.0).unwrap();
        assert_eq!(fps.frame_index(0.0), 0);
        assert_eq!(fps.frame_index(4.125), 124); // 123.75 + 0.5 -> 124
        assert_eq!(fps.frame_index(10.0), 300);
    }

    #[test]
    fn fps_json_round_trip() {
        let fps: Fps = serde_json::from_str("29.97").unwrap();
        assert!(fps.is_ntsc());
        let back = serde_json::to_string(&fps).unwrap();
        assert_eq!(back, "29.97");

        let fps: Fps = serde_json::from_str("\"25\"").unwrap();
        assert_eq!(fps.timebase(), 25);

        assert!(serde_json::from_str::<Fps>("48").is_err());
    }

    #[test]
    fn cut_frame_arithmetic() {
        let cut = Cut {
            interval: TimeInterval::new(0.0, 4.125).unwrap(),
            in_frame: 0,
            out_frame: 124,
        };
        assert_eq!(cut.frames(), 124);
        assert_eq!(total_frames(&[cut, cut]), 248);
    }
}
