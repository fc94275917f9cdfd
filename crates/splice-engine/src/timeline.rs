//! 90 kHz PTS arithmetic: wraparound unwrapping, deltas, UTC projection
//! and the `"Xs Yms"` duration rendering used throughout the report.

use chrono::{DateTime, TimeDelta, Utc};

/// PTS/DTS clock rate
pub const PTS_CLOCK_HZ: u64 = 90_000;
/// Ticks per millisecond
pub const TICKS_PER_MS: u64 = 90;
/// PTS values are 33-bit counters
pub const PTS_MODULUS: u64 = 1 << 33;
pub const PTS_MASK: u64 = PTS_MODULUS - 1;

const HALF_MODULUS: u64 = PTS_MODULUS / 2;

/// Reconstructs a monotonically increasing PTS from a wrapping 33-bit one.
///
/// A decrease of more than half the modulus counts as one wraparound; each
/// wrap adds 2^33 to subsequent values.
#[derive(Debug, Clone, Default)]
pub struct PtsUnwrapper {
    previous: Option<u64>,
    wraps: u64,
}

impl PtsUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next raw value in arrival order and return its full PTS.
    pub fn push(&mut self, pts: u64) -> u64 {
        if let Some(previous) = self.previous
            && pts < previous
            && previous - pts > HALF_MODULUS
        {
            self.wraps += 1;
        }
        self.previous = Some(pts);
        pts + self.wraps * PTS_MODULUS
    }

    /// Wraparounds detected so far
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    pub fn previous(&self) -> Option<u64> {
        self.previous
    }
}

/// Unwrap a whole sequence in arrival order.
pub fn unwrap_sequence(values: impl IntoIterator<Item = u64>) -> Vec<u64> {
    let mut unwrapper = PtsUnwrapper::new();
    values.into_iter().map(|v| unwrapper.push(v)).collect()
}

/// The full PTS congruent to `raw` (mod 2^33) that lies closest to
/// `reference`, never negative.
pub fn unwrap_near(raw: u64, reference: u64) -> u64 {
    let raw = raw & PTS_MASK;
    let base = reference - (reference & PTS_MASK);
    let candidate = base + raw;
    let mut best = candidate;
    for other in [candidate.checked_sub(PTS_MODULUS), candidate.checked_add(PTS_MODULUS)]
        .into_iter()
        .flatten()
    {
        if other.abs_diff(reference) < best.abs_diff(reference) {
            best = other;
        }
    }
    best
}

/// Signed milliseconds of `pts` after `origin`, truncated toward zero.
pub fn offset_ms(pts: u64, origin: u64) -> i64 {
    (pts as i64 - origin as i64) / TICKS_PER_MS as i64
}

/// Whole seconds between two millisecond offsets, truncated toward zero.
pub fn delta_seconds(from_ms: i64, to_ms: i64) -> i64 {
    (to_ms - from_ms) / 1000
}

/// `utc = epoch + (pts - origin) / 90000` at millisecond precision.
pub fn pts_to_utc(epoch: DateTime<Utc>, pts: u64, origin: u64) -> DateTime<Utc> {
    epoch + TimeDelta::milliseconds(offset_ms(pts, origin))
}

pub fn format_utc(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Render seconds as `"Xs Yms"`, both parts truncated toward zero.
pub fn format_secs_ms(seconds: f64) -> String {
    let whole = seconds.trunc();
    format!("{}s {}ms", whole as i64, ((seconds - whole) * 1000.0) as i64)
}

/// As [`format_secs_ms`] with the millisecond part made non-negative.
pub fn format_secs_abs_ms(seconds: f64) -> String {
    let whole = seconds.trunc();
    format!(
        "{}s {}ms",
        whole as i64,
        (((seconds - whole) * 1000.0) as i64).abs()
    )
}

pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / PTS_CLOCK_HZ as f64
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
