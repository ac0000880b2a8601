//! Time Model
//!
//! Converts instants and granularities into the form each backend's wire
//! protocol requires:
//!
//! - Akumuli: `YYYYMMDDTHHMMSS.nnnnnnnnn` query timestamps, integer epoch
//!   nanoseconds on the ingestion socket
//! - Seriesly: epoch milliseconds everywhere
//! - VictoriaMetrics: RFC 3339 with milliseconds and offset for instant
//!   queries, whole-second window/offset for range functions, epoch
//!   milliseconds on the write path
//!
//! It also owns bucket handling: fitting a requested granularity onto the
//! units a backend understands, and synthesizing a single covering bucket
//! when none was requested.

use crate::model::{Bucket, TimeRange};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Granularity units, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Every unit, finest first
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    /// Length of one unit in nanoseconds
    pub fn as_nanos(&self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Length of one unit in milliseconds (zero below one millisecond)
    pub fn as_millis(&self) -> u64 {
        (self.as_nanos() / 1_000_000) as u64
    }

    /// Short duration suffix (`n`, `us`, `ms`, `s`, `m`, `h`, `d`)
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "n",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Parse a unit name or suffix
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "n" | "ns" | "nanos" | "nanoseconds" => Some(Self::Nanoseconds),
            "us" | "micros" | "microseconds" => Some(Self::Microseconds),
            "ms" | "millis" | "milliseconds" => Some(Self::Milliseconds),
            "s" | "sec" | "seconds" => Some(Self::Seconds),
            "m" | "min" | "minutes" => Some(Self::Minutes),
            "h" | "hours" => Some(Self::Hours),
            "d" | "days" => Some(Self::Days),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        write!(f, "{}", name)
    }
}

/// Source of "now" for encoders that depend on wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================
// Timestamp encodings
// ============================================

/// Akumuli query timestamp: basic ISO 8601 with nine fractional digits
pub fn akumuli_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S.%9f").to_string()
}

/// Nanoseconds since the Unix epoch, exact for any representable instant
pub fn epoch_nanos(ts: DateTime<Utc>) -> i128 {
    ts.timestamp() as i128 * 1_000_000_000 + ts.timestamp_subsec_nanos() as i128
}

/// Milliseconds since the Unix epoch
pub fn epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// RFC 3339 with milliseconds and explicit offset (`2024-01-01T00:00:00.000+00:00`)
pub fn rfc3339_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, false)
}

// ============================================
// Buckets
// ============================================

/// Fit `bucket` onto the units a backend understands.
///
/// A supported unit passes through untouched. Otherwise the bucket is
/// re-expressed in the coarsest supported unit not coarser than the
/// requested one, truncating; if the request is finer than every supported
/// unit the finest supported unit is used with a minimum value of one.
/// Any conversion is logged since it can lose precision.
pub fn fit_bucket(bucket: Bucket, supported: &[TimeUnit]) -> Bucket {
    if supported.contains(&bucket.unit) {
        return bucket;
    }

    let target = supported
        .iter()
        .copied()
        .filter(|unit| *unit <= bucket.unit)
        .max()
        .or_else(|| supported.iter().copied().min());

    let Some(target) = target else {
        return bucket;
    };

    let value = (bucket.as_nanos() / target.as_nanos()).max(1) as u64;
    let fitted = Bucket::new(value, target);

    tracing::warn!(
        "Granularity {} {} not supported by backend, using {} {} instead",
        bucket.value,
        bucket.unit,
        fitted.value,
        fitted.unit
    );

    fitted
}

/// Units tried for a synthesized bucket, coarsest first
const SYNTHESIS_UNITS: [TimeUnit; 4] = [
    TimeUnit::Days,
    TimeUnit::Hours,
    TimeUnit::Minutes,
    TimeUnit::Seconds,
];

/// Build one bucket that covers the whole of `range`.
///
/// The span is inflated by 10% against boundary rounding, the unit is the
/// coarsest one whose single-unit length does not exceed the inflated span
/// (falling back to milliseconds), and the value is the inflated span in
/// that unit rounded up.
pub fn synthesize_bucket(range: &TimeRange) -> Bucket {
    let span_ms = range.span().num_milliseconds().max(0) as u64;
    let inflated = span_ms + (span_ms / 100) * 10;

    let unit = SYNTHESIS_UNITS
        .iter()
        .copied()
        .find(|unit| unit.as_millis() <= inflated)
        .unwrap_or(TimeUnit::Milliseconds);

    let value = inflated.div_ceil(unit.as_millis()).max(1);
    Bucket::new(value, unit)
}

/// Whole-second lookback window for a PromQL range function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromWindow {
    /// Range selector length in seconds (`[<duration>s]`)
    pub duration_secs: i64,
    /// Distance from `now` back to the end of the window (`offset <offset>s`)
    pub offset_secs: i64,
}

/// Compute the `[duration] offset` pair that makes a range selector evaluated
/// at `now` cover `range`.
///
/// Duration is the span rounded up to whole seconds; offset is the distance
/// from `now` to `range.to` rounded down (never negative). Flooring the
/// offset can push the window end up to a second past `range.to`, so when
/// the window would start after `range.from` the duration grows by one.
pub fn prom_window(range: &TimeRange, now: DateTime<Utc>) -> PromWindow {
    let from_ms = range.from.timestamp_millis();
    let to_ms = range.to.timestamp_millis();
    let now_ms = now.timestamp_millis();

    let mut duration_secs = ((to_ms - from_ms).max(0) + 999) / 1000;
    let offset_secs = (now_ms - to_ms).max(0).div_euclid(1000);

    let window_start_ms = now_ms - (offset_secs + duration_secs) * 1000;
    if window_start_ms > from_ms {
        duration_secs += 1;
    }

    PromWindow {
        duration_secs,
        offset_secs,
    }
}
