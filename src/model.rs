//! Canonical operation model shared by every backend adapter
//!
//! This module defines the backend-neutral shapes the workload driver speaks:
//! - `MetricPoint`: one value to insert
//! - `TagFilter`: per-tag allowed values for `read`/`scan`
//! - `TimeRange` and `AggregationSpec`: what a scan asks for
//! - `Status` and `Outcome`: what comes back

use crate::time::TimeUnit;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The storage backends an adapter can speak to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// TCP ingestion + JSON/CSV HTTP query API
    Akumuli,
    /// JSON-over-HTTP document store
    Seriesly,
    /// PromQL query API + Influx line-protocol writes
    #[serde(rename = "victoriametrics")]
    VictoriaMetrics,
}

impl Backend {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "akumuli" => Some(Self::Akumuli),
            "seriesly" => Some(Self::Seriesly),
            "victoriametrics" | "victoria" | "vm" => Some(Self::VictoriaMetrics),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Akumuli => write!(f, "akumuli"),
            Backend::Seriesly => write!(f, "seriesly"),
            Backend::VictoriaMetrics => write!(f, "victoriametrics"),
        }
    }
}

/// Tags attached to a written point. Ordered so every encoder emits them
/// deterministically.
pub type TagSet = BTreeMap<String, String>;

/// A single measurement handed to `insert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric (series) name
    pub metric: String,
    /// Instant of the measurement, nanosecond capable
    pub timestamp: DateTime<Utc>,
    /// The measured value
    pub value: f64,
    /// Tag name to tag value
    #[serde(default)]
    pub tags: TagSet,
}

impl MetricPoint {
    /// Create a point without tags
    pub fn new(metric: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            timestamp,
            value,
            tags: TagSet::new(),
        }
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder method: add multiple tags
    pub fn tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }
}

/// Restricts a query to points whose tag values are in the allowed set.
///
/// An empty filter means "no filter". Backed by ordered collections so the
/// encoded form never depends on the order the caller built it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter(BTreeMap<String, BTreeSet<String>>);

impl TagFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: allow `values` for `tag` (merged with earlier calls)
    pub fn with<I, S>(mut self, tag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(tag.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Whether no tag restriction is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of restricted tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate tags in name order, each with its values in value order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check whether a concrete tag set passes this filter
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.0.iter().all(|(name, allowed)| {
            tags.get(name)
                .map(|value| allowed.contains(value))
                .unwrap_or(false)
        })
    }
}

impl From<HashMap<String, Vec<String>>> for TagFilter {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        map.into_iter()
            .fold(TagFilter::new(), |filter, (tag, values)| filter.with(tag, values))
    }
}

impl FromIterator<(String, String)> for TagFilter {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(TagFilter::new(), |filter, (tag, value)| filter.with(tag, [value]))
    }
}

/// A closed time interval `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new range
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// A point lookup (`from == to`)
    pub fn point(at: DateTime<Utc>) -> Self {
        Self { from: at, to: at }
    }

    /// Length of the range
    pub fn span(&self) -> Duration {
        self.to - self.from
    }

    /// Whether `from` lies after `to`
    pub fn is_inverted(&self) -> bool {
        self.from > self.to
    }
}

/// The reduction a scan asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// No explicit aggregation, the backend default applies
    #[default]
    None,
    /// Average of values
    Avg,
    /// Count of values
    Count,
    /// Sum of values
    Sum,
}

impl AggregationKind {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "avg" | "average" => Some(Self::Avg),
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Avg => write!(f, "avg"),
            Self::Count => write!(f, "count"),
            Self::Sum => write!(f, "sum"),
        }
    }
}

/// A time-aligned window size, e.g. `5 minutes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub value: u64,
    pub unit: TimeUnit,
}

impl Bucket {
    /// Create a new bucket
    pub fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Whole bucket length in nanoseconds
    pub fn as_nanos(&self) -> u128 {
        self.value as u128 * self.unit.as_nanos()
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Aggregation kind plus optional bucket granularity.
///
/// When `bucket` is `None` the adapters synthesize one bucket covering the
/// whole scanned range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub kind: AggregationKind,
    pub bucket: Option<Bucket>,
}

impl AggregationSpec {
    /// Aggregation without explicit granularity
    pub fn new(kind: AggregationKind) -> Self {
        Self { kind, bucket: None }
    }

    /// Builder method: set bucket granularity
    pub fn bucket(mut self, value: u64, unit: TimeUnit) -> Self {
        // A zero-sized bucket means "one bucket for the whole range"
        self.bucket = (value > 0).then(|| Bucket::new(value, unit));
        self
    }
}

/// Point lookup of one metric at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct ReadQuery {
    pub metric: String,
    pub timestamp: DateTime<Utc>,
    pub tags: TagFilter,
}

impl ReadQuery {
    /// Create an unfiltered read
    pub fn new(metric: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            timestamp,
            tags: TagFilter::new(),
        }
    }

    /// Builder method: set the tag filter
    pub fn tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }
}

/// Aggregated range query over one metric
#[derive(Debug, Clone, PartialEq)]
pub struct ScanQuery {
    pub metric: String,
    pub range: TimeRange,
    pub tags: TagFilter,
    pub aggregation: AggregationSpec,
}

impl ScanQuery {
    /// Create an unfiltered scan with the default aggregation
    pub fn new(metric: impl Into<String>, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            range: TimeRange::new(from, to),
            tags: TagFilter::new(),
            aggregation: AggregationSpec::default(),
        }
    }

    /// Builder method: set the tag filter
    pub fn tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }

    /// Builder method: set the aggregation
    pub fn aggregation(mut self, aggregation: AggregationSpec) -> Self {
        self.aggregation = aggregation;
        self
    }
}

/// Result code handed back to the workload driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success / found
    Ok,
    /// Failure, not found, or error
    Error,
}

impl Status {
    /// Numeric code: `0` on success, `-1` otherwise
    pub fn code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => -1,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// What a response verifier concluded about a backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The expected data is present
    Found,
    /// Well-formed reply without matching data
    NotFound,
    /// Data came back but contradicts the request (extra rows, wrong timestamp,
    /// backend-reported error status)
    Rejected(String),
    /// The reply could not be interpreted
    Malformed(String),
}

impl Outcome {
    /// Collapse to the driver-facing status
    pub fn status(&self) -> Status {
        match self {
            Outcome::Found => Status::Ok,
            _ => Status::Error,
        }
    }
}
