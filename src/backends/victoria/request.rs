//! VictoriaMetrics request encoding
//!
//! Values are written through the Influx line-protocol endpoint as field
//! `value`, which VictoriaMetrics exposes as the series `<metric>_value`.
//! Reads are instant PromQL queries at the point's timestamp; scans wrap the
//! series in an `*_over_time` range function covering the requested window.

use crate::aggregation::primitive;
use crate::backends::ensure_finite;
use crate::error::{AdapterError, AdapterResult};
use crate::model::{Backend, MetricPoint, ReadQuery, ScanQuery, TagFilter};
use crate::time::{epoch_millis, prom_window, rfc3339_millis};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Field the value is written to, and the suffix of the queried series
pub const VALUE_FIELD: &str = "value";

static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("Invalid metric name regex"));

static LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Invalid label name regex"));

/// Only names PromQL accepts as a bare series selector can be queried
pub fn check_metric(metric: &str) -> AdapterResult<()> {
    if METRIC_NAME.is_match(metric) {
        Ok(())
    } else {
        Err(AdapterError::InvalidInput(format!(
            "{:?} is not a valid PromQL metric name",
            metric
        )))
    }
}

/// Body of a PromQL double-quoted string
fn quote(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `{tag=~"v1|v2",...}`, or `{}` without filters.
///
/// Values match literally: regex metacharacters are escaped before the
/// alternation is quoted.
pub fn label_matchers(tags: &TagFilter) -> AdapterResult<String> {
    let mut matchers = Vec::new();
    for (tag, values) in tags.iter() {
        if !LABEL_NAME.is_match(tag) {
            return Err(AdapterError::InvalidInput(format!(
                "{:?} is not a valid PromQL label name",
                tag
            )));
        }
        let alternatives: Vec<String> = values.iter().map(|v| regex::escape(v)).collect();
        matchers.push(format!("{}=~\"{}\"", tag, quote(&alternatives.join("|"))));
    }

    Ok(format!("{{{}}}", matchers.join(",")))
}

fn series(metric: &str, tags: &TagFilter) -> AdapterResult<String> {
    Ok(format!("{}_{}{}", metric, VALUE_FIELD, label_matchers(tags)?))
}

/// Instant query evaluated at the read timestamp
pub fn read_url(query_url: &str, query: &ReadQuery) -> AdapterResult<String> {
    check_metric(&query.metric)?;

    let expr = series(&query.metric, &query.tags)?;
    Ok(format!(
        "{}?query={}&time={}",
        query_url,
        urlencoding::encode(&expr),
        urlencoding::encode(&rfc3339_millis(query.timestamp))
    ))
}

/// The PromQL expression of a scan evaluated at `now`
pub fn scan_expr(query: &ScanQuery, now: DateTime<Utc>) -> AdapterResult<String> {
    check_metric(&query.metric)?;

    if let Some(bucket) = query.aggregation.bucket {
        tracing::debug!(
            "victoriametrics aggregates over the whole range, ignoring bucket {}",
            bucket
        );
    }

    let window = prom_window(&query.range, now);
    Ok(format!(
        "{}({}[{}s] offset {}s)",
        primitive(Backend::VictoriaMetrics, query.aggregation.kind),
        series(&query.metric, &query.tags)?,
        window.duration_secs,
        window.offset_secs
    ))
}

/// Range-function query evaluated now, looking back over the scanned range
pub fn scan_url(query_url: &str, query: &ScanQuery, now: DateTime<Utc>) -> AdapterResult<String> {
    let expr = scan_expr(query, now)?;
    Ok(format!("{}?query={}", query_url, urlencoding::encode(&expr)))
}

/// Escape `chars` with a backslash
fn escape(out: &mut String, raw: &str, chars: &[char]) {
    for c in raw.chars() {
        if chars.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// One Influx line: `<metric>[,tag=value]* value=<value> <millis>`.
///
/// Metrics that cannot be queried back are refused here too.
pub fn line(point: &MetricPoint) -> AdapterResult<String> {
    ensure_finite(point)?;
    check_metric(&point.metric)?;

    let mut line = String::with_capacity(64);
    escape(&mut line, &point.metric, &[',', ' ']);
    for (key, value) in &point.tags {
        if key.is_empty() || value.is_empty() {
            return Err(AdapterError::InvalidInput(format!(
                "empty tag {:?}={:?} on metric {:?}",
                key, value, point.metric
            )));
        }
        line.push(',');
        escape(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape(&mut line, value, &[',', '=', ' ']);
    }
    line.push_str(&format!(
        " {}={} {}",
        VALUE_FIELD,
        point.value,
        epoch_millis(point.timestamp)
    ));

    Ok(line)
}

/// Write endpoint with database and millisecond precision
pub fn write_url(write_url: &str, db_name: &str) -> String {
    format!("{}?db={}&precision=ms", write_url, urlencoding::encode(db_name))
}
