//! Akumuli request encoding
//!
//! Queries are JSON objects POSTed to the HTTP query endpoint; inserts are
//! three-line frames written to the ingestion socket:
//!
//! ```text
//! +cpu host=a dc=eu\r\n
//! :1704067200000000000\r\n
//! +42\r\n
//! ```

use crate::aggregation::{bucket_units, primitive};
use crate::backends::ensure_finite;
use crate::error::{AdapterError, AdapterResult};
use crate::model::{Backend, MetricPoint, ReadQuery, ScanQuery, TagFilter};
use crate::time::{akumuli_timestamp, epoch_nanos, fit_bucket, synthesize_bucket};
use serde::Serialize;
use std::collections::BTreeMap;

/// Body of an Akumuli HTTP query
#[derive(Debug, Serialize)]
pub struct QueryBody<'a> {
    pub metric: &'a str,
    pub range: Range,
    /// Omitted rather than sent empty when there is no tag filter
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<BTreeMap<&'a str, Vec<&'a str>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sample>,
    #[serde(rename = "group-by", skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,
    pub output: Output,
}

#[derive(Debug, Serialize)]
pub struct Range {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct Sample {
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GroupBy {
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct Output {
    pub format: &'static str,
}

impl Default for Output {
    fn default() -> Self {
        Self { format: "csv" }
    }
}

fn where_clause(tags: &TagFilter) -> Option<BTreeMap<&str, Vec<&str>>> {
    if tags.is_empty() {
        return None;
    }

    Some(
        tags.iter()
            .map(|(tag, values)| (tag, values.iter().map(String::as_str).collect()))
            .collect(),
    )
}

/// Point lookup: `from == to == timestamp`
pub fn read_body(query: &ReadQuery) -> AdapterResult<String> {
    let at = akumuli_timestamp(query.timestamp);
    let body = QueryBody {
        metric: &query.metric,
        range: Range {
            from: at.clone(),
            to: at,
        },
        filter: where_clause(&query.tags),
        sample: None,
        group_by: None,
        output: Output::default(),
    };

    Ok(serde_json::to_string(&body)?)
}

/// Range query sampled into buckets. Without an explicit bucket a single
/// bucket spanning the range is requested.
pub fn scan_body(query: &ScanQuery) -> AdapterResult<String> {
    let bucket = match query.aggregation.bucket {
        Some(bucket) => fit_bucket(bucket, bucket_units(Backend::Akumuli)),
        None => synthesize_bucket(&query.range),
    };

    let body = QueryBody {
        metric: &query.metric,
        range: Range {
            from: akumuli_timestamp(query.range.from),
            to: akumuli_timestamp(query.range.to),
        },
        filter: where_clause(&query.tags),
        sample: Some(Sample {
            name: primitive(Backend::Akumuli, query.aggregation.kind),
        }),
        group_by: Some(GroupBy {
            time: bucket.to_string(),
        }),
        output: Output::default(),
    };

    Ok(serde_json::to_string(&body)?)
}

/// Series names and tags are space separated on the wire
fn check_token(kind: &str, token: &str) -> AdapterResult<()> {
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(AdapterError::InvalidInput(format!(
            "{} {:?} cannot be sent to akumuli",
            kind, token
        )));
    }
    Ok(())
}

/// Ingestion frame for one point
pub fn insert_frame(point: &MetricPoint) -> AdapterResult<String> {
    ensure_finite(point)?;
    check_token("metric", &point.metric)?;

    let mut frame = String::with_capacity(64);
    frame.push('+');
    frame.push_str(&point.metric);
    for (key, value) in &point.tags {
        check_token("tag name", key)?;
        check_token("tag value", value)?;
        frame.push(' ');
        frame.push_str(key);
        frame.push('=');
        frame.push_str(value);
    }
    frame.push_str(&format!(
        "\r\n:{}\r\n+{}\r\n",
        epoch_nanos(point.timestamp),
        point.value
    ));

    Ok(frame)
}
