//! Seriesly request encoding
//!
//! Every operation targets one database. Queries are GETs against
//! `<db>/_query` grouped in milliseconds and filtered on the metric field;
//! documents are POSTed to `<db>?ts=<millis>`.

use crate::aggregation::{bucket_units, primitive};
use crate::backends::ensure_finite;
use crate::error::AdapterResult;
use crate::model::{Backend, MetricPoint, ReadQuery, ScanQuery, TagFilter, TagSet};
use crate::time::{epoch_millis, fit_bucket, synthesize_bucket};
use serde::Serialize;

/// Document field holding the metric name
pub const METRIC_FIELD: &str = "metric";
/// Document field holding the value
pub const VALUE_FIELD: &str = "value";

/// A stored document
#[derive(Debug, Serialize)]
pub struct Document<'a> {
    pub metric: &'a str,
    pub value: f64,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a TagSet,
}

fn no_tags(tags: &&TagSet) -> bool {
    tags.is_empty()
}

fn ignore_tags(tags: &TagFilter) {
    // The query language filters on one field only; the metric takes it
    if !tags.is_empty() {
        tracing::debug!("seriesly cannot filter on tags, ignoring {} tag filter(s)", tags.len());
    }
}

fn query_url(db_url: &str, from: i64, to: i64, group: u64, reducer: &str, metric: &str) -> String {
    format!(
        "{}/_query?from={}&to={}&group={}&ptr=/{}&reducer={}&f=/{}&fv={}",
        db_url,
        from,
        to,
        group,
        VALUE_FIELD,
        reducer,
        METRIC_FIELD,
        urlencoding::encode(metric)
    )
}

/// Point lookup grouped per millisecond, so the only bucket is keyed by the
/// timestamp itself
pub fn read_url(db_url: &str, query: &ReadQuery) -> String {
    ignore_tags(&query.tags);
    let at = epoch_millis(query.timestamp);
    query_url(db_url, at, at, 1, "any", &query.metric)
}

/// Range query; the group size is the bucket length in milliseconds
pub fn scan_url(db_url: &str, query: &ScanQuery) -> String {
    ignore_tags(&query.tags);

    let bucket = match query.aggregation.bucket {
        Some(bucket) => fit_bucket(bucket, bucket_units(Backend::Seriesly)),
        None => synthesize_bucket(&query.range),
    };
    let group = bucket.value.saturating_mul(bucket.unit.as_millis());

    query_url(
        db_url,
        epoch_millis(query.range.from),
        epoch_millis(query.range.to),
        group,
        primitive(Backend::Seriesly, query.aggregation.kind),
        &query.metric,
    )
}

/// Target URL and JSON body of an insert
pub fn insert_request(db_url: &str, point: &MetricPoint) -> AdapterResult<(String, String)> {
    ensure_finite(point)?;

    let document = Document {
        metric: &point.metric,
        value: point.value,
        tags: &point.tags,
    };
    let url = format!("{}?ts={}", db_url, epoch_millis(point.timestamp));

    Ok((url, serde_json::to_string(&document)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregationKind, AggregationSpec};
    use crate::time::TimeUnit;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const DB: &str = "http://db:3133/TestDB";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_read_url() {
        let query = ReadQuery::new("cpu", at()).tags(TagFilter::new().with("host", ["a"]));
        assert_eq!(
            read_url(DB, &query),
            "http://db:3133/TestDB/_query?from=1704067200000&to=1704067200000&group=1\
             &ptr=/value&reducer=any&f=/metric&fv=cpu"
        );
    }

    #[test]
    fn test_scan_url_with_bucket() {
        let query = ScanQuery::new("cpu", at(), at() + Duration::hours(1))
            .aggregation(AggregationSpec::new(AggregationKind::Sum).bucket(5, TimeUnit::Minutes));
        let url = scan_url(DB, &query);
        assert!(url.contains("&group=300000&"));
        assert!(url.contains("&reducer=sum&"));
    }

    #[test]
    fn test_scan_url_unsupported_unit_falls_back_to_millis() {
        let query = ScanQuery::new("cpu", at(), at() + Duration::hours(1)).aggregation(
            AggregationSpec::new(AggregationKind::Avg).bucket(2500, TimeUnit::Microseconds),
        );
        assert!(scan_url(DB, &query).contains("&group=2&"));

        let query = ScanQuery::new("cpu", at(), at() + Duration::hours(1)).aggregation(
            AggregationSpec::new(AggregationKind::Avg).bucket(10, TimeUnit::Nanoseconds),
        );
        assert!(scan_url(DB, &query).contains("&group=1&"));
    }

    #[test]
    fn test_scan_url_synthesized_bucket() {
        let query = ScanQuery::new("cpu", at(), at() + Duration::seconds(30))
            .aggregation(AggregationSpec::new(AggregationKind::Count));
        let url = scan_url(DB, &query);
        assert!(url.contains("&group=33000&"));
        assert!(url.contains("&reducer=count&"));
    }

    #[test]
    fn test_tags_do_not_change_queries() {
        let plain = ReadQuery::new("cpu", at());
        let tagged = plain.clone().tags(TagFilter::new().with("host", ["b"]));
        assert_eq!(read_url(DB, &plain), read_url(DB, &tagged));
    }

    #[test]
    fn test_metric_is_encoded() {
        let url = read_url(DB, &ReadQuery::new("cpu load&x", at()));
        assert!(url.ends_with("&fv=cpu%20load%26x"));
    }

    #[test]
    fn test_insert_request() {
        let point = MetricPoint::new("cpu", at(), 42.0).tag("host", "a");
        let (url, body) = insert_request(DB, &point).unwrap();
        assert_eq!(url, "http://db:3133/TestDB?ts=1704067200000");
        assert_eq!(body, r#"{"metric":"cpu","value":42.0,"tags":{"host":"a"}}"#);

        let (_, body) = insert_request(DB, &MetricPoint::new("cpu", at(), 1.5)).unwrap();
        assert_eq!(body, r#"{"metric":"cpu","value":1.5}"#);
    }
}
