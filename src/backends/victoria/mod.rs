//! VictoriaMetrics adapter
//!
//! Writes use the Influx line-protocol endpoint, queries the Prometheus
//! instant-query API. Scans are evaluated at the current wall-clock time,
//! so the protocol carries a `Clock`.

mod request;
mod response;

pub use request::{
    check_metric, label_matchers, line, read_url, scan_expr, scan_url, write_url, VALUE_FIELD,
};
pub use response::{verify_query, QueryData, QueryResponse};

use super::{endpoint, Adapter, InsertPayload, Link, WireProtocol};
use crate::config::VictoriaConfig;
use crate::error::AdapterResult;
use crate::model::{Backend, MetricPoint, Outcome, ReadQuery, ScanQuery};
use crate::time::{Clock, SystemClock};
use crate::transport::{HttpReply, HttpRequest, HttpTransport};
use std::sync::Arc;

/// VictoriaMetrics wire protocol
#[derive(Clone)]
pub struct VictoriaProtocol {
    query_url: String,
    write_url: String,
    clock: Arc<dyn Clock>,
}

impl VictoriaProtocol {
    /// `write_url` must already carry the database and precision parameters
    pub fn new(query_url: impl Into<String>, write_url: impl Into<String>) -> Self {
        Self {
            query_url: query_url.into(),
            write_url: write_url.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder method: evaluate scan windows against `clock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

impl WireProtocol for VictoriaProtocol {
    fn backend(&self) -> Backend {
        Backend::VictoriaMetrics
    }

    fn encode_read(&self, query: &ReadQuery) -> AdapterResult<HttpRequest> {
        Ok(HttpRequest::Get {
            url: read_url(&self.query_url, query)?,
        })
    }

    fn encode_scan(&self, query: &ScanQuery) -> AdapterResult<HttpRequest> {
        Ok(HttpRequest::Get {
            url: scan_url(&self.query_url, query, self.clock.now())?,
        })
    }

    fn encode_insert(&self, point: &MetricPoint) -> AdapterResult<InsertPayload> {
        Ok(InsertPayload::Http(HttpRequest::Post {
            url: self.write_url.clone(),
            body: line(point)?,
            content_type: "text/plain; charset=utf-8",
        }))
    }

    fn verify_read(&self, _query: &ReadQuery, reply: &HttpReply) -> Outcome {
        verify_query(reply)
    }

    fn verify_scan(&self, _query: &ScanQuery, reply: &HttpReply) -> Outcome {
        verify_query(reply)
    }
}

/// Build the adapter. No request is made until the first operation.
pub async fn connect(config: &VictoriaConfig) -> AdapterResult<Adapter<VictoriaProtocol>> {
    let options = &config.connection;
    let host = options.host()?;
    let port = config.port()?;

    let protocol = VictoriaProtocol::new(
        endpoint(&host, port, &config.query_path),
        write_url(&endpoint(&host, port, &config.write_path), &config.db_name),
    );

    if options.test {
        return Ok(Adapter::offline(protocol, options.debug));
    }

    let http = HttpTransport::new(options.retry_policy())?;

    tracing::debug!(
        "VictoriaMetrics queries at {}, writes at {}",
        protocol.query_url(),
        protocol.write_url()
    );

    Ok(Adapter::new(
        protocol,
        Link { http, ingest: None },
        options.debug,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::serve;
    use crate::backends::TsdbAdapter;
    use crate::config::ConnectionOptions;
    use crate::model::{AggregationKind, AggregationSpec, Status, TagFilter, TagSet};
    use crate::time::FixedClock;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use regex::Regex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Sample {
        series: String,
        tags: TagSet,
        ts_ms: i64,
    }

    type Store = Arc<Mutex<Vec<Sample>>>;

    /// Accepts `metric,k=v value=<f> <ms>` lines without escapes
    async fn write(State(store): State<Store>, body: String) -> StatusCode {
        for line in body.lines() {
            let parts: Vec<&str> = line.split(' ').collect();
            let mut series = parts[0].split(',');
            let metric = series.next().unwrap();
            let tags = series
                .map(|kv| {
                    let (k, v) = kv.split_once('=').unwrap();
                    (k.to_string(), v.to_string())
                })
                .collect();
            let field = parts[1].split_once('=').unwrap().0;

            store.lock().unwrap().push(Sample {
                series: format!("{}_{}", metric, field),
                tags,
                ts_ms: parts[2].parse().unwrap(),
            });
        }
        StatusCode::NO_CONTENT
    }

    /// Undo PromQL string escapes
    fn unquote(quoted: &str) -> String {
        let mut out = String::new();
        let mut chars = quoted.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend(chars.next()),
                c => out.push(c),
            }
        }
        out
    }

    /// Evaluates `series{tag=~"re"}` at `time`, or a range function with
    /// `[Ns] offset Ms` relative to the server clock. Matchers are anchored
    /// regexes, as in VictoriaMetrics.
    async fn query(
        State(store): State<Store>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let expr = &params["query"];
        let selector = Regex::new(r"([\w:]+)\{([^}]*)\}").unwrap();
        let matcher = Regex::new(r#"(\w+)=~"((?:[^"\\]|\\.)*)""#).unwrap();
        let window = Regex::new(r"\[(\d+)s\] offset (\d+)s").unwrap();

        let caps = selector.captures(expr).unwrap();
        let series = caps[1].to_string();
        let filters: Vec<(String, Regex)> = matcher
            .captures_iter(&caps[2])
            .map(|m| {
                let pattern = format!("^(?:{})$", unquote(&m[2]));
                (m[1].to_string(), Regex::new(&pattern).unwrap())
            })
            .collect();

        let (from, to) = match params.get("time") {
            Some(time) => {
                let at = DateTime::parse_from_rfc3339(time).unwrap().timestamp_millis();
                (at, at)
            }
            None => {
                let w = window.captures(expr).unwrap();
                let duration: i64 = w[1].parse().unwrap();
                let offset: i64 = w[2].parse().unwrap();
                let end = Utc::now().timestamp_millis() - offset * 1000;
                (end - duration * 1000, end)
            }
        };

        let result: Vec<Value> = store
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.series == series && s.ts_ms >= from && s.ts_ms <= to)
            .filter(|s| {
                filters.iter().all(|(tag, allowed)| {
                    s.tags.get(tag).map(|v| allowed.is_match(v)).unwrap_or(false)
                })
            })
            .map(|s| json!({ "metric": { "__name__": s.series }, "value": [s.ts_ms / 1000, "1"] }))
            .collect();

        Json(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": result }
        }))
    }

    async fn fake_victoria() -> std::net::SocketAddr {
        let router = Router::new()
            .route("/write", post(write))
            .route("/api/v1/query", get(query))
            .with_state(Store::default());
        serve(router).await
    }

    fn config(port: u16) -> VictoriaConfig {
        VictoriaConfig {
            connection: ConnectionOptions {
                ip: Some("127.0.0.1".to_string()),
                retries: 0,
                ..ConnectionOptions::default()
            },
            port: Some(port),
            ..VictoriaConfig::default()
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let addr = fake_victoria().await;
        let mut adapter = connect(&config(addr.port())).await.unwrap();

        let t = Utc::now() - Duration::seconds(30);
        let point = MetricPoint::new("cpu", t, 42.0).tag("host", "a");
        assert_eq!(adapter.insert(&point).await, Status::Ok);

        let found = ReadQuery::new("cpu", t).tags(TagFilter::new().with("host", ["a"]));
        assert_eq!(adapter.read(&found).await, Status::Ok);

        let unfiltered = ReadQuery::new("cpu", t);
        assert_eq!(adapter.read(&unfiltered).await, Status::Ok);

        let other = ReadQuery::new("cpu", t).tags(TagFilter::new().with("host", ["b"]));
        assert_eq!(adapter.read(&other).await, Status::Error);

        let scan = ScanQuery::new("cpu", t - Duration::seconds(5), t + Duration::seconds(5))
            .aggregation(AggregationSpec::new(AggregationKind::Avg));
        assert_eq!(adapter.scan(&scan).await, Status::Ok);

        let missed = ScanQuery::new("cpu", t - Duration::minutes(10), t - Duration::minutes(5));
        assert_eq!(adapter.scan(&missed).await, Status::Error);

        // HTTP is released on drop, not by cleanup
        adapter.cleanup().await.unwrap();
        assert_eq!(adapter.read(&found).await, Status::Ok);
        adapter.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_varied_points() {
        let addr = fake_victoria().await;
        let mut adapter = connect(&config(addr.port())).await.unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = vec![
            MetricPoint::new("cpu", base + Duration::nanoseconds(1_234_567), 0.125)
                .tag("host", "a")
                .tag("dc", "eu"),
            MetricPoint::new("cpu", base + Duration::nanoseconds(999_999_999), -3.5)
                .tag("host", "10.0.0.1")
                .tag("rack", "r7"),
            MetricPoint::new("node:load1", base + Duration::milliseconds(17), 1e-9)
                .tag("host", "a\"b"),
            MetricPoint::new(
                "mem",
                Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap()
                    + Duration::nanoseconds(999_500_000),
                1234.5678,
            )
            .tag("host", "b"),
        ];

        for point in &points {
            assert_eq!(adapter.insert(point).await, Status::Ok, "insert {:?}", point);
        }

        for point in &points {
            let mut filter = TagFilter::new();
            for (key, value) in &point.tags {
                filter = filter.with(key.as_str(), [value.as_str()]);
            }
            let query = ReadQuery::new(point.metric.as_str(), point.timestamp).tags(filter);
            assert_eq!(adapter.read(&query).await, Status::Ok, "read {:?}", point);

            let bare = ReadQuery::new(point.metric.as_str(), point.timestamp);
            assert_eq!(adapter.read(&bare).await, Status::Ok, "read {:?}", point);
        }

        // A dotted value must not act as a wildcard
        let lookalike = MetricPoint::new("cpu", base + Duration::seconds(5), 1.0)
            .tag("host", "10a0b0c1");
        assert_eq!(adapter.insert(&lookalike).await, Status::Ok);
        let query = ReadQuery::new("cpu", lookalike.timestamp)
            .tags(TagFilter::new().with("host", ["10.0.0.1"]));
        assert_eq!(adapter.read(&query).await, Status::Error);
    }

    #[tokio::test]
    async fn test_invalid_metric_is_not_sent() {
        let addr = fake_victoria().await;
        let mut adapter = connect(&config(addr.port())).await.unwrap();

        let query = ReadQuery::new("cpu-load", Utc::now());
        assert_eq!(adapter.read(&query).await, Status::Error);
    }

    #[tokio::test]
    async fn test_insert_of_unqueryable_metric_fails() {
        let addr = fake_victoria().await;
        let mut adapter = connect(&config(addr.port())).await.unwrap();

        let point = MetricPoint::new("cpu-load", Utc::now(), 42.0);
        assert_eq!(adapter.insert(&point).await, Status::Error);
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        let router = Router::new().route("/api/v1/query", get(|| async { "not json" }));
        let addr = serve(router).await;

        let mut adapter = connect(&config(addr.port())).await.unwrap();
        assert_eq!(adapter.read(&ReadQuery::new("cpu", Utc::now())).await, Status::Error);
        assert_eq!(
            adapter
                .scan(&ScanQuery::new("cpu", Utc::now() - Duration::minutes(1), Utc::now()))
                .await,
            Status::Error
        );
    }

    #[test]
    fn test_scan_uses_clock() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 10).unwrap();
        let protocol = VictoriaProtocol::new("http://vm:8428/api/v1/query", "http://vm:8428/write")
            .with_clock(Arc::new(FixedClock(now)));

        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let query = ScanQuery::new("cpu", from, from + Duration::seconds(60));
        let request = protocol.encode_scan(&query).unwrap();

        let expected = urlencoding::encode("min_over_time(cpu_value{}[60s] offset 10s)").into_owned();
        assert_eq!(
            request.url(),
            format!("http://vm:8428/api/v1/query?query={}", expected)
        );
    }

    #[tokio::test]
    async fn test_connect_urls() {
        let mut config = VictoriaConfig::default();
        config.connection.ip = Some("vm".to_string());
        config.connection.test = true;
        config.port = Some(8428);

        let adapter = connect(&config).await.unwrap();
        assert!(adapter.is_offline());
        assert_eq!(adapter.protocol().query_url(), "http://vm:8428/api/v1/query");
        assert_eq!(
            adapter.protocol().write_url(),
            "http://vm:8428/write?db=testdb&precision=ms"
        );
    }
}
