//! Backend Adapters
//!
//! One adapter per storage backend, each translating the canonical
//! `insert`/`read`/`scan` model onto its wire protocol:
//! - Akumuli (TCP ingestion frames + JSON queries answered in CSV)
//! - Seriesly (JSON documents over HTTP)
//! - VictoriaMetrics (Influx line-protocol writes + PromQL queries)
//!
//! The per-backend part is a `WireProtocol`: pure request encoders and
//! response verifiers with no I/O. `Adapter` owns the transports and runs
//! every operation through the same encode → send → verify pipeline.

pub mod akumuli;
pub mod seriesly;
pub mod victoria;

pub use akumuli::AkumuliProtocol;
pub use seriesly::SerieslyProtocol;
pub use victoria::VictoriaProtocol;

use crate::config::BackendConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::model::{Backend, MetricPoint, Outcome, ReadQuery, ScanQuery, Status};
use crate::transport::{HttpReply, HttpRequest, HttpTransport, IngestStream};
use async_trait::async_trait;

/// Operations the workload driver calls on one adapter instance.
///
/// An instance belongs to a single worker; methods take `&mut self` and are
/// never called concurrently. Every failure collapses to `Status::Error`.
#[async_trait]
pub trait TsdbAdapter: Send {
    /// Backend this adapter talks to
    fn backend(&self) -> Backend;

    /// Write one point
    async fn insert(&mut self, point: &MetricPoint) -> Status;

    /// Exact-match lookup of one metric at one timestamp
    async fn read(&mut self, query: &ReadQuery) -> Status;

    /// Aggregated range query
    async fn scan(&mut self, query: &ScanQuery) -> Status;

    /// Release transport resources. Calling it again is a no-op.
    ///
    /// Only the Akumuli ingestion socket is shut down here; inserts fail
    /// afterwards. The pooled HTTP client is released when the adapter is
    /// dropped, so queries keep working until then.
    async fn cleanup(&mut self) -> AdapterResult<()>;
}

/// Encoded form of an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPayload {
    /// Sent over HTTP and verified by `WireProtocol::verify_insert`
    Http(HttpRequest),
    /// Written to the ingestion stream, never acknowledged
    Frame(String),
}

/// Request encoders and response verifiers for one backend
pub trait WireProtocol: Send + Sync {
    fn backend(&self) -> Backend;

    fn encode_read(&self, query: &ReadQuery) -> AdapterResult<HttpRequest>;

    fn encode_scan(&self, query: &ScanQuery) -> AdapterResult<HttpRequest>;

    fn encode_insert(&self, point: &MetricPoint) -> AdapterResult<InsertPayload>;

    fn verify_read(&self, query: &ReadQuery, reply: &HttpReply) -> Outcome;

    fn verify_scan(&self, query: &ScanQuery, reply: &HttpReply) -> Outcome;

    /// HTTP inserts succeed on any 2xx unless a backend is stricter
    fn verify_insert(&self, reply: &HttpReply) -> Outcome {
        if reply.status.is_success() {
            Outcome::Found
        } else {
            Outcome::Rejected(format!("insert answered with {}", reply.status))
        }
    }
}

/// The three adapter operations, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Read,
    Scan,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "insert"),
            Operation::Read => write!(f, "read"),
            Operation::Scan => write!(f, "scan"),
        }
    }
}

/// Open connections of a live (non-test) adapter
pub struct Link {
    pub http: HttpTransport,
    pub ingest: Option<IngestStream>,
}

/// Adapter driving one backend through its `WireProtocol`.
///
/// Without a `Link` the adapter runs in test mode: requests are encoded
/// (and logged when debugging) but nothing is sent and every call succeeds.
pub struct Adapter<P> {
    protocol: P,
    link: Option<Link>,
    debug: bool,
}

impl<P: WireProtocol> Adapter<P> {
    /// Adapter that talks to a live backend
    pub fn new(protocol: P, link: Link, debug: bool) -> Self {
        Self {
            protocol,
            link: Some(link),
            debug,
        }
    }

    /// Adapter that performs no network I/O
    pub fn offline(protocol: P, debug: bool) -> Self {
        Self {
            protocol,
            link: None,
            debug,
        }
    }

    /// The wire protocol in use
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Whether the adapter skips all network I/O
    pub fn is_offline(&self) -> bool {
        self.link.is_none()
    }

    fn trace_request(&self, op: Operation, request: &dyn std::fmt::Display) {
        if self.debug {
            tracing::info!("{} {} request: {}", self.protocol.backend(), op, request);
        } else {
            tracing::trace!("{} {} request: {}", self.protocol.backend(), op, request);
        }
    }

    fn trace_reply(&self, op: Operation, reply: &HttpReply) {
        if self.debug {
            tracing::info!(
                "{} {} response ({}): {}",
                self.protocol.backend(),
                op,
                reply.status,
                reply.body
            );
        } else {
            tracing::trace!(
                "{} {} response ({}): {}",
                self.protocol.backend(),
                op,
                reply.status,
                reply.body
            );
        }
    }

    /// Send `request` unless offline. `None` means nothing was sent.
    async fn exchange(
        &self,
        op: Operation,
        request: &HttpRequest,
    ) -> AdapterResult<Option<HttpReply>> {
        self.trace_request(op, request);

        let Some(link) = &self.link else {
            return Ok(None);
        };

        let reply = link.http.send(request).await?;
        self.trace_reply(op, &reply);
        Ok(Some(reply))
    }

    fn fail(&self, op: Operation, metric: &str, error: AdapterError) -> Status {
        tracing::error!(
            "{} {} of metric {:?} failed: {}",
            self.protocol.backend(),
            op,
            metric,
            error
        );
        Status::Error
    }
}

/// Log a verifier's conclusion and collapse it to a status.
///
/// A scan that finds nothing is a normal outcome and only logged at debug
/// level.
pub fn conclude(backend: Backend, op: Operation, metric: &str, outcome: &Outcome) -> Status {
    match outcome {
        Outcome::Found => {
            tracing::debug!("{} {} of metric {:?} succeeded", backend, op, metric);
        }
        Outcome::NotFound if op == Operation::Scan => {
            tracing::debug!("{} {}: no data for metric {:?}", backend, op, metric);
        }
        Outcome::NotFound => {
            tracing::warn!("{} {}: no value found for metric {:?}", backend, op, metric);
        }
        Outcome::Rejected(reason) => {
            tracing::error!(
                "{} {} of metric {:?} rejected: {}",
                backend,
                op,
                metric,
                reason
            );
        }
        Outcome::Malformed(reason) => {
            tracing::error!(
                "{} {} of metric {:?}: malformed response: {}",
                backend,
                op,
                metric,
                reason
            );
        }
    }
    outcome.status()
}

#[async_trait]
impl<P: WireProtocol> TsdbAdapter for Adapter<P> {
    fn backend(&self) -> Backend {
        self.protocol.backend()
    }

    async fn insert(&mut self, point: &MetricPoint) -> Status {
        let op = Operation::Insert;
        if point.metric.is_empty() {
            return self.fail(op, "", empty_metric());
        }

        let payload = match self.protocol.encode_insert(point) {
            Ok(payload) => payload,
            Err(e) => return self.fail(op, &point.metric, e),
        };

        match payload {
            InsertPayload::Http(request) => match self.exchange(op, &request).await {
                Ok(Some(reply)) => {
                    let outcome = self.protocol.verify_insert(&reply);
                    conclude(self.backend(), op, &point.metric, &outcome)
                }
                Ok(None) => Status::Ok,
                Err(e) => self.fail(op, &point.metric, e),
            },
            InsertPayload::Frame(frame) => {
                self.trace_request(op, &frame.escape_debug());

                let Some(link) = self.link.as_mut() else {
                    return Status::Ok;
                };
                let Some(stream) = link.ingest.as_mut() else {
                    let e = AdapterError::Init("no ingestion connection".to_string());
                    return self.fail(op, &point.metric, e);
                };

                // Fire-and-forget: a written frame counts as success
                match stream.send(frame.as_bytes()).await {
                    Ok(()) => Status::Ok,
                    Err(e) => self.fail(op, &point.metric, e.into()),
                }
            }
        }
    }

    async fn read(&mut self, query: &ReadQuery) -> Status {
        let op = Operation::Read;
        if query.metric.is_empty() {
            return self.fail(op, "", empty_metric());
        }

        let request = match self.protocol.encode_read(query) {
            Ok(request) => request,
            Err(e) => return self.fail(op, &query.metric, e),
        };

        match self.exchange(op, &request).await {
            Ok(Some(reply)) => {
                let outcome = self.protocol.verify_read(query, &reply);
                conclude(self.backend(), op, &query.metric, &outcome)
            }
            Ok(None) => Status::Ok,
            Err(e) => self.fail(op, &query.metric, e),
        }
    }

    async fn scan(&mut self, query: &ScanQuery) -> Status {
        let op = Operation::Scan;
        if query.metric.is_empty() {
            return self.fail(op, "", empty_metric());
        }
        if query.range.is_inverted() {
            let e = AdapterError::InvalidInput(format!(
                "scan range starts at {} after it ends at {}",
                query.range.from, query.range.to
            ));
            return self.fail(op, &query.metric, e);
        }

        let request = match self.protocol.encode_scan(query) {
            Ok(request) => request,
            Err(e) => return self.fail(op, &query.metric, e),
        };

        match self.exchange(op, &request).await {
            Ok(Some(reply)) => {
                let outcome = self.protocol.verify_scan(query, &reply);
                conclude(self.backend(), op, &query.metric, &outcome)
            }
            Ok(None) => Status::Ok,
            Err(e) => self.fail(op, &query.metric, e),
        }
    }

    async fn cleanup(&mut self) -> AdapterResult<()> {
        if let Some(ingest) = self.link.as_mut().and_then(|link| link.ingest.as_mut()) {
            ingest.close().await?;
        }
        tracing::debug!("{} adapter cleaned up", self.backend());
        Ok(())
    }
}

fn empty_metric() -> AdapterError {
    AdapterError::InvalidInput("metric name is empty".to_string())
}

/// Reject values no backend can store
pub(crate) fn ensure_finite(point: &MetricPoint) -> AdapterResult<()> {
    if point.value.is_finite() {
        Ok(())
    } else {
        Err(AdapterError::InvalidInput(format!(
            "value {} of metric {:?} is not a finite number",
            point.value, point.metric
        )))
    }
}

/// `http://host:port/path`, tolerating a path without leading slash
pub(crate) fn endpoint(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}/{}", host, port, path.trim_start_matches('/'))
}

/// Build an adapter for the configured backend.
///
/// Fails if a required endpoint option is missing outside test mode, or if
/// the backend refuses initialisation.
pub async fn connect(config: &BackendConfig) -> AdapterResult<Box<dyn TsdbAdapter>> {
    let adapter: Box<dyn TsdbAdapter> = match config {
        BackendConfig::Akumuli(c) => Box::new(akumuli::connect(c).await?),
        BackendConfig::Seriesly(c) => Box::new(seriesly::connect(c).await?),
        BackendConfig::VictoriaMetrics(c) => Box::new(victoria::connect(c).await?),
    };

    tracing::info!(
        "Connected {} adapter{}",
        adapter.backend(),
        if config.connection().test { " (test mode)" } else { "" }
    );
    Ok(adapter)
}

/// Fake backends served from a local port
#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its address
    pub async fn serve(router: Router) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }
}
