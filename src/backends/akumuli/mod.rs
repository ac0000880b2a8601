//! Akumuli adapter
//!
//! Writes go to the TCP ingestion port and are never acknowledged, so an
//! insert succeeds once its frame is on the socket. Reads and scans are
//! JSON queries against the HTTP port, answered in CSV.

mod request;
mod response;

pub use request::{insert_frame, read_body, scan_body, QueryBody};
pub use response::{verify_read, verify_scan};

use super::{endpoint, Adapter, InsertPayload, Link, WireProtocol};
use crate::config::AkumuliConfig;
use crate::error::AdapterResult;
use crate::model::{Backend, MetricPoint, Outcome, ReadQuery, ScanQuery};
use crate::time::akumuli_timestamp;
use crate::transport::{HttpReply, HttpRequest, HttpTransport, IngestStream};

/// Akumuli wire protocol
#[derive(Debug, Clone)]
pub struct AkumuliProtocol {
    query_url: String,
}

impl AkumuliProtocol {
    pub fn new(query_url: impl Into<String>) -> Self {
        Self {
            query_url: query_url.into(),
        }
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    fn query(&self, body: String) -> HttpRequest {
        HttpRequest::Post {
            url: self.query_url.clone(),
            body,
            content_type: "application/json",
        }
    }
}

impl WireProtocol for AkumuliProtocol {
    fn backend(&self) -> Backend {
        Backend::Akumuli
    }

    fn encode_read(&self, query: &ReadQuery) -> AdapterResult<HttpRequest> {
        Ok(self.query(read_body(query)?))
    }

    fn encode_scan(&self, query: &ScanQuery) -> AdapterResult<HttpRequest> {
        Ok(self.query(scan_body(query)?))
    }

    fn encode_insert(&self, point: &MetricPoint) -> AdapterResult<InsertPayload> {
        Ok(InsertPayload::Frame(insert_frame(point)?))
    }

    fn verify_read(&self, query: &ReadQuery, reply: &HttpReply) -> Outcome {
        verify_read(&akumuli_timestamp(query.timestamp), reply)
    }

    fn verify_scan(&self, _query: &ScanQuery, reply: &HttpReply) -> Outcome {
        verify_scan(reply)
    }
}

/// Open the ingestion socket and the query client
pub async fn connect(config: &AkumuliConfig) -> AdapterResult<Adapter<AkumuliProtocol>> {
    let options = &config.connection;
    let host = options.host()?;
    let tcp_port = config.tcp_port()?;
    let http_port = config.http_port()?;

    let protocol = AkumuliProtocol::new(endpoint(&host, http_port, &config.query_path));

    if options.test {
        return Ok(Adapter::offline(protocol, options.debug));
    }

    let ingest = IngestStream::connect(&format!("{}:{}", host, tcp_port)).await?;
    let http = HttpTransport::new(options.retry_policy())?;

    tracing::debug!(
        "Akumuli ingestion at {}, queries at {}",
        ingest.peer(),
        protocol.query_url()
    );

    Ok(Adapter::new(
        protocol,
        Link {
            http,
            ingest: Some(ingest),
        },
        options.debug,
    ))
}
