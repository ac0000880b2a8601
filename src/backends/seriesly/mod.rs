//! Seriesly adapter
//!
//! A JSON document store with time-keyed documents. The database is created
//! when the adapter connects. Tag filters cannot be expressed in its query
//! language, so reads and scans match on the metric name only.

mod request;
mod response;

pub use request::{insert_request, read_url, scan_url, Document, METRIC_FIELD, VALUE_FIELD};
pub use response::{verify_insert, verify_read, verify_scan};

use super::{endpoint, Adapter, InsertPayload, Link, WireProtocol};
use crate::config::SerieslyConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::model::{Backend, MetricPoint, Outcome, ReadQuery, ScanQuery};
use crate::time::epoch_millis;
use crate::transport::{HttpReply, HttpRequest, HttpTransport};

/// Seriesly wire protocol bound to one database URL
#[derive(Debug, Clone)]
pub struct SerieslyProtocol {
    db_url: String,
}

impl SerieslyProtocol {
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
        }
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }
}

impl WireProtocol for SerieslyProtocol {
    fn backend(&self) -> Backend {
        Backend::Seriesly
    }

    fn encode_read(&self, query: &ReadQuery) -> AdapterResult<HttpRequest> {
        Ok(HttpRequest::Get {
            url: read_url(&self.db_url, query),
        })
    }

    fn encode_scan(&self, query: &ScanQuery) -> AdapterResult<HttpRequest> {
        Ok(HttpRequest::Get {
            url: scan_url(&self.db_url, query),
        })
    }

    fn encode_insert(&self, point: &MetricPoint) -> AdapterResult<InsertPayload> {
        let (url, body) = insert_request(&self.db_url, point)?;
        Ok(InsertPayload::Http(HttpRequest::Post {
            url,
            body,
            content_type: "application/json",
        }))
    }

    fn verify_read(&self, query: &ReadQuery, reply: &HttpReply) -> Outcome {
        verify_read(epoch_millis(query.timestamp), reply)
    }

    fn verify_scan(&self, _query: &ScanQuery, reply: &HttpReply) -> Outcome {
        verify_scan(reply)
    }

    fn verify_insert(&self, reply: &HttpReply) -> Outcome {
        verify_insert(reply)
    }
}

/// Create the database and return an adapter bound to it
pub async fn connect(config: &SerieslyConfig) -> AdapterResult<Adapter<SerieslyProtocol>> {
    let options = &config.connection;
    let host = options.host()?;
    let port = config.port()?;

    let protocol = SerieslyProtocol::new(endpoint(&host, port, &config.db_name));

    if options.test {
        return Ok(Adapter::offline(protocol, options.debug));
    }

    let http = HttpTransport::new(options.retry_policy())?;
    let reply = http.put(protocol.db_url()).await?;
    if !reply.status.is_success() {
        return Err(AdapterError::Init(format!(
            "creating database {} answered {}",
            protocol.db_url(),
            reply.status
        )));
    }

    tracing::debug!("Seriesly database ready at {}", protocol.db_url());

    Ok(Adapter::new(
        protocol,
        Link { http, ingest: None },
        options.debug,
    ))
}
