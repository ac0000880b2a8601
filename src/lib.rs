//! # tsbench
//!
//! Benchmark adapters that let one workload driver exercise several
//! time-series databases through their native wire protocols.
//!
//! ## Features
//!
//! - **One operation model**: `insert`, `read` and `scan` over metric, tags,
//!   timestamp and value, whatever the backend
//! - **Three backends**: Akumuli, Seriesly and VictoriaMetrics
//! - **Capability mapping**: aggregations and bucket sizes a backend lacks
//!   are substituted, never silently dropped
//! - **Verification**: every reply is checked against the request that
//!   produced it
//!
//! ## Modules
//!
//! - [`model`]: canonical points, queries and status codes
//! - [`time`]: timestamp encodings and bucket arithmetic
//! - [`aggregation`]: aggregation primitives per backend
//! - [`transport`]: HTTP and TCP transports with bounded retry
//! - [`backends`]: the adapters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsbench::config::{BackendConfig, ConnectionOptions, SerieslyConfig};
//! use tsbench::model::{MetricPoint, ReadQuery, TagFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BackendConfig::Seriesly(SerieslyConfig {
//!         connection: ConnectionOptions {
//!             ip: Some("localhost".to_string()),
//!             ..ConnectionOptions::default()
//!         },
//!         port: Some(3133),
//!         ..SerieslyConfig::default()
//!     });
//!
//!     let mut adapter = tsbench::connect(&config).await?;
//!
//!     let now = chrono::Utc::now();
//!     adapter.insert(&MetricPoint::new("cpu", now, 42.0).tag("host", "a")).await;
//!
//!     let query = ReadQuery::new("cpu", now).tags(TagFilter::new().with("host", ["a"]));
//!     println!("read status: {}", adapter.read(&query).await.code());
//!
//!     adapter.cleanup().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod backends;
pub mod config;
pub mod error;
pub mod model;
pub mod time;
pub mod transport;

// Re-export top-level types for convenience
pub use backends::{connect, Adapter, InsertPayload, TsdbAdapter, WireProtocol};

pub use config::{BackendConfig, Config, ConfigError, ConnectionOptions, LoggingConfig};

pub use error::{AdapterError, AdapterResult};

pub use model::{
    AggregationKind, AggregationSpec, Backend, Bucket, MetricPoint, Outcome, ReadQuery,
    ScanQuery, Status, TagFilter, TagSet, TimeRange,
};

pub use time::{Clock, FixedClock, SystemClock, TimeUnit};

pub use transport::{HttpReply, HttpRequest, HttpTransport, RetryPolicy, TransportError};
