//! tsbench CLI
//!
//! Run single adapter operations against a configured backend:
//! - Insert a point
//! - Read a point back
//! - Scan a range with aggregation
//! - Print a default config file
//!
//! Prints the adapter status code (`0` or `-1`) and exits non-zero on `-1`.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsbench::config::{generate_default_config, Config, LoggingConfig};
use tsbench::{
    AggregationKind, AggregationSpec, Backend, MetricPoint, ReadQuery, ScanQuery, Status,
    TagFilter, TimeUnit,
};

#[derive(Parser)]
#[command(name = "tsbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive time-series databases through benchmark adapters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: searched in the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to use (akumuli, seriesly, victoriametrics), overrides the config
    #[arg(short, long, global = true)]
    pub backend: Option<String>,

    /// Encode requests without sending them
    #[arg(long, global = true)]
    pub test: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert one point
    Insert {
        metric: String,
        value: f64,
        /// Timestamp: "now", RFC 3339, or Unix milliseconds (default: now)
        #[arg(short, long)]
        time: Option<String>,
        /// Tags in key=value format
        #[arg(short = 'T', long)]
        tag: Vec<String>,
    },

    /// Read one point back
    Read {
        metric: String,
        /// Timestamp: "now", RFC 3339, or Unix milliseconds
        #[arg(short, long)]
        time: String,
        /// Tag filters in key=value1,value2 format
        #[arg(short = 'T', long)]
        tag: Vec<String>,
    },

    /// Aggregate over a time range
    Scan {
        metric: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Tag filters in key=value1,value2 format
        #[arg(short = 'T', long)]
        tag: Vec<String>,
        /// Aggregation (none, avg, count, sum)
        #[arg(short, long, default_value = "none")]
        aggregation: String,
        /// Bucket size, e.g. 5m or 250ms (default: one bucket for the range)
        #[arg(long)]
        bucket: Option<String>,
    },

    /// Print a default config file
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        print!("{}", generate_default_config());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(kind) = &cli.backend {
        let kind = Backend::from_str(kind).ok_or_else(|| anyhow!("unknown backend {:?}", kind))?;
        config.backend = config.backend.with_kind(kind);
    }
    if cli.test {
        config.backend.connection_mut().test = true;
    }

    init_logging(&config.logging);
    tracing::info!("tsbench v{} using {}", env!("CARGO_PKG_VERSION"), config.backend.kind());

    let mut adapter = tsbench::connect(&config.backend)
        .await
        .context("failed to initialise adapter")?;

    let status = match cli.command {
        Commands::Insert {
            metric,
            value,
            time,
            tag,
        } => {
            let at = match time {
                Some(time) => parse_time(&time)?,
                None => Utc::now(),
            };
            let mut point = MetricPoint::new(metric, at, value);
            for pair in &tag {
                let (key, value) = split_pair(pair)?;
                point = point.tag(key, value);
            }
            adapter.insert(&point).await
        }
        Commands::Read { metric, time, tag } => {
            let query = ReadQuery::new(metric, parse_time(&time)?).tags(parse_filter(&tag)?);
            adapter.read(&query).await
        }
        Commands::Scan {
            metric,
            from,
            to,
            tag,
            aggregation,
            bucket,
        } => {
            let kind = AggregationKind::from_str(&aggregation)
                .ok_or_else(|| anyhow!("unknown aggregation {:?}", aggregation))?;
            let mut spec = AggregationSpec::new(kind);
            if let Some(bucket) = bucket {
                let (value, unit) = parse_bucket(&bucket)?;
                spec = spec.bucket(value, unit);
            }

            let query = ScanQuery::new(metric, parse_time(&from)?, parse_time(&to)?)
                .tags(parse_filter(&tag)?)
                .aggregation(spec);
            adapter.scan(&query).await
        }
        // Printed before connecting
        Commands::Config => Status::Ok,
    };

    adapter.cleanup().await?;

    println!("{}", status.code());
    Ok(match status {
        Status::Ok => ExitCode::SUCCESS,
        Status::Error => ExitCode::FAILURE,
    })
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("tsbench={}", logging.level).into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// "now", RFC 3339, or Unix milliseconds
fn parse_time(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if s == "now" {
        return Ok(Utc::now());
    }
    if let Ok(ms) = s.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| anyhow!("timestamp {} out of range", ms));
    }
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp {:?}", s))?
        .with_timezone(&Utc))
}

fn split_pair(pair: &str) -> anyhow::Result<(&str, &str)> {
    pair.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| anyhow!("expected key=value, got {:?}", pair))
}

/// Repeated `key=v1,v2` arguments
fn parse_filter(pairs: &[String]) -> anyhow::Result<TagFilter> {
    let mut filter = TagFilter::new();
    for pair in pairs {
        let (key, values) = split_pair(pair)?;
        filter = filter.with(key, values.split(',').filter(|v| !v.is_empty()));
    }
    Ok(filter)
}

/// `5m`, `250ms`, `1d`
fn parse_bucket(s: &str) -> anyhow::Result<(u64, TimeUnit)> {
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow!("bucket {:?} has no unit", s))?;
    let (value, unit) = s.split_at(split);

    if value.is_empty() {
        bail!("bucket {:?} has no size", s);
    }
    let unit = TimeUnit::from_str(unit).ok_or_else(|| anyhow!("unknown unit {:?}", unit))?;
    Ok((value.parse()?, unit))
}
