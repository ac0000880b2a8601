//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! Endpoint options are optional at parse time and resolved when an
//! adapter connects: a missing `ip` or port is fatal unless `test` is set,
//! in which case no network I/O happens and defaults are used for encoding.

use crate::model::Backend;
use crate::transport::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which backend to drive, with its endpoint options
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Akumuli(AkumuliConfig),
    Seriesly(SerieslyConfig),
    #[serde(rename = "victoriametrics", alias = "victoria")]
    VictoriaMetrics(VictoriaConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Akumuli(AkumuliConfig::default())
    }
}

impl BackendConfig {
    /// The backend this configuration targets
    pub fn kind(&self) -> Backend {
        match self {
            BackendConfig::Akumuli(_) => Backend::Akumuli,
            BackendConfig::Seriesly(_) => Backend::Seriesly,
            BackendConfig::VictoriaMetrics(_) => Backend::VictoriaMetrics,
        }
    }

    /// Options shared by every backend
    pub fn connection(&self) -> &ConnectionOptions {
        match self {
            BackendConfig::Akumuli(c) => &c.connection,
            BackendConfig::Seriesly(c) => &c.connection,
            BackendConfig::VictoriaMetrics(c) => &c.connection,
        }
    }

    /// Mutable access to the shared options
    pub fn connection_mut(&mut self) -> &mut ConnectionOptions {
        match self {
            BackendConfig::Akumuli(c) => &mut c.connection,
            BackendConfig::Seriesly(c) => &mut c.connection,
            BackendConfig::VictoriaMetrics(c) => &mut c.connection,
        }
    }

    /// Switch to another backend, keeping the shared options. Backend
    /// specific options start from their defaults.
    pub fn with_kind(self, kind: Backend) -> Self {
        if self.kind() == kind {
            return self;
        }

        let connection = self.connection().clone();
        match kind {
            Backend::Akumuli => BackendConfig::Akumuli(AkumuliConfig {
                connection,
                ..AkumuliConfig::default()
            }),
            Backend::Seriesly => BackendConfig::Seriesly(SerieslyConfig {
                connection,
                ..SerieslyConfig::default()
            }),
            Backend::VictoriaMetrics => BackendConfig::VictoriaMetrics(VictoriaConfig {
                connection,
                ..VictoriaConfig::default()
            }),
        }
    }

    /// Set the single HTTP port (Seriesly/VictoriaMetrics) or the HTTP query
    /// port (Akumuli)
    pub fn set_port(&mut self, port: u16) {
        match self {
            BackendConfig::Akumuli(c) => c.http_port = Some(port),
            BackendConfig::Seriesly(c) => c.port = Some(port),
            BackendConfig::VictoriaMetrics(c) => c.port = Some(port),
        }
    }
}

/// Options every backend understands
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionOptions {
    /// Backend host
    pub ip: Option<String>,

    /// Skip all network I/O and report success unconditionally
    #[serde(default)]
    pub test: bool,

    /// Extra attempts after a transient HTTP failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Log encoded requests and raw responses
    #[serde(default)]
    pub debug: bool,
}

fn default_retries() -> u32 {
    3
}

fn default_host() -> String {
    "localhost".to_string()
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            ip: None,
            test: false,
            retries: default_retries(),
            debug: false,
        }
    }
}

impl ConnectionOptions {
    /// Resolve the host, failing if it is missing outside test mode
    pub fn host(&self) -> Result<String, ConfigError> {
        match (&self.ip, self.test) {
            (Some(ip), _) => Ok(ip.clone()),
            (None, true) => Ok(default_host()),
            (None, false) => Err(ConfigError::MissingOption("ip")),
        }
    }

    /// Resolve a port option the same way as `host`
    pub fn port(
        &self,
        port: Option<u16>,
        name: &'static str,
        fallback: u16,
    ) -> Result<u16, ConfigError> {
        match (port, self.test) {
            (Some(port), _) => Ok(port),
            (None, true) => Ok(fallback),
            (None, false) => Err(ConfigError::MissingOption(name)),
        }
    }

    /// Retry policy for HTTP requests
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries)
    }
}

/// Akumuli: TCP ingestion server + HTTP query server
#[derive(Debug, Clone, Deserialize)]
pub struct AkumuliConfig {
    #[serde(flatten)]
    pub connection: ConnectionOptions,

    /// Ingestion (RESP-style) TCP port
    pub tcp_port: Option<u16>,

    /// HTTP query port
    pub http_port: Option<u16>,

    /// Path queries are POSTed to
    #[serde(default = "default_akumuli_query_path")]
    pub query_path: String,
}

fn default_akumuli_query_path() -> String {
    "/".to_string()
}

impl Default for AkumuliConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            tcp_port: None,
            http_port: None,
            query_path: default_akumuli_query_path(),
        }
    }
}

impl AkumuliConfig {
    pub fn tcp_port(&self) -> Result<u16, ConfigError> {
        self.connection.port(self.tcp_port, "tcp_port", 8282)
    }

    pub fn http_port(&self) -> Result<u16, ConfigError> {
        self.connection.port(self.http_port, "http_port", 8181)
    }
}

/// Seriesly: one HTTP port, one database
#[derive(Debug, Clone, Deserialize)]
pub struct SerieslyConfig {
    #[serde(flatten)]
    pub connection: ConnectionOptions,

    pub port: Option<u16>,

    /// Database created at init and used for every operation
    #[serde(default = "default_seriesly_db")]
    pub db_name: String,
}

fn default_seriesly_db() -> String {
    "TestDB".to_string()
}

impl Default for SerieslyConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            port: None,
            db_name: default_seriesly_db(),
        }
    }
}

impl SerieslyConfig {
    pub fn port(&self) -> Result<u16, ConfigError> {
        self.connection.port(self.port, "port", 3133)
    }
}

/// VictoriaMetrics: PromQL queries and Influx line-protocol writes on one port
#[derive(Debug, Clone, Deserialize)]
pub struct VictoriaConfig {
    #[serde(flatten)]
    pub connection: ConnectionOptions,

    pub port: Option<u16>,

    /// Influx database name sent with writes
    #[serde(default = "default_victoria_db")]
    pub db_name: String,

    /// Instant query endpoint
    #[serde(default = "default_victoria_query_path")]
    pub query_path: String,

    /// Influx line-protocol write endpoint
    #[serde(default = "default_victoria_write_path")]
    pub write_path: String,
}

fn default_victoria_db() -> String {
    "testdb".to_string()
}

fn default_victoria_query_path() -> String {
    "/api/v1/query".to_string()
}

fn default_victoria_write_path() -> String {
    "/write".to_string()
}

impl Default for VictoriaConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            port: None,
            db_name: default_victoria_db(),
            query_path: default_victoria_query_path(),
            write_path: default_victoria_write_path(),
        }
    }
}

impl VictoriaConfig {
    pub fn port(&self) -> Result<u16, ConfigError> {
        self.connection.port(self.port, "port", 8428)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tsbench").join("config.toml")),
            Some(PathBuf::from("/etc/tsbench/config.toml")),
            Some(PathBuf::from("./tsbench.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TSBENCH_*` overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Backend first, so the options below land on the selected variant
        if let Some(kind) = var("TSBENCH_BACKEND") {
            match Backend::from_str(&kind) {
                Some(kind) => self.backend = std::mem::take(&mut self.backend).with_kind(kind),
                None => tracing::warn!("Ignoring unknown TSBENCH_BACKEND {:?}", kind),
            }
        }

        if let Some(ip) = var("TSBENCH_IP") {
            self.backend.connection_mut().ip = Some(ip);
        }
        if let Some(port) = var("TSBENCH_PORT").and_then(|p| p.parse().ok()) {
            self.backend.set_port(port);
        }
        if let BackendConfig::Akumuli(akumuli) = &mut self.backend {
            if let Some(port) = var("TSBENCH_TCP_PORT").and_then(|p| p.parse().ok()) {
                akumuli.tcp_port = Some(port);
            }
            if let Some(port) = var("TSBENCH_HTTP_PORT").and_then(|p| p.parse().ok()) {
                akumuli.http_port = Some(port);
            }
        }
        if let Some(test) = var("TSBENCH_TEST").and_then(|t| t.parse().ok()) {
            self.backend.connection_mut().test = test;
        }

        if let Some(level) = var("TSBENCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TSBENCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Missing required option '{0}'")]
    MissingOption(&'static str),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# tsbench Configuration
#
# Environment variables override these settings:
# - TSBENCH_BACKEND (akumuli, seriesly, victoriametrics)
# - TSBENCH_IP
# - TSBENCH_PORT
# - TSBENCH_TCP_PORT / TSBENCH_HTTP_PORT (akumuli)
# - TSBENCH_TEST
# - TSBENCH_LOG_LEVEL
# - TSBENCH_LOG_FORMAT

[backend]
# Backend to drive: akumuli, seriesly or victoriametrics
kind = "akumuli"

# Backend host (required unless test = true)
ip = "localhost"

# Akumuli ingestion and query ports
tcp_port = 8282
http_port = 8181

# Seriesly / VictoriaMetrics use a single port instead:
# port = 3133

# Skip all network I/O and report success
test = false

# Extra attempts after a transient HTTP failure (no backoff)
retries = 3

# Log encoded requests and raw responses
debug = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        let BackendConfig::Akumuli(akumuli) = &config.backend else {
            panic!("expected akumuli backend");
        };
        assert_eq!(akumuli.connection.ip.as_deref(), Some("localhost"));
        assert_eq!(akumuli.tcp_port().unwrap(), 8282);
        assert_eq!(akumuli.http_port().unwrap(), 8181);
        assert_eq!(akumuli.connection.retries, 3);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_seriesly() {
        let config = Config::parse(
            r#"
            [backend]
            kind = "seriesly"
            ip = "10.0.0.5"
            port = 3133
            db_name = "bench"
            "#,
        )
        .unwrap();

        let BackendConfig::Seriesly(seriesly) = &config.backend else {
            panic!("expected seriesly backend");
        };
        assert_eq!(seriesly.connection.host().unwrap(), "10.0.0.5");
        assert_eq!(seriesly.port().unwrap(), 3133);
        assert_eq!(seriesly.db_name, "bench");
        assert!(!seriesly.connection.test);
    }

    #[test]
    fn test_parse_victoria_alias() {
        let config = Config::parse(
            r#"
            [backend]
            kind = "victoria"
            test = true
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.kind(), Backend::VictoriaMetrics);
    }

    #[test]
    fn test_missing_ip_is_fatal_outside_test_mode() {
        let config = AkumuliConfig::default();
        assert!(matches!(
            config.connection.host(),
            Err(ConfigError::MissingOption("ip"))
        ));
        assert!(matches!(
            config.tcp_port(),
            Err(ConfigError::MissingOption("tcp_port"))
        ));
    }

    #[test]
    fn test_test_mode_fills_defaults() {
        let mut config = SerieslyConfig::default();
        config.connection.test = true;
        assert_eq!(config.connection.host().unwrap(), "localhost");
        assert_eq!(config.port().unwrap(), 3133);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TSBENCH_BACKEND", "seriesly"),
            ("TSBENCH_IP", "db.local"),
            ("TSBENCH_PORT", "9999"),
            ("TSBENCH_TEST", "true"),
            ("TSBENCH_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.backend.connection_mut().retries = 7;
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        let BackendConfig::Seriesly(seriesly) = &config.backend else {
            panic!("expected seriesly backend");
        };
        assert_eq!(seriesly.connection.ip.as_deref(), Some("db.local"));
        assert_eq!(seriesly.port, Some(9999));
        assert_eq!(seriesly.connection.retries, 7);
        assert!(seriesly.connection.test);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[backend]\nkind = \"victoriametrics\"\nip = \"vm\"\nport = 8428\nretries = 1"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let BackendConfig::VictoriaMetrics(victoria) = &config.backend else {
            panic!("expected victoriametrics backend");
        };
        assert_eq!(victoria.port().unwrap(), 8428);
        assert_eq!(victoria.connection.retry_policy(), RetryPolicy::new(1));
        assert_eq!(victoria.query_path, "/api/v1/query");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/tsbench.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
