//! Server configuration and the demo binary's command line.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use folio_core::{QueryConfig, UnknownFieldPolicy, WindowConfig};

use crate::logging::LogFormat;
use crate::network::NetworkConfig;

/// Everything needed to run the HTTP binding over one collection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub query: QueryConfig,
    /// Upper bound on a single adapter call.
    pub source_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            query: QueryConfig::default(),
            source_timeout: Duration::from_secs(5),
        }
    }
}

/// Folio demo: serves a paginated, filterable collection over HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "folio-demo")]
#[command(version, about, long_about = None)]
pub struct DemoArgs {
    /// Bind address
    #[arg(long, env = "FOLIO_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "FOLIO_PORT", default_value_t = 8080)]
    pub port: u16,

    /// JSON file with an array of documents; the built-in catalog is used when absent
    #[arg(long, env = "FOLIO_SEED")]
    pub seed: Option<PathBuf>,

    /// JSON file describing the allow-list schema; required together with --seed
    #[arg(long, env = "FOLIO_SCHEMA", requires = "seed")]
    pub schema: Option<PathBuf>,

    /// Largest page size a caller may request
    #[arg(long, env = "FOLIO_MAX_PAGE_SIZE", default_value_t = 100)]
    pub max_page_size: u32,

    /// Page size used when the request omits one
    #[arg(long, env = "FOLIO_DEFAULT_PAGE_SIZE", default_value_t = 20)]
    pub default_page_size: u32,

    /// Reject filter parameters that are not in the allow-list
    #[arg(long, env = "FOLIO_REJECT_UNKNOWN")]
    pub reject_unknown: bool,

    /// Timeout for each data source call, in milliseconds
    #[arg(long, env = "FOLIO_SOURCE_TIMEOUT_MS", default_value_t = 5_000)]
    pub source_timeout_ms: u64,

    /// Timeout for a whole HTTP request, in seconds
    #[arg(long, env = "FOLIO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log line format
    #[arg(long, env = "FOLIO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl DemoArgs {
    /// Folds the arguments over [`ServerConfig::default`].
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            network: NetworkConfig {
                host: self.host.clone(),
                port: self.port,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                ..defaults.network
            },
            query: QueryConfig {
                window: WindowConfig {
                    max_page_size: self.max_page_size,
                    default_page_size: self.default_page_size,
                },
                unknown_fields: if self.reject_unknown {
                    UnknownFieldPolicy::Reject
                } else {
                    UnknownFieldPolicy::Ignore
                },
                ..defaults.query
            },
            source_timeout: Duration::from_millis(self.source_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config() {
        let args = DemoArgs::try_parse_from(["folio-demo"]).unwrap();
        let config = args.server_config();
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.network.port, 8080);
        assert_eq!(config.query, QueryConfig::default());
        assert_eq!(config.source_timeout, Duration::from_secs(5));
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn flags_override_defaults() {
        let args = DemoArgs::try_parse_from([
            "folio-demo",
            "--port",
            "0",
            "--max-page-size",
            "50",
            "--default-page-size",
            "10",
            "--reject-unknown",
            "--source-timeout-ms",
            "250",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = args.server_config();
        assert_eq!(config.network.port, 0);
        assert_eq!(config.query.window.max_page_size, 50);
        assert_eq!(config.query.window.default_page_size, 10);
        assert_eq!(config.query.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.source_timeout, Duration::from_millis(250));
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn schema_requires_seed() {
        assert!(DemoArgs::try_parse_from(["folio-demo", "--schema", "s.json"]).is_err());
    }
}
