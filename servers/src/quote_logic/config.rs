use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use lib_common::markets::YahooQuoteSource;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "server_quotes.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid listen address {0}")]
    ListenAddr(String),

    #[error("broadcast period must be greater than zero")]
    ZeroPeriod,

    #[error("source timeout must be greater than zero")]
    ZeroTimeout,

    #[error("TLS needs both a certificate and a private key")]
    PartialTls,
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[command(about = "Stock quote WebSocket fan-out server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[arg(long, env = "QUOTES_HOST", help = "Interface to listen on.")]
    pub host: Option<String>,

    #[arg(long, env = "QUOTES_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[arg(long, env = "QUOTES_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "QUOTES_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "QUOTES_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "QUOTES_BROADCAST_PERIOD_MS", help = "Milliseconds between two broadcast ticks.")]
    pub broadcast_period_ms: Option<u64>,

    #[arg(long, env = "QUOTES_SOURCE_URL", help = "Base URL of the upstream quote API.")]
    pub source_url: Option<String>,

    #[arg(long, env = "QUOTES_SOURCE_TIMEOUT_SECS", help = "Timeout in seconds for one upstream quote request.")]
    pub source_timeout_secs: Option<u64>,

    #[arg(long, env = "TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    pub tls_cert_path: Option<PathBuf>,

    #[arg(long, env = "TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    pub tls_key_path: Option<PathBuf>,
}

/// Certificate chain and key for serving `wss://`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub broadcast_period: Duration,
    pub source_url: String,
    pub source_timeout: Duration,
    pub tls: Option<TlsPaths>,
}

impl Config {
    pub fn defaults() -> Config {
        Config {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            broadcast_period_ms: Some(1000),
            source_url: Some(YahooQuoteSource::DEFAULT_BASE_URL.to_string()),
            source_timeout_secs: Some(10),
            ..Default::default()
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            broadcast_period_ms: other.broadcast_period_ms.or(self.broadcast_period_ms),
            source_url: other.source_url.or(self.source_url),
            source_timeout_secs: other.source_timeout_secs.or(self.source_timeout_secs),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
        }
    }

    /// Turns a merged config into settings; any field still unset takes its default.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let cfg = Config::defaults().merge(self);

        let host = cfg.host.unwrap_or_default();
        let port = cfg.port.unwrap_or_default();
        let listen = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let listen_addr = listen
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::ListenAddr(listen))?;

        let period_ms = cfg.broadcast_period_ms.unwrap_or_default();
        if period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        let timeout_secs = cfg.source_timeout_secs.unwrap_or_default();
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let tls = match (cfg.tls_cert_path, cfg.tls_key_path) {
            (Some(cert_path), Some(key_path)) => Some(TlsPaths { cert_path, key_path }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(Settings {
            listen_addr,
            log_dir: cfg.log_dir.unwrap_or_default(),
            log_level: cfg.log_level.unwrap_or_default(),
            broadcast_period: Duration::from_millis(period_ms),
            source_url: cfg.source_url.unwrap_or_default(),
            source_timeout: Duration::from_secs(timeout_secs),
            tls,
        })
    }
}

/// Defaults, then the config file, then environment variables and CLI flags.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_from(Config::parse())
}

/// `load_config` with the CLI/env layer supplied by the caller.
pub fn load_from(cli: Config) -> Result<Settings, ConfigError> {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path)? {
        current_config = current_config.merge(file_config);
    }

    current_config.merge(cli).resolve()
}

// A missing file is not an error; an unreadable or malformed one is.
fn read_config_file(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file_config = serde_json::from_str::<Config>(&config_str).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(file_config))
}
