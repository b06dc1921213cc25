//! Configuration management for Razcep.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{MAX_FLOWS, SEND_RANGE_WIDTH};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Splitter configuration.
    #[serde(default)]
    pub splitter: SplitterConfig,

    /// Weight ingestion configuration.
    #[serde(default)]
    pub weights: WeightsConfig,

    /// Queue transport configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    ///
    /// Parse only; call [`Config::validate`] after command-line overrides
    /// have been applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.splitter.self_addr.is_none() {
            return Err(Error::InvalidConfig(
                "No self address given (--self-ip)".into(),
            ));
        }
        if self.splitter.self_addr == Some(Ipv4Addr::UNSPECIFIED) {
            return Err(Error::InvalidConfig(
                "Self address must not be 0.0.0.0".into(),
            ));
        }

        let recv_base = self.splitter.recv_base_port as usize;
        let send_base = self.splitter.send_base_port as usize;

        if recv_base == 0 || send_base == 0 {
            return Err(Error::InvalidConfig("Base ports must be nonzero".into()));
        }
        if recv_base + MAX_FLOWS >= send_base {
            return Err(Error::InvalidConfig(format!(
                "Send and receive ranges overlap: send base must be > receive base + {MAX_FLOWS}"
            )));
        }
        if send_base + SEND_RANGE_WIDTH > 65535 {
            return Err(Error::InvalidConfig(format!(
                "Send range exceeds the port space: send base must be <= {}",
                65535 - SEND_RANGE_WIDTH
            )));
        }

        if self.weights.file.is_none() {
            return Err(Error::InvalidConfig(
                "No weight file given (--weight-file)".into(),
            ));
        }
        if self.weights.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "Weight poll interval must be nonzero".into(),
            ));
        }

        Ok(())
    }
}

/// Splitter configuration: addresses and port ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// IPv4 address of this host. Packets sourced from it are outbound;
    /// everything else is inbound.
    pub self_addr: Option<Ipv4Addr>,

    /// First port of the receive range (one port per remote peer).
    #[serde(default = "default_recv_base")]
    pub recv_base_port: u16,

    /// First port of the managed send range (canonical + tunnel ports).
    #[serde(default = "default_send_base")]
    pub send_base_port: u16,

    /// Recompute TCP/UDP checksums after a rewrite. When disabled the
    /// checksum field is left zeroed for downstream offload.
    #[serde(default)]
    pub compute_checksums: bool,
}

fn default_recv_base() -> u16 {
    10000
}
fn default_send_base() -> u16 {
    20000
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            self_addr: None,
            recv_base_port: default_recv_base(),
            send_base_port: default_send_base(),
            compute_checksums: false,
        }
    }
}

/// Weight ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    /// Path the controller writes weight specifications to. The file is
    /// read and deleted on consumption.
    pub file: Option<PathBuf>,

    /// How often to poll for a new weight file.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            file: None,
            poll_interval: default_poll_interval(),
        }
    }
}

/// Queue transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// NFQUEUE queue number to bind.
    #[serde(default = "default_queue_num")]
    pub queue_num: u16,

    /// Kernel-side queue depth before packets are dropped.
    #[serde(default = "default_queue_max_len")]
    pub max_len: u32,

    /// Raise process priority at startup to keep up with the queue.
    #[serde(default = "default_raise_priority")]
    pub raise_priority: bool,
}

fn default_queue_num() -> u16 {
    58
}
fn default_queue_max_len() -> u32 {
    65536
}
fn default_raise_priority() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_num: default_queue_num(),
            max_len: default_queue_max_len(),
            raise_priority: default_raise_priority(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
