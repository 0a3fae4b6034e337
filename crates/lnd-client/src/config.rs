//! Client configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `LND_` (`LND_HOST`, `LND_PORT`,
//!    `LND_TLS_CERT_PATH`, `LND_MACAROON_PATH`, ...)
//!
//! # Example
//! ```no_run
//! use lnd_client::config::LndConfig;
//!
//! let config = LndConfig::load_from("lnd.toml")?;
//! config.validate()?;
//! let params = config.connection_params()?;
//! # Ok::<(), lnd_client::ClientError>(())
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::connection::{ChannelOptions, ConnectionParams, DEFAULT_GRPC_PORT, DEFAULT_HOST};
use crate::credentials::{Macaroon, TlsCertificate};
use crate::error::{ClientError, Result};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "LND_";

/// Connection and logging settings for one daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LndConfig {
    /// Daemon host
    #[serde(default = "default_host")]
    pub host: String,
    /// Daemon gRPC port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to the daemon's `tls.cert`
    pub tls_cert_path: PathBuf,
    /// Path to a binary `.macaroon` file
    pub macaroon_path: PathBuf,
    /// Outgoing message limit in bytes (unset = transport default)
    #[serde(default)]
    pub max_send_message_length: Option<usize>,
    /// Incoming message limit in bytes (unset = transport default)
    #[serde(default)]
    pub max_receive_message_length: Option<usize>,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_GRPC_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LndConfig {
    /// Creates a configuration with defaults for everything but the
    /// credential paths.
    #[must_use]
    pub fn new(tls_cert_path: impl Into<PathBuf>, macaroon_path: impl Into<PathBuf>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls_cert_path: tls_cert_path.into(),
            macaroon_path: macaroon_path.into(),
            max_send_message_length: None,
            max_receive_message_length: None,
            log_level: default_log_level(),
        }
    }

    /// Load configuration from a TOML file and `LND_*` environment variables.
    ///
    /// A missing file is not an error; every field can come from the
    /// environment instead.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::figment(path).extract().map_err(ClientError::from)
    }

    /// The provider chain behind [`load_from`](Self::load_from).
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Layers `self` under the environment, for callers that built a config
    /// in code but still honour `LND_*` overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        Figment::from(Serialized::defaults(self))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(ClientError::from)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::InvalidConfig("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ClientError::InvalidConfig("port cannot be 0".to_string()));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ClientError::InvalidConfig(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        for (name, limit) in [
            ("max_send_message_length", self.max_send_message_length),
            ("max_receive_message_length", self.max_receive_message_length),
        ] {
            if limit == Some(0) {
                return Err(ClientError::InvalidConfig(format!("{name} cannot be 0")));
            }
        }

        Ok(())
    }

    /// Reads the certificate and macaroon files.
    pub fn connection_params(&self) -> Result<ConnectionParams> {
        let certificate = TlsCertificate::from_file(&self.tls_cert_path)?;
        let macaroon = Macaroon::from_file(&self.macaroon_path)?;
        ConnectionParams::new(self.host.clone(), self.port, certificate, macaroon)
    }

    /// Message size limits for the channel.
    #[must_use]
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            max_send_message_length: self.max_send_message_length,
            max_receive_message_length: self.max_receive_message_length,
        }
    }
}
