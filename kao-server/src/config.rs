//! Configuration for kao-server.
//!
//! Loaded from a TOML file (`kao-config.toml` by default) with CLI and
//! environment overrides. A missing file is not fatal — every section
//! has workable defaults for a localhost setup — but an unreadable or
//! invalid file is.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub vmc: VmcSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:3001").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3001)
}

/// Webhook ingress section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    /// Shared secret for signature verification. When absent, every
    /// delivery is accepted — an explicit opt-out logged at startup.
    pub secret: Option<String>,
}

/// Motion-capture peer section.
#[derive(Debug, Clone, Deserialize)]
pub struct VmcSection {
    /// Whether to connect to a VMC peer at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_vmc_host")]
    pub host: IpAddr,
    #[serde(default = "default_vmc_port")]
    pub port: u16,
    /// Local bind port; 0 lets the OS pick.
    #[serde(default)]
    pub local_port: u16,
}

impl Default for VmcSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_vmc_host(),
            port: default_vmc_port(),
            local_port: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_vmc_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_vmc_port() -> u16 {
    39539
}

/// Load the configuration, applying CLI overrides.
///
/// A missing file at `path` falls back to defaults; any other read or
/// parse failure is fatal.
pub fn load(
    path: &Path,
    listen_override: Option<SocketAddr>,
    secret_override: Option<String>,
) -> Result<FileConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        tracing::info!(?path, "config file not found, using defaults");
        FileConfig::default()
    };

    if let Some(listen) = listen_override {
        config.server.listen = listen;
    }
    if let Some(secret) = secret_override {
        config.webhook.secret = Some(secret);
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.vmc.enabled && config.vmc.port == 0 {
        return Err(ConfigError::Validation(
            "vmc.port must be nonzero when vmc is enabled".into(),
        ));
    }
    if let Some(secret) = &config.webhook.secret {
        if secret.is_empty() {
            return Err(ConfigError::Validation(
                "webhook.secret must not be empty; omit it to disable verification".into(),
            ));
        }
    }
    Ok(())
}
