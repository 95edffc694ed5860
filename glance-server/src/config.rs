//! Configuration for the stream server.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use glance_core::protocol::settings::{DEFAULT_FPS, DEFAULT_QUALITY, DEFAULT_SCALE};
use glance_core::protocol::{DEFAULT_PORT, DEFAULT_SECRET};
use glance_core::server::ServerConfig as CoreServerConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Authentication.
    pub auth: AuthConfig,
    /// Initial stream tunables.
    pub stream: StreamConfig,
    /// Where encoded frames come from.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface to bind.
    pub bind_address: String,
    /// TCP port viewers connect to.
    pub port: u16,
    /// Seconds with no viewers before the server stops itself.
    pub idle_timeout_secs: u64,
}

/// Authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret. Empty means the build-time default.
    pub secret: String,
}

/// Initial stream tunables; viewers may change them at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frames per second, 1–4.
    pub fps: i64,
    /// Encoder quality hint, 10–90.
    pub quality: i64,
    /// Capture scale hint, 0.25–1.0.
    pub scale: f64,
}

/// Frame source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Encoded image re-read on every tick. An external capture tool is
    /// expected to keep overwriting it.
    pub frame_path: PathBuf,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            idle_timeout_secs: 5 * 60,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            quality: DEFAULT_QUALITY as i64,
            scale: DEFAULT_SCALE,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frame_path: PathBuf::from("frame.jpg"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ServerConfig {
    /// Load from a TOML file. A missing file yields the defaults; an
    /// unreadable or malformed one is an error the caller can report once
    /// logging is up.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Convert into the core server's construction parameters.
    pub fn to_server_config(&self) -> Result<CoreServerConfig, std::net::AddrParseError> {
        let bind_addr: IpAddr = self.network.bind_address.parse()?;
        let secret = if self.auth.secret.is_empty() {
            DEFAULT_SECRET.to_string()
        } else {
            self.auth.secret.clone()
        };
        Ok(CoreServerConfig {
            bind_addr,
            secret,
            idle_timeout: Duration::from_secs(self.network.idle_timeout_secs.max(1)),
            fps: self.stream.fps,
            quality: self.stream.quality,
            scale: self.stream.scale,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
