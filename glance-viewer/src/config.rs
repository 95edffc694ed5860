//! Viewer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use glance_core::ClientConfig;
use glance_core::protocol::{DEFAULT_PORT, DEFAULT_SECRET};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Authentication.
    pub auth: AuthConfig,
    /// Tunables requested once the session is authenticated.
    pub stream: StreamConfig,
    /// Frame stream parsing.
    pub protocol: ProtocolConfig,
    /// What to do with received frames.
    pub output: OutputConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server host name or IP.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret. Empty means the build-time default.
    pub secret: String,
}

/// Initial tunables. Unset values leave the server's current setting alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub fps: Option<i64>,
    pub quality: Option<i64>,
    pub scale: Option<f64>,
}

/// Parsing behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Drop the connection on an unrecognised header line.
    pub strict_headers: bool,
}

/// Frame output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File overwritten with every received frame. Empty disables it.
    pub latest_frame: String,
    /// Seconds between delivery statistics log lines. Zero disables them.
    pub stats_interval_secs: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            timeout_ms: 5000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            latest_frame: String::new(),
            stats_interval_secs: 5,
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

impl ViewerConfig {
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

    /// Convert into the core client's settings.
    pub fn to_client_config(&self) -> ClientConfig {
        let secret = if self.auth.secret.is_empty() {
            DEFAULT_SECRET.to_string()
        } else {
            self.auth.secret.clone()
        };
        ClientConfig {
            secret,
            connect_timeout: Duration::from_millis(self.network.timeout_ms.max(1)),
            strict_headers: self.protocol.strict_headers,
            ..ClientConfig::default()
        }
    }

    pub fn latest_frame_path(&self) -> Option<PathBuf> {
        if self.output.latest_frame.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.output.latest_frame))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ViewerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("strict_headers"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ViewerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, DEFAULT_PORT);
        assert_eq!(parsed.stream.fps, None);
    }

    #[test]
    fn initial_tunables_parse() {
        let parsed: ViewerConfig =
            toml::from_str("[stream]\nfps = 4\nscale = 0.5\n").unwrap();
        assert_eq!(parsed.stream.fps, Some(4));
        assert_eq!(parsed.stream.quality, None);
        assert_eq!(parsed.stream.scale, Some(0.5));
    }

    #[test]
    fn client_config_mapping() {
        let mut cfg = ViewerConfig::default();
        assert_eq!(cfg.to_client_config().secret, DEFAULT_SECRET);

        cfg.auth.secret = "hunter2".into();
        cfg.network.timeout_ms = 1500;
        cfg.protocol.strict_headers = true;
        let client = cfg.to_client_config();
        assert_eq!(client.secret, "hunter2");
        assert_eq!(client.connect_timeout, Duration::from_millis(1500));
        assert!(client.strict_headers);
    }

    #[test]
    fn latest_frame_disabled_by_default() {
        let mut cfg = ViewerConfig::default();
        assert!(cfg.latest_frame_path().is_none());
        cfg.output.latest_frame = "last.jpg".into();
        assert_eq!(cfg.latest_frame_path(), Some(PathBuf::from("last.jpg")));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ViewerConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.network.host, "127.0.0.1");
    }

    #[test]
    fn load_reports_wrong_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glance-viewer.toml");
        std::fs::write(&path, "[network]\nport = \"seven\"\n").unwrap();
        assert!(matches!(
            ViewerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
