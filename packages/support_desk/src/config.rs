use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / desk.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   desk.toml:       [server]
//                    port = 4000
//
//   env var:         DESK_SERVER__PORT=4000   (double underscore = nesting)
//
//   CLI flag:        desk --port 4000          (wins over both)

pub const DEFAULT_CONFIG_FILE: &str = "desk.toml";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {addr}: {source}")]
    InvalidBindAddress {
        addr: String,
        source: std::net::AddrParseError,
    },
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
}

/// Listener settings (lives under `[server]` in desk.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// WebSocket tunables (lives under `[websocket]` in desk.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_max_message_kb")]
    pub max_message_kb: usize,
    /// Seconds between keep-alive pings. A peer silent for two intervals is
    /// disconnected; 0 disables both pings and the liveness check
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            max_message_kb: default_max_message_kb(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_max_message_kb() -> usize {
    64
}
fn default_ping_interval_secs() -> u64 {
    30
}

/// Build a figment that layers: defaults → config file → DESK_* env vars.
///
/// With no explicit path, `desk.toml` in the working directory is used if it
/// exists. Env vars use double-underscore for nesting into sections:
///   `DESK_SERVER__HOST=0.0.0.0`  →  `server.host = "0.0.0.0"`
///   `DESK_WEBSOCKET__PING_INTERVAL_SECS=0`  →  `websocket.ping_interval_secs = 0`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DESK_").split("__"))
}

/// Values given on the command line; these override every other layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Largest inbound frame accepted, in bytes
    pub max_message_bytes: usize,
    /// Keep-alive ping period, also the liveness unit (None = disabled)
    pub ping_interval: Option<Duration>,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig, cli: &CliOverrides) -> Self {
        Self {
            host: cli
                .host
                .clone()
                .or_else(|| fc.server.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(fc.server.port).unwrap_or(DEFAULT_PORT),
            websocket: WebSocketConfig {
                max_message_bytes: fc.websocket.max_message_kb * 1024,
                ping_interval: if fc.websocket.ping_interval_secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(fc.websocket.ping_interval_secs))
                },
            },
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|source| ConfigError::InvalidBindAddress { addr, source })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default(), &CliOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_websocket_file_config_defaults() {
        let d = WebSocketFileConfig::default();
        assert_eq!(d.max_message_kb, 64);
        assert_eq!(d.ping_interval_secs, 30);
    }

    #[test]
    fn test_server_config_defaults() {
        let sc = ServerConfig::default();
        assert_eq!(sc.host, "127.0.0.1");
        assert_eq!(sc.port, 4000);
        assert_eq!(sc.websocket.max_message_bytes, 64 * 1024);
        assert_eq!(sc.websocket.ping_interval, Some(Duration::from_secs(30)));
    }

    // ── ServerConfig::from_file ─────────────────────────────────────────

    #[test]
    fn test_ping_interval_zero_disables() {
        let fc = FileConfig {
            websocket: WebSocketFileConfig {
                ping_interval_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let sc = ServerConfig::from_file(&fc, &CliOverrides::default());
        assert!(sc.websocket.ping_interval.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let fc = FileConfig {
            server: ServerFileConfig {
                host: Some("0.0.0.0".to_string()),
                port: Some(8080),
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            host: None,
            port: Some(9090),
        };
        let sc = ServerConfig::from_file(&fc, &cli);
        assert_eq!(sc.host, "0.0.0.0");
        assert_eq!(sc.port, 9090);
    }

    #[test]
    fn test_bind_addr() {
        let sc = ServerConfig::default();
        assert_eq!(sc.bind_addr().unwrap().to_string(), "127.0.0.1:4000");

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        let err = bad.bind_addr().unwrap_err();
        assert!(err.to_string().contains("not a host:4000"));
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(Some(&tmp.path().join("absent.toml")))
            .extract()
            .unwrap();
        assert!(fc.server.host.is_none());
        assert!(fc.server.port.is_none());
        assert_eq!(fc.websocket.max_message_kb, 64);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("desk.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"192.168.1.1\"\nport = 8080\n\n[websocket]\nmax_message_kb = 16\nping_interval_secs = 5\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(Some(&path)).extract().unwrap();
        assert_eq!(fc.server.host.as_deref(), Some("192.168.1.1"));
        assert_eq!(fc.server.port, Some(8080));
        assert_eq!(fc.websocket.max_message_kb, 16);
        assert_eq!(fc.websocket.ping_interval_secs, 5);
    }

    #[test]
    fn test_load_config_partial_section_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("desk.toml");
        std::fs::write(&path, "[websocket]\nping_interval_secs = 0\n").unwrap();
        let fc: FileConfig = load_config(Some(&path)).extract().unwrap();
        assert_eq!(fc.websocket.max_message_kb, 64);
        assert_eq!(fc.websocket.ping_interval_secs, 0);
    }
}
