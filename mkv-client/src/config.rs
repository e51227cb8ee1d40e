//! # Client and Pool Configuration
//!
//! Purpose: Describe where the server lives and how the pool behaves, and
//! reject contradictory settings before any socket is opened.
//!
//! ## Design Principles
//! 1. **Fail Fast**: Transport conflicts are reported at construction time.
//! 2. **Serde Friendly**: Every field has a default so configs load from JSON.
//! 3. **Explicit Growth**: Whether the pool grows or waits is a named policy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, ClientResult};

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 11211;

/// Default number of pool entries created up front.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Default capacity reserved for each socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Resolved server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// TCP connection to `host:port`.
    Tcp { host: String, port: u16 },
    /// Unix domain socket at the given path.
    Unix(PathBuf),
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Transport::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Configuration for a single connection.
///
/// Set either `host`/`port` or `unix_path`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TCP host, defaults to `127.0.0.1`.
    pub host: Option<String>,
    /// TCP port, defaults to `11211`.
    pub port: Option<u16>,
    /// Unix socket path; excludes `host` and `port`.
    pub unix_path: Option<PathBuf>,
    /// Bytes reserved per socket read.
    pub read_buffer_size: usize,
    /// Optional connect deadline in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Optional deadline in milliseconds for one write/read exchange.
    pub io_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: None,
            port: None,
            unix_path: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// TCP configuration for `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            host: Some(host.into()),
            port: Some(port),
            ..ClientConfig::default()
        }
    }

    /// Unix domain socket configuration.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        ClientConfig {
            unix_path: Some(path.into()),
            ..ClientConfig::default()
        }
    }

    /// Validates the settings and resolves the endpoint.
    pub fn transport(&self) -> ClientResult<Transport> {
        if self.read_buffer_size == 0 {
            return Err(ClientError::Configuration(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }

        let tcp_requested = self.host.is_some() || self.port.is_some();
        match &self.unix_path {
            Some(_) if tcp_requested => Err(ClientError::Configuration(
                "cannot use both unix_path and host/port".to_string(),
            )),
            Some(path) => unix_transport(path),
            None => Ok(Transport::Tcp {
                host: self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: self.port.unwrap_or(DEFAULT_PORT),
            }),
        }
    }

    pub(crate) fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(unix)]
fn unix_transport(path: &Path) -> ClientResult<Transport> {
    Ok(Transport::Unix(path.to_path_buf()))
}

#[cfg(not(unix))]
fn unix_transport(_path: &Path) -> ClientResult<Transport> {
    Err(ClientError::Configuration(
        "unix sockets are not supported on this platform".to_string(),
    ))
}

/// What `Pool::acquire` does when every entry is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Append a new entry; acquisition never waits.
    #[default]
    Unbounded,
    /// Grow up to `max` entries, then wait for a release.
    Bounded { max: usize },
}

impl GrowthPolicy {
    /// True when a pool holding `current` entries may add one more.
    pub fn allows(self, current: usize) -> bool {
        match self {
            GrowthPolicy::Unbounded => true,
            GrowthPolicy::Bounded { max } => current < max,
        }
    }
}

/// Configuration for a connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Settings applied to every pooled connection.
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Entries created up front; `0` means [`DEFAULT_POOL_SIZE`].
    pub pool_size: usize,
    /// Behavior once all entries are locked.
    pub growth: GrowthPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            client: ClientConfig::default(),
            pool_size: DEFAULT_POOL_SIZE,
            growth: GrowthPolicy::Unbounded,
        }
    }
}

impl PoolConfig {
    /// Pool configuration around an existing client configuration.
    pub fn new(client: ClientConfig) -> Self {
        PoolConfig {
            client,
            ..PoolConfig::default()
        }
    }

    /// Number of entries the pool starts with.
    pub fn initial_size(&self) -> usize {
        match self.pool_size {
            0 => DEFAULT_POOL_SIZE,
            size => size,
        }
    }

    /// Validates pool settings and resolves the shared endpoint.
    pub fn transport(&self) -> ClientResult<Transport> {
        let transport = self.client.transport()?;
        if let GrowthPolicy::Bounded { max } = self.growth {
            if max == 0 {
                return Err(ClientError::Configuration(
                    "bounded pool needs max of at least one".to_string(),
                ));
            }
            if self.initial_size() > max {
                return Err(ClientError::Configuration(format!(
                    "pool_size {} exceeds bounded max {}",
                    self.initial_size(),
                    max
                )));
            }
        }
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_tcp() {
        let transport = ClientConfig::default().transport().unwrap();
        assert_eq!(
            transport,
            Transport::Tcp {
                host: "127.0.0.1".to_string(),
                port: 11211
            }
        );
        assert_eq!(transport.to_string(), "tcp://127.0.0.1:11211");
    }

    #[test]
    fn partial_tcp_settings_fill_defaults() {
        let config = ClientConfig {
            port: Some(22122),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.transport().unwrap(),
            Transport::Tcp {
                host: "127.0.0.1".to_string(),
                port: 22122
            }
        );
    }

    #[test]
    fn rejects_unix_path_with_host() {
        let config = ClientConfig {
            host: Some("localhost".to_string()),
            unix_path: Some(PathBuf::from("/tmp/mkv.sock")),
            ..ClientConfig::default()
        };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));
    }

    #[test]
    fn rejects_unix_path_with_port() {
        let config = ClientConfig {
            port: Some(11211),
            unix_path: Some(PathBuf::from("/tmp/mkv.sock")),
            ..ClientConfig::default()
        };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));
    }

    #[cfg(unix)]
    #[test]
    fn resolves_unix_path() {
        let transport = ClientConfig::unix("/tmp/mkv.sock").transport().unwrap();
        assert_eq!(transport, Transport::Unix(PathBuf::from("/tmp/mkv.sock")));
    }

    #[test]
    fn rejects_zero_read_buffer() {
        let config = ClientConfig {
            read_buffer_size: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));
    }

    #[test]
    fn growth_policy_limits() {
        assert!(GrowthPolicy::Unbounded.allows(usize::MAX - 1));
        assert!(GrowthPolicy::Bounded { max: 2 }.allows(1));
        assert!(!GrowthPolicy::Bounded { max: 2 }.allows(2));
    }

    #[test]
    fn bounded_pool_validation() {
        let mut config = PoolConfig::default();
        config.growth = GrowthPolicy::Bounded { max: 0 };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));

        config.growth = GrowthPolicy::Bounded { max: 2 };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));

        config.pool_size = 2;
        assert!(config.transport().is_ok());
    }

    #[test]
    fn zero_pool_size_means_default() {
        let mut config = PoolConfig::default();
        config.pool_size = 0;
        assert_eq!(config.initial_size(), DEFAULT_POOL_SIZE);

        config.growth = GrowthPolicy::Bounded { max: 2 };
        assert!(matches!(config.transport(), Err(ClientError::Configuration(_))));
        config.growth = GrowthPolicy::Bounded { max: DEFAULT_POOL_SIZE };
        assert!(config.transport().is_ok());

        config.pool_size = 3;
        assert_eq!(config.initial_size(), 3);
    }

    #[test]
    fn pool_config_from_json() {
        let config: PoolConfig = serde_json::from_str(
            r#"{"host":"10.0.0.5","pool_size":2,"io_timeout_ms":250,"growth":{"mode":"bounded","max":4}}"#,
        )
        .unwrap();
        assert_eq!(config.client.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.client.port, None);
        assert_eq!(config.client.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.client.io_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.growth, GrowthPolicy::Bounded { max: 4 });
    }

    #[test]
    fn pool_config_defaults_from_empty_json() {
        let config: PoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.pool_size, 5);
    }
}
