//! Driver configuration

use crate::connection::TlsConfig;
use std::time::Duration;

/// Tuning knobs for a driver instance.
///
/// The defaults are serviceable for local development; production setups
/// usually at least size the pool and set a TLS configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum pooled connections per endpoint, idle and in-use combined
    pub max_pool_size: usize,
    /// Bound on TCP connect + TLS handshake when opening a connection
    pub connection_timeout: Duration,
    /// Bound on waiting for a pool slot when the pool is exhausted
    pub acquire_timeout: Duration,
    /// Idle connections older than this are discarded instead of reused
    pub idle_timeout: Duration,
    /// Bound on each read from the server
    pub read_timeout: Duration,
    /// Records requested per PULL batch
    pub fetch_size: i64,
    /// Client identification sent in HELLO
    pub user_agent: String,
    /// Force encryption on or off regardless of the URI scheme; `None`
    /// follows the scheme (`bolt+s://` encrypted, `bolt://` plain)
    pub encrypted: Option<bool>,
    /// TLS settings, required for encrypted targets
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            connection_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(3600),
            read_timeout: Duration::from_secs(60),
            fetch_size: 1000,
            user_agent: concat!("bolt-driver/", env!("CARGO_PKG_VERSION")).to_string(),
            encrypted: None,
            tls: None,
        }
    }
}

impl Config {
    /// Start building a configuration from the defaults
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Maximum pooled connections per endpoint
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Bound on opening a physical connection
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Bound on waiting for a free pool slot
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Maximum idle lifetime before a pooled connection is discarded
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Bound on each read from the server
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Records requested per PULL batch
    pub fn fetch_size(mut self, n: i64) -> Self {
        self.config.fetch_size = n;
        self
    }

    /// Client identification sent in HELLO
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Force encryption on or off regardless of the URI scheme
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.config.encrypted = Some(encrypted);
        self
    }

    /// TLS settings for encrypted targets
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Finish building
    pub fn build(self) -> Config {
        self.config
    }
}
