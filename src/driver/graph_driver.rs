//! Driver entry point

use super::config::Config;
use super::uri::BoltUri;
use crate::connection::{ConnectOptions, Credentials, Endpoint};
use crate::pool::{Pool, PoolConfig};
use crate::session::Session;
use crate::{Error, Result};
use std::sync::Arc;

/// Thread-safe entry point owning the connection pool.
///
/// Construction validates the target URI and configuration but performs no
/// I/O; the first connection is opened when the first session runs a query.
/// A driver is cheap to clone-by-reference via `Arc` and is typically one
/// per process per server.
pub struct Driver {
    pool: Arc<Pool>,
    endpoint: Endpoint,
    default_database: Option<String>,
    fetch_size: i64,
}

impl Driver {
    /// Create a driver for the given Bolt URI.
    ///
    /// Fails fast on a malformed URI or an encrypted target without TLS
    /// settings; no connection is attempted here.
    pub fn new(uri: &str, credentials: Credentials, config: Config) -> Result<Self> {
        let parsed = BoltUri::parse(uri)?;
        let encrypted = config.encrypted.unwrap_or(parsed.encrypted);
        if encrypted && config.tls.is_none() {
            return Err(Error::Config(
                "encrypted target requires a TLS configuration".into(),
            ));
        }
        let endpoint = Endpoint::new(&parsed.host, parsed.port).encrypted(encrypted);

        let connect_opts = ConnectOptions {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connection_timeout,
            read_timeout: config.read_timeout,
            tls: config.tls.clone(),
        };
        let pool_config = PoolConfig {
            max_size: config.max_pool_size,
            acquire_timeout: config.acquire_timeout,
            max_idle_time: config.idle_timeout,
        };

        tracing::info!(endpoint = %endpoint, "driver created");
        Ok(Self {
            pool: Arc::new(Pool::new(credentials, connect_opts, pool_config)),
            endpoint,
            default_database: parsed.database,
            fetch_size: config.fetch_size,
        })
    }

    /// The endpoint this driver targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Open a session against the driver's default database
    pub fn session(&self) -> Result<Session> {
        self.session_with(self.default_database.clone())
    }

    /// Open a session against a specific database
    pub fn session_for_db(&self, database: impl Into<String>) -> Result<Session> {
        self.session_with(Some(database.into()))
    }

    fn session_with(&self, database: Option<String>) -> Result<Session> {
        if self.pool.is_closed() {
            return Err(Error::DriverClosed);
        }
        Ok(Session::new(
            self.pool.clone(),
            self.endpoint.clone(),
            database,
            self.fetch_size,
        ))
    }

    /// Open, authenticate and immediately release one connection.
    ///
    /// Useful at startup to surface bad addresses or credentials before any
    /// real work is queued.
    pub async fn verify_connectivity(&self) -> Result<()> {
        let conn = self.pool.acquire(&self.endpoint).await?;
        self.pool.release(conn);
        Ok(())
    }

    /// Shut the driver down.
    ///
    /// Idle connections get an orderly GOODBYE; pending pool waiters fail
    /// fast with `DriverClosed`, as does any later session or query.
    /// Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Pool occupancy for this driver's endpoint: `(idle, in_use)`
    pub fn pool_stats(&self) -> (usize, usize) {
        self.pool.stats(&self.endpoint)
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("endpoint", &self.endpoint)
            .field("database", &self.default_database)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_performs_no_io() {
        // Nothing listens on this address; construction must still succeed
        let driver = Driver::new(
            "bolt://192.0.2.1:7687",
            Credentials::basic("neo4j", "secret"),
            Config::default(),
        )
        .unwrap();
        assert_eq!(driver.endpoint().to_string(), "192.0.2.1:7687");
        assert!(!driver.is_closed());
    }

    #[test]
    fn test_encrypted_uri_requires_tls() {
        let err = Driver::new("bolt+s://localhost", Credentials::none(), Config::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_encrypted_override_beats_scheme() {
        // Forced on over a plain scheme: TLS settings become mandatory
        let config = Config::builder().encrypted(true).build();
        let err = Driver::new("bolt://localhost", Credentials::none(), config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // Forced off over an encrypted scheme: no TLS settings needed
        let config = Config::builder().encrypted(false).build();
        let driver = Driver::new("bolt+s://localhost", Credentials::none(), config).unwrap();
        assert!(!driver.endpoint().encrypted);
    }

    #[test]
    fn test_default_database_from_uri() {
        let driver = Driver::new(
            "bolt://localhost?database=movies",
            Credentials::none(),
            Config::default(),
        )
        .unwrap();
        let session = driver.session().unwrap();
        assert_eq!(session.database(), Some("movies"));
    }

    #[tokio::test]
    async fn test_session_after_close_fails() {
        let driver =
            Driver::new("bolt://localhost", Credentials::none(), Config::default()).unwrap();
        driver.close().await;
        assert!(matches!(driver.session(), Err(Error::DriverClosed)));
    }
}
