//! Connection management: endpoint addressing, transport, handshake, state

mod conn;
mod state;
mod tls;
mod transport;

pub use conn::{ConnectOptions, Connection};
pub use state::ConnectionState;
pub use tls::{TlsConfig, TlsConfigBuilder};
pub use transport::Transport;

/// Network address of one database server, plus its security policy.
/// Immutable once the driver is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Whether the transport is TLS-encrypted from the first byte
    pub encrypted: bool,
}

impl Endpoint {
    /// Plain endpoint at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            encrypted: false,
        }
    }

    /// Set the security policy
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Authentication material sent once at HELLO. Opaque to the driver beyond
/// shape validation.
#[derive(Clone)]
pub struct Credentials {
    /// Authentication scheme ("basic" when a principal is present)
    scheme: &'static str,
    /// Principal (username)
    pub principal: Option<String>,
    /// Secret (password)
    pub secret: Option<String>,
    /// Optional realm
    pub realm: Option<String>,
}

impl Credentials {
    /// Username/password authentication
    pub fn basic(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            scheme: "basic",
            principal: Some(principal.into()),
            secret: Some(secret.into()),
            realm: None,
        }
    }

    /// Username/password authentication within a realm
    pub fn basic_with_realm(
        principal: impl Into<String>,
        secret: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            scheme: "basic",
            principal: Some(principal.into()),
            secret: Some(secret.into()),
            realm: Some(realm.into()),
        }
    }

    /// No authentication
    pub fn none() -> Self {
        Self {
            scheme: "none",
            principal: None,
            secret: None,
            realm: None,
        }
    }

    /// Scheme name sent in HELLO
    pub fn scheme(&self) -> &'static str {
        self.scheme
    }
}

impl std::fmt::Debug for Credentials {
    // The secret never appears in logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("realm", &self.realm)
            .finish()
    }
}
