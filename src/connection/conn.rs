//! Core connection type

use super::state::ConnectionState;
use super::transport::Transport;
use super::{Credentials, Endpoint};
use crate::protocol::constants::{HANDSHAKE_MAGIC, PROPOSED_VERSIONS};
use crate::protocol::{self, Request, Response};
use crate::value::Value;
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::Instrument;

// Monotonic connection ids for tracing spans
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(0);

/// Options applied when opening a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Client identification sent in HELLO
    pub user_agent: String,
    /// Bound on TCP connect and TLS handshake
    pub connect_timeout: Duration,
    /// Bound on every read; expiry marks the connection dead
    pub read_timeout: Duration,
    /// TLS settings, required when the endpoint is encrypted
    pub tls: Option<super::TlsConfig>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            user_agent: concat!("bolt-driver/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            tls: None,
        }
    }
}

/// A single authenticated transport channel to one server endpoint.
///
/// Owns handshake state and raw send/receive. While idle a connection is
/// owned exclusively by the pool; while checked out, by exactly one session.
pub struct Connection {
    id: u64,
    endpoint: Endpoint,
    transport: Transport,
    state: ConnectionState,
    read_buf: BytesMut,
    read_timeout: Duration,
    version: (u8, u8),
    server_agent: Option<String>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("version", &self.version)
            .finish()
    }
}

impl Connection {
    /// Open a connection: TCP (and TLS if the endpoint is encrypted), then
    /// the version-negotiation handshake, then HELLO authentication.
    ///
    /// Any transport error or malformed handshake response fails the open;
    /// a connection is never handed out in a partially negotiated state.
    pub async fn open(
        endpoint: &Endpoint,
        credentials: &Credentials,
        opts: &ConnectOptions,
    ) -> Result<Self> {
        let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        async {
            let transport = if endpoint.encrypted {
                let tls = opts.tls.as_ref().ok_or_else(|| {
                    Error::Config("encrypted endpoint requires a TlsConfig".into())
                })?;
                Transport::connect_tls(&endpoint.host, endpoint.port, tls, opts.connect_timeout)
                    .await?
            } else {
                Transport::connect_plain(&endpoint.host, endpoint.port, opts.connect_timeout)
                    .await?
            };

            let mut conn = Self {
                id,
                endpoint: endpoint.clone(),
                transport,
                state: ConnectionState::Initial,
                read_buf: BytesMut::with_capacity(8192),
                read_timeout: opts.read_timeout,
                version: (0, 0),
                server_agent: None,
            };

            conn.handshake().await?;
            conn.authenticate(credentials, &opts.user_agent).await?;

            crate::metrics::counters::connection_opened(&conn.endpoint);
            tracing::info!(
                version = %format!("{}.{}", conn.version.0, conn.version.1),
                server = conn.server_agent.as_deref().unwrap_or("unknown"),
                "connection established"
            );
            Ok(conn)
        }
        .instrument(tracing::info_span!(
            "open_connection",
            conn = id,
            endpoint = %endpoint
        ))
        .await
    }

    /// Negotiated protocol version
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Server identification from the HELLO response, if provided
    pub fn server_agent(&self) -> Option<&str> {
        self.server_agent.as_deref()
    }

    /// The endpoint this connection is bound to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection may still carry requests
    pub fn is_live(&self) -> bool {
        self.state.is_usable()
    }

    /// Whether a result stream is open on this connection
    pub fn is_streaming(&self) -> bool {
        self.state == ConnectionState::Streaming
    }

    /// Mark the connection unusable. Idempotent; a defunct connection is
    /// discarded on release instead of re-pooled.
    pub fn mark_defunct(&mut self) {
        if self.state != ConnectionState::Defunct && self.state != ConnectionState::Closed {
            tracing::debug!(conn = self.id, "connection marked defunct");
            self.state = ConnectionState::Defunct;
        }
    }

    /// Record that a result stream was opened (RUN accepted)
    pub fn begin_stream(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Streaming)
    }

    /// Record that the open result stream was fully consumed
    pub fn end_stream(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Ready)
    }

    /// Send the magic preamble and four version proposals, then validate the
    /// server's selection.
    async fn handshake(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Handshaking)?;

        let mut buf = BytesMut::with_capacity(20);
        buf.put_slice(&HANDSHAKE_MAGIC);
        for (major, minor) in PROPOSED_VERSIONS {
            buf.put_slice(&[0, 0, minor, major]);
        }
        self.transport.write_all(&buf).await?;
        self.transport.flush().await?;

        let mut reply = [0u8; 4];
        let read =
            tokio::time::timeout(self.read_timeout, self.transport.read_exact(&mut reply)).await;
        match read {
            Err(_) => {
                self.mark_defunct();
                return Err(Error::Timeout);
            }
            Ok(Err(e)) => {
                self.mark_defunct();
                return Err(e);
            }
            Ok(Ok(())) => {}
        }

        if reply == [0, 0, 0, 0] {
            self.mark_defunct();
            return Err(Error::Auth(
                "server rejected all proposed protocol versions".into(),
            ));
        }
        let selected = (reply[3], reply[2]);
        if reply[0] != 0 || reply[1] != 0 || !PROPOSED_VERSIONS.contains(&selected) {
            self.mark_defunct();
            return Err(Error::Protocol(format!(
                "malformed handshake reply: {:02X?}",
                reply
            )));
        }

        self.version = selected;
        tracing::debug!(conn = self.id, "negotiated protocol {}.{}", selected.0, selected.1);
        Ok(())
    }

    /// Send HELLO and await the authentication verdict
    async fn authenticate(&mut self, credentials: &Credentials, user_agent: &str) -> Result<()> {
        self.state.transition(ConnectionState::Authenticating)?;
        crate::metrics::counters::auth_attempted(credentials.scheme());

        let hello = Request::Hello {
            user_agent: user_agent.to_string(),
            scheme: credentials.scheme().to_string(),
            principal: credentials.principal.clone(),
            credentials: credentials.secret.clone(),
            realm: credentials.realm.clone(),
        };
        self.send(&hello).await?;

        match self.receive().await? {
            Response::Success(meta) => {
                if let Some(Value::String(agent)) = meta.get("server") {
                    self.server_agent = Some(agent.clone());
                }
                self.state.transition(ConnectionState::Ready)?;
                crate::metrics::counters::auth_succeeded(credentials.scheme());
                Ok(())
            }
            Response::Failure(err) => {
                crate::metrics::counters::auth_failed(credentials.scheme());
                self.mark_defunct();
                Err(Error::Auth(err.to_string()))
            }
            other => {
                self.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} during authentication",
                    other.name()
                )))
            }
        }
    }

    /// Send a request message
    pub async fn send(&mut self, msg: &Request) -> Result<()> {
        tracing::trace!(conn = self.id, msg = msg.name(), "send");
        let body = protocol::encode_request(msg);
        let mut framed = BytesMut::with_capacity(body.len() + 4);
        protocol::write_chunked(&mut framed, &body);

        let result = async {
            self.transport.write_all(&framed).await?;
            self.transport.flush().await
        }
        .await;

        if result.is_err() {
            self.mark_defunct();
        }
        result
    }

    /// Receive one response message, bounded by the read timeout.
    ///
    /// Timeout or EOF marks the connection defunct; it will not be returned
    /// to the idle pool.
    pub async fn receive(&mut self) -> Result<Response> {
        loop {
            if let Some(body) = protocol::try_read_message(&mut self.read_buf) {
                match protocol::decode_response(&body) {
                    Ok(msg) => {
                        tracing::trace!(conn = self.id, msg = msg.name(), "receive");
                        return Ok(msg);
                    }
                    Err(e) => {
                        self.mark_defunct();
                        return Err(e);
                    }
                }
            }

            let read = tokio::time::timeout(
                self.read_timeout,
                self.transport.read_buf(&mut self.read_buf),
            )
            .await;
            match read {
                Err(_) => {
                    self.mark_defunct();
                    return Err(Error::Timeout);
                }
                Ok(Err(e)) => {
                    self.mark_defunct();
                    return Err(e);
                }
                Ok(Ok(0)) => {
                    self.mark_defunct();
                    return Err(Error::ConnectionClosed);
                }
                Ok(Ok(_)) => {}
            }
        }
    }

    /// Discard the remainder of an open result stream so the connection can
    /// be reused at a consistent protocol position.
    pub async fn drain_stream(&mut self) -> Result<()> {
        if self.state != ConnectionState::Streaming {
            return Ok(());
        }
        tracing::debug!(conn = self.id, "draining unconsumed result stream");
        self.send(&Request::Discard { n: -1 }).await?;
        loop {
            match self.receive().await? {
                Response::Record(_) | Response::Ignored => {}
                Response::Success(_) => {
                    self.end_stream()?;
                    return Ok(());
                }
                Response::Failure(_) => {
                    // Server is in a failed state; RESET restores it
                    self.end_stream()?;
                    return self.reset().await;
                }
            }
        }
    }

    /// Return the server side of the connection to a clean state
    pub async fn reset(&mut self) -> Result<()> {
        self.send(&Request::Reset).await?;
        loop {
            match self.receive().await? {
                Response::Ignored => {}
                Response::Success(_) => return Ok(()),
                Response::Failure(err) => {
                    self.mark_defunct();
                    return Err(Error::Server(err));
                }
                Response::Record(_) => {
                    self.mark_defunct();
                    return Err(Error::Protocol("unexpected RECORD after RESET".into()));
                }
            }
        }
    }

    /// Close the connection with a best-effort GOODBYE
    pub async fn close(mut self) {
        if self.state.is_usable() {
            let _ = self.send(&Request::Goodbye).await;
        }
        let _ = self.state.transition(ConnectionState::Closed);
        let _ = self.transport.shutdown().await;
        crate::metrics::counters::connection_closed(&self.endpoint);
        tracing::debug!(conn = self.id, "connection closed");
    }
}
