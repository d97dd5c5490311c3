//! Transport abstraction (plain TCP vs TLS)

use crate::{Error, Result};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Transport layer abstraction
///
/// Bolt negotiates TLS before the first protocol byte: a `bolt+s` endpoint
/// performs the TLS handshake immediately after the TCP connect, then the
/// version handshake runs over the encrypted stream.
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

impl Transport {
    /// Connect via plain TCP, bounded by `connect_timeout`
    pub async fn connect_plain(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::Timeout)??;
        stream.set_nodelay(true)?;
        Ok(Transport::Plain(stream))
    }

    /// Connect via TCP and immediately perform the TLS handshake
    pub async fn connect_tls(
        host: &str,
        port: u16,
        tls_config: &super::TlsConfig,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::Timeout)??;
        stream.set_nodelay(true)?;

        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
            .map_err(|_| Error::Config(format!("invalid hostname for TLS: {}", host)))?;
        let connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
        let tls_stream = tokio::time::timeout(connect_timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Config(format!("TLS handshake failed: {}", e)))?;

        Ok(Transport::Tls(tls_stream))
    }

    /// Write all bytes to the transport
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(buf).await?,
            Transport::Tls(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush().await?,
            Transport::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Read bytes into buffer, returning the number read (0 = EOF)
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.read_buf(buf).await?,
            Transport::Tls(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Read exactly `n` bytes
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.read_exact(buf).await?,
            Transport::Tls(stream) => stream.read_exact(buf).await?,
        };
        Ok(())
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.shutdown().await?,
            Transport::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_connect_failure() {
        let result = tokio_test::block_on(Transport::connect_plain(
            "127.0.0.1",
            1,
            Duration::from_secs(1),
        ));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_timeout_surfaces_as_timeout() {
        // RFC 5737 TEST-NET address: connect attempts hang rather than refuse
        let result =
            Transport::connect_plain("192.0.2.1", 7687, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout) | Err(Error::Network(_))));
    }
}
