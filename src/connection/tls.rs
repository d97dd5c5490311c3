//! TLS configuration for encrypted (`bolt+s`) endpoints

use crate::{Error, Result};
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

/// TLS configuration for encrypted connections.
///
/// By default, server certificates are validated against the bundled webpki
/// roots plus the platform trust store. A custom CA can be supplied for
/// servers with private certificates.
///
/// # Examples
///
/// ```ignore
/// use bolt_driver::connection::TlsConfig;
///
/// // System trust (production)
/// let tls = TlsConfig::builder().build()?;
///
/// // Custom CA certificate
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/path/to/ca.pem")
///     .build()?;
///
/// // Development only: skip verification entirely
/// let tls = TlsConfig::builder()
///     .danger_accept_invalid_certs(true)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// The compiled rustls `ClientConfig`
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
    use_native_roots: bool,
    danger_accept_invalid_certs: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_cert_path: None,
            use_native_roots: true,
            danger_accept_invalid_certs: false,
        }
    }
}

impl TlsConfigBuilder {
    /// Add a custom CA certificate file (PEM format) to the trust roots
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Whether to include the platform trust store (default: true)
    pub fn use_native_roots(mut self, enabled: bool) -> Self {
        self.use_native_roots = enabled;
        self
    }

    /// Accept any server certificate without verification.
    ///
    /// Development only. The connection is still encrypted but the peer is
    /// not authenticated.
    pub fn danger_accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.danger_accept_invalid_certs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TlsConfig> {
        if self.danger_accept_invalid_certs {
            let config = ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification))
                .with_no_client_auth();
            return Ok(TlsConfig {
                client_config: Arc::new(config),
            });
        }

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        if self.use_native_roots {
            let native = rustls_native_certs::load_native_certs();
            for cert in native.certs {
                // Individual unparseable platform certs are skipped, not fatal
                let _ = roots.add(cert);
            }
        }

        if let Some(path) = &self.ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Config(format!("cannot read CA file {}: {}", path, e)))?;
            let mut reader = std::io::Cursor::new(pem);
            for item in rustls_pemfile::read_all(&mut reader) {
                match item {
                    Ok(rustls_pemfile::Item::X509Certificate(cert)) => {
                        roots.add(cert).map_err(|e| {
                            Error::Config(format!("invalid CA certificate in {}: {}", path, e))
                        })?;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(Error::Config(format!(
                            "cannot parse PEM file {}: {}",
                            path, e
                        )))
                    }
                }
            }
        }

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(TlsConfig {
            client_config: Arc::new(config),
        })
    }
}

/// Certificate verifier that accepts everything (development only)
#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls_pki_types::CertificateDer<'_>,
        _intermediates: &[rustls_pki_types::CertificateDer<'_>],
        _server_name: &rustls_pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls_pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build() {
        let tls = TlsConfig::builder().use_native_roots(false).build();
        assert!(tls.is_ok());
    }

    #[test]
    fn test_danger_build() {
        let tls = TlsConfig::builder()
            .danger_accept_invalid_certs(true)
            .build();
        assert!(tls.is_ok());
    }

    #[test]
    fn test_missing_ca_file_fails() {
        let err = TlsConfig::builder()
            .ca_cert_path("/nonexistent/ca.pem")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
