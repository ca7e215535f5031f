use meshecho_common::config::protocol;
use quinn::Endpoint as QuinnEndpoint;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// TLS server name shared by every endpoint; peers are authenticated by
/// the overlay handshake, not by the certificate.
const SERVER_NAME: &str = "meshecho.local";

/// QUIC endpoint for creating connections
#[derive(Clone)]
pub struct Endpoint {
    /// Quinn endpoint
    inner: QuinnEndpoint,

    /// Local address
    local_addr: SocketAddr,
}

impl Endpoint {
    /// Create an endpoint that accepts incoming connections
    pub async fn server(config: EndpointConfig) -> Result<Self, EndpointError> {
        let server_config = Self::create_server_config(&config)?;
        let client_config = Self::create_client_config(&config)?;

        let mut endpoint = QuinnEndpoint::server(server_config, config.bind_addr)
            .map_err(|e| EndpointError::BindFailed(e.to_string()))?;

        endpoint.set_default_client_config(client_config);

        let local_addr = endpoint.local_addr()?;

        Ok(Self {
            inner: endpoint,
            local_addr,
        })
    }

    /// Create an endpoint that only dials out
    pub async fn client(config: EndpointConfig) -> Result<Self, EndpointError> {
        let client_config = Self::create_client_config(&config)?;

        let mut endpoint = QuinnEndpoint::client(config.bind_addr)
            .map_err(|e| EndpointError::BindFailed(e.to_string()))?;

        endpoint.set_default_client_config(client_config);

        let local_addr = endpoint.local_addr()?;

        Ok(Self {
            inner: endpoint,
            local_addr,
        })
    }

    fn transport_config(config: &EndpointConfig) -> Result<quinn::TransportConfig, EndpointError> {
        let idle_timeout = quinn::IdleTimeout::try_from(config.idle_timeout)
            .map_err(|e| EndpointError::ConfigCreation(format!("Invalid idle timeout: {}", e)))?;

        let mut transport_config = quinn::TransportConfig::default();
        transport_config.max_idle_timeout(Some(idle_timeout));
        transport_config.keep_alive_interval(Some(config.keep_alive_interval));
        transport_config.max_concurrent_bidi_streams(config.max_concurrent_streams.into());
        transport_config.max_concurrent_uni_streams(0u32.into());

        Ok(transport_config)
    }

    /// Create server configuration with self-signed certificate
    fn create_server_config(config: &EndpointConfig) -> Result<quinn::ServerConfig, EndpointError> {
        let cert = rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_string()])
            .map_err(|e| EndpointError::CertGeneration(e.to_string()))?;

        let cert_der = cert.cert.der().to_vec();
        let key_der = cert.key_pair.serialize_der();

        let cert_chain = vec![rustls::pki_types::CertificateDer::from(cert_der)];
        let key = rustls::pki_types::PrivateKeyDer::try_from(key_der)
            .map_err(|e| EndpointError::CertGeneration(format!("Invalid key: {:?}", e)))?;

        let server_crypto = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| {
            EndpointError::ConfigCreation(format!("Failed to set protocol versions: {:?}", e))
        })?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| EndpointError::ConfigCreation(e.to_string()))?;

        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto).map_err(|e| {
                EndpointError::ConfigCreation(format!(
                    "Failed to create QUIC server config: {:?}",
                    e
                ))
            })?,
        ));

        server_config.transport_config(Arc::new(Self::transport_config(config)?));

        Ok(server_config)
    }

    /// Create client configuration (accepts any certificate)
    fn create_client_config(config: &EndpointConfig) -> Result<quinn::ClientConfig, EndpointError> {
        let crypto = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| {
            EndpointError::ConfigCreation(format!("Failed to set protocol versions: {:?}", e))
        })?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();

        let mut client_config = quinn::ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(crypto).map_err(|e| {
                EndpointError::ConfigCreation(format!(
                    "Failed to create QUIC client config: {:?}",
                    e
                ))
            })?,
        ));

        client_config.transport_config(Arc::new(Self::transport_config(config)?));

        Ok(client_config)
    }

    /// Connect to a remote endpoint
    pub async fn connect(&self, addr: SocketAddr) -> Result<super::Connection, EndpointError> {
        let connecting = self
            .inner
            .connect(addr, SERVER_NAME)
            .map_err(|e| EndpointError::ConnectionFailed(e.to_string()))?;

        let connection = connecting
            .await
            .map_err(|e| EndpointError::ConnectionFailed(e.to_string()))?;

        Ok(super::Connection::new(connection))
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<super::Connection, EndpointError> {
        let incoming = self.inner.accept().await.ok_or(EndpointError::Closed)?;

        let connection = incoming
            .await
            .map_err(|e| EndpointError::ConnectionFailed(e.to_string()))?;

        Ok(super::Connection::new(connection))
    }

    /// Get local address
    /// If bound to 0.0.0.0, returns 127.0.0.1 instead for local connections
    pub fn local_addr(&self) -> SocketAddr {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
        }
        addr
    }

    /// Close the endpoint
    pub fn close(&self) {
        self.inner.close(0u32.into(), b"shutdown");
    }
}

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    pub idle_timeout: Duration,

    pub keep_alive_interval: Duration,

    /// Concurrent bidirectional streams a peer may open
    pub max_concurrent_streams: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            idle_timeout: Duration::from_secs(protocol::IDLE_TIMEOUT_SECS),
            keep_alive_interval: Duration::from_secs(protocol::KEEPALIVE_INTERVAL_SECS),
            max_concurrent_streams: 100,
        }
    }
}

impl EndpointConfig {
    /// Create configuration with specific bind address
    pub fn with_bind_addr(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}

/// Skip certificate verification; identities are checked by the handshake
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Endpoint errors
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Failed to bind to address: {0}")]
    BindFailed(String),

    #[error("Failed to generate certificate: {0}")]
    CertGeneration(String),

    #[error("Failed to create config: {0}")]
    ConfigCreation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Endpoint is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
