use super::handshake;
use super::{DialOptions, ListenOptions, NetworkError, OverlayConnection, OverlayListener};
use crate::directory::{DirectoryError, ServiceDirectory, Terminator};
use crate::identity::{CurrentIdentity, Identity};
use crate::transport::{Endpoint, EndpointConfig};
use async_trait::async_trait;
use meshecho_common::IdentityConfig;
use rand::RngCore;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Authenticated dial/listen primitives of an overlay network
#[async_trait]
pub trait NetworkContext: Send + Sync {
    type Listener: Send + 'static;
    type Connection: Send + 'static;

    /// Verify the local identity and fix it for the life of the context
    ///
    /// Calling it again returns the identity acquired the first time.
    async fn authenticate(&self) -> Result<Arc<CurrentIdentity>, NetworkError>;

    /// The identity acquired by `authenticate`
    fn current_identity(&self) -> Result<Arc<CurrentIdentity>, NetworkError>;

    /// Dial a service using the network's default resolution
    async fn dial(&self, service: &str) -> Result<Self::Connection, NetworkError>;

    async fn dial_with_options(
        &self,
        service: &str,
        options: &DialOptions,
    ) -> Result<Self::Connection, NetworkError>;

    /// Bind a default (not addressable) listener
    async fn listen(&self, service: &str) -> Result<Self::Listener, NetworkError>;

    async fn listen_with_options(
        &self,
        service: &str,
        options: &ListenOptions,
    ) -> Result<Self::Listener, NetworkError>;
}

/// Network context backed by a shared service directory and QUIC
pub struct OverlayContext {
    identity: Arc<Identity>,
    directory: ServiceDirectory,
    bind_host: IpAddr,
    current: OnceLock<Arc<CurrentIdentity>>,
}

impl OverlayContext {
    pub fn new(identity: Identity, directory: ServiceDirectory, bind_host: IpAddr) -> Self {
        Self {
            identity: Arc::new(identity),
            directory,
            bind_host,
            current: OnceLock::new(),
        }
    }

    /// Build a context from a loaded identity file
    pub fn from_config(config: &IdentityConfig) -> Result<Self, NetworkError> {
        let identity = Identity::from_config(config)?;
        Ok(Self::new(
            identity,
            ServiceDirectory::new(&config.directory),
            config.bind_host,
        ))
    }

    /// Load the identity file at `path` and build a context from it
    pub fn load(path: &Path) -> Result<Self, NetworkError> {
        let config = IdentityConfig::from_file(path)?;
        Self::from_config(&config)
    }

    fn require_authenticated(&self) -> Result<(), NetworkError> {
        self.current
            .get()
            .map(|_| ())
            .ok_or(NetworkError::NotAuthenticated)
    }

    fn select_terminator(
        service: &str,
        terminators: Vec<Terminator>,
        identity: Option<&str>,
    ) -> Result<Terminator, NetworkError> {
        match identity {
            Some(identity) => terminators
                .into_iter()
                .find(|t| t.addressable && t.identity == identity)
                .ok_or_else(|| NetworkError::IdentityNotHosting {
                    service: service.to_string(),
                    identity: identity.to_string(),
                }),
            // sorted freshest first
            None => terminators
                .into_iter()
                .next()
                .ok_or_else(|| NetworkError::NoTerminator(service.to_string())),
        }
    }

    async fn connect(
        &self,
        terminator: &Terminator,
        target_identity: Option<&str>,
    ) -> Result<OverlayConnection, NetworkError> {
        let unspecified = match terminator.address {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let endpoint =
            Endpoint::client(EndpointConfig::with_bind_addr(SocketAddr::new(unspecified, 0)))
                .await?;

        let connection = endpoint.connect(terminator.address).await?;
        handshake::initiate(&connection, &self.identity, terminator, target_identity).await?;

        let peer = CurrentIdentity::new(
            terminator.identity.clone(),
            terminator.node_id,
            terminator.public_key,
        );
        Ok(OverlayConnection::dialed(
            connection,
            peer,
            terminator.service.clone(),
            endpoint,
        ))
    }
}

#[async_trait]
impl NetworkContext for OverlayContext {
    type Listener = OverlayListener;
    type Connection = OverlayConnection;

    async fn authenticate(&self) -> Result<Arc<CurrentIdentity>, NetworkError> {
        if let Some(current) = self.current.get() {
            return Ok(current.clone());
        }

        let name = self.identity.name();
        let record = self
            .directory
            .lookup_identity(name)
            .await
            .map_err(|e| match e {
                DirectoryError::IdentityNotFound(_) => NetworkError::Authentication(format!(
                    "identity {} is not enrolled in {}",
                    name,
                    self.directory.root().display()
                )),
                other => NetworkError::Directory(other),
            })?;

        if !record.matches(&self.identity.public_key()) {
            return Err(NetworkError::Authentication(format!(
                "identity {} is enrolled with a different key",
                name
            )));
        }

        let mut challenge = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut challenge);
        let signature = self.identity.sign(&challenge);
        if !record.public_key.verify(&challenge, &signature) {
            return Err(NetworkError::Authentication(
                "secret key does not produce valid signatures".into(),
            ));
        }

        let current = self
            .current
            .get_or_init(|| Arc::new(self.identity.to_current()))
            .clone();

        info!("Authenticated as {} ({})", current.name(), current.node_id());
        Ok(current)
    }

    fn current_identity(&self) -> Result<Arc<CurrentIdentity>, NetworkError> {
        self.current
            .get()
            .cloned()
            .ok_or(NetworkError::NotAuthenticated)
    }

    async fn dial(&self, service: &str) -> Result<OverlayConnection, NetworkError> {
        self.dial_with_options(service, &DialOptions::default()).await
    }

    async fn dial_with_options(
        &self,
        service: &str,
        options: &DialOptions,
    ) -> Result<OverlayConnection, NetworkError> {
        self.require_authenticated()?;

        let target = options.identity.as_deref().filter(|id| !id.is_empty());
        let terminators = self.directory.terminators(service).await?;
        let terminator = Self::select_terminator(service, terminators, target)?;

        debug!(
            "Dialing {} at {} (hosted by {})",
            service, terminator.address, terminator.identity
        );

        tokio::time::timeout(options.connect_timeout, self.connect(&terminator, target))
            .await
            .map_err(|_| NetworkError::Timeout {
                service: service.to_string(),
                timeout_ms: options.connect_timeout.as_millis(),
            })?
    }

    async fn listen(&self, service: &str) -> Result<OverlayListener, NetworkError> {
        self.listen_with_options(service, &ListenOptions::default())
            .await
    }

    async fn listen_with_options(
        &self,
        service: &str,
        options: &ListenOptions,
    ) -> Result<OverlayListener, NetworkError> {
        self.require_authenticated()?;

        OverlayListener::bind(
            self.identity.clone(),
            self.directory.clone(),
            service,
            options,
            self.bind_host,
        )
        .await
    }
}
