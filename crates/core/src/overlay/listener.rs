/// Service listener
///
/// Each listener owns a QUIC endpoint and a terminator in the service
/// directory. A background task accepts connections (at most
/// `max_connections` at a time) and runs the handshake for each one;
/// authenticated connections are queued for `accept`.

use super::handshake::Responder;
use super::{ListenOptions, NetworkError, OverlayConnection};
use crate::directory::{DirectoryError, ServiceDirectory, Terminator};
use crate::identity::{Identity, NodeId};
use crate::transport::{Endpoint, EndpointConfig, EndpointError};
use meshecho_common::config::overlay::TERMINATOR_REFRESH_SECS;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A bound, accept-ready listener for one service
pub struct OverlayListener {
    service: String,
    local_addr: SocketAddr,
    addressable: bool,
    node_id: NodeId,
    endpoint: Endpoint,
    directory: ServiceDirectory,
    incoming: mpsc::Receiver<OverlayConnection>,
    accept_task: JoinHandle<()>,
    refresh_task: JoinHandle<()>,
    /// Set once the terminator is withdrawn; held by every refresh write
    retired: Arc<Mutex<bool>>,
    closed: bool,
}

impl OverlayListener {
    pub(crate) async fn bind(
        identity: Arc<Identity>,
        directory: ServiceDirectory,
        service: &str,
        options: &ListenOptions,
        bind_host: IpAddr,
    ) -> Result<Self, NetworkError> {
        let endpoint = Endpoint::server(EndpointConfig::with_bind_addr(SocketAddr::new(
            bind_host, 0,
        )))
        .await?;
        let local_addr = endpoint.local_addr();

        let terminator = Terminator::new(
            service,
            &identity,
            local_addr,
            options.bind_using_identity,
        );
        if let Err(e) = directory.publish_terminator(&terminator).await {
            endpoint.close();
            return Err(e.into());
        }

        let max_connections = options.max_connections.max(1);
        let (tx, incoming) = mpsc::channel(max_connections);

        let accept_task = tokio::spawn(accept_loop(AcceptState {
            endpoint: endpoint.clone(),
            identity: identity.clone(),
            directory: directory.clone(),
            service: service.to_string(),
            addressable: options.bind_using_identity,
            connect_timeout: options.connect_timeout,
            slots: Arc::new(Semaphore::new(max_connections)),
            tx,
        }));

        let retired = Arc::new(Mutex::new(false));
        let refresh_task = tokio::spawn(refresh_loop(
            identity.clone(),
            directory.clone(),
            terminator,
            retired.clone(),
            Duration::from_secs(TERMINATOR_REFRESH_SECS),
        ));

        info!(
            "Listening for {} on {} (addressable: {}, max connections: {})",
            service, local_addr, options.bind_using_identity, max_connections
        );

        Ok(Self {
            service: service.to_string(),
            local_addr,
            addressable: options.bind_using_identity,
            node_id: identity.node_id(),
            endpoint,
            directory,
            incoming,
            accept_task,
            refresh_task,
            retired,
            closed: false,
        })
    }

    /// Next authenticated connection
    ///
    /// Returns `None` once the listener has been closed.
    pub async fn accept(&mut self) -> Result<Option<OverlayConnection>, NetworkError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.incoming.recv().await)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and withdraw the terminator
    pub async fn close(&mut self) -> Result<(), NetworkError> {
        if self.closed {
            return Ok(());
        }
        self.shutdown();
        retire(&self.retired, &self.directory, &self.service, &self.node_id).await?;
        self.refresh_task.abort();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.accept_task.abort();
        self.incoming.close();
        self.endpoint.close();
        debug!("Closed listener for {}", self.service);
    }
}

impl Drop for OverlayListener {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.shutdown();

        let Ok(mut retired) = self.retired.try_lock() else {
            // a refresh is mid-write; withdraw once it lands
            let retired = self.retired.clone();
            let directory = self.directory.clone();
            let service = self.service.clone();
            let node_id = self.node_id;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = retire(&retired, &directory, &service, &node_id).await {
                            warn!("Failed to withdraw terminator for {}: {}", service, e);
                        }
                    });
                }
                Err(_) => warn!(
                    "Terminator for {} left to expire: no runtime to withdraw it",
                    self.service
                ),
            }
            return;
        };

        *retired = true;
        self.refresh_task.abort();
        if let Err(e) = self
            .directory
            .withdraw_terminator_blocking(&self.service, &self.node_id)
        {
            warn!("Failed to withdraw terminator for {}: {}", self.service, e);
        }
    }
}

impl std::fmt::Debug for OverlayListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayListener")
            .field("service", &self.service)
            .field("local_addr", &self.local_addr)
            .field("addressable", &self.addressable)
            .finish()
    }
}

struct AcceptState {
    endpoint: Endpoint,
    identity: Arc<Identity>,
    directory: ServiceDirectory,
    service: String,
    addressable: bool,
    connect_timeout: Duration,
    slots: Arc<Semaphore>,
    tx: mpsc::Sender<OverlayConnection>,
}

async fn accept_loop(state: AcceptState) {
    let state = Arc::new(state);

    loop {
        // at capacity we stop accepting until a connection is dropped
        let Ok(permit) = state.slots.clone().acquire_owned().await else {
            break;
        };

        let connection = match state.endpoint.accept().await {
            Ok(connection) => connection,
            Err(EndpointError::Closed) => break,
            Err(e) => {
                debug!("Incoming connection for {} failed: {}", state.service, e);
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let remote = connection.remote_addr();
            let responder = Responder {
                identity: &state.identity,
                service: &state.service,
                addressable: state.addressable,
                directory: &state.directory,
            };

            let peer = match tokio::time::timeout(
                state.connect_timeout,
                responder.respond(&connection),
            )
            .await
            {
                Ok(Ok(peer)) => peer,
                Ok(Err(e)) => {
                    warn!(
                        "Handshake from {} for {} failed: {}",
                        remote, state.service, e
                    );
                    connection.close(1, "handshake failed");
                    return;
                }
                Err(_) => {
                    warn!("Handshake from {} for {} timed out", remote, state.service);
                    connection.close(1, "handshake timeout");
                    return;
                }
            };

            debug!("{} connected to {} from {}", peer.name(), state.service, remote);

            let accepted =
                OverlayConnection::accepted(connection, peer, state.service.clone(), permit);
            if let Err(mpsc::error::SendError(accepted)) = state.tx.send(accepted).await {
                accepted.close();
            }
        });
    }

    debug!("Accept loop for {} stopped", state.service);
}

/// Mark the terminator retired and withdraw it
///
/// Waits out a refresh that is mid-write so the terminator cannot
/// reappear after the withdrawal.
async fn retire(
    retired: &Mutex<bool>,
    directory: &ServiceDirectory,
    service: &str,
    node_id: &NodeId,
) -> Result<(), DirectoryError> {
    let mut retired = retired.lock().await;
    *retired = true;
    directory.withdraw_terminator(service, node_id).await
}

async fn refresh_loop(
    identity: Arc<Identity>,
    directory: ServiceDirectory,
    mut terminator: Terminator,
    retired: Arc<Mutex<bool>>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    // the first tick completes immediately and the terminator is fresh
    interval.tick().await;

    loop {
        interval.tick().await;

        let retired = retired.lock().await;
        if *retired {
            break;
        }
        terminator.refresh(&identity);
        if let Err(e) = directory.publish_terminator(&terminator).await {
            warn!("Failed to refresh terminator for {}: {}", terminator.service, e);
        }
    }

    debug!("Stopped refreshing terminator for {}", terminator.service);
}
