/// Multi-service host
///
/// Provisions one listener per service descriptor and runs an
/// independent RPC server on each, all bound to the same hosting
/// identity. Starting returns immediately; the servers run until their
/// listener closes or the process exits.

use crate::echo::EchoHandler;
use async_trait::async_trait;
use meshecho_common::ServiceDescriptor;
use meshecho_core::{
    CurrentIdentity, ListenOptions, NetworkContext, NetworkError, OverlayListener, RpcServer,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Obtain a bound listener for `descriptor`
///
/// Addressable descriptors get an options-listener reachable by the
/// hosting identity; the rest get a default listener.
pub async fn provision_listener<C: NetworkContext>(
    context: &C,
    descriptor: &ServiceDescriptor,
) -> Result<C::Listener, NetworkError> {
    if descriptor.address_by_identity {
        context
            .listen_with_options(&descriptor.name, &ListenOptions::addressable())
            .await
    } else {
        context.listen(&descriptor.name).await
    }
}

/// Runs an RPC server for one listener until it closes
#[async_trait]
pub trait ServeListener<L>: Send + Sync + 'static {
    async fn serve(&self, listener: L, handler: EchoHandler) -> Result<(), NetworkError>;
}

/// Serves listeners with the overlay RPC server
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcServe;

#[async_trait]
impl ServeListener<OverlayListener> for RpcServe {
    async fn serve(
        &self,
        listener: OverlayListener,
        handler: EchoHandler,
    ) -> Result<(), NetworkError> {
        RpcServer::serve(listener, Arc::new(handler)).await
    }
}

/// A service whose server task is running
#[derive(Debug)]
pub struct RunningService {
    pub name: String,
    pub task: JoinHandle<()>,
}

/// Outcome of starting the configured services
#[derive(Debug, Default)]
pub struct RunningServices {
    pub services: Vec<RunningService>,
    /// Descriptors whose listener could not be provisioned
    pub failures: Vec<(String, NetworkError)>,
}

impl RunningServices {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Hosts any number of services on one network context
pub struct ServiceHost<C, S> {
    context: Arc<C>,
    server: Arc<S>,
    identity: Arc<CurrentIdentity>,
}

impl<C, S> ServiceHost<C, S>
where
    C: NetworkContext,
    S: ServeListener<C::Listener>,
{
    /// The context must already be authenticated; its identity is taken
    /// once here and shared by every service.
    pub fn new(context: Arc<C>, server: S) -> Result<Self, NetworkError> {
        let identity = context.current_identity()?;
        Ok(Self {
            context,
            server: Arc::new(server),
            identity,
        })
    }

    pub fn identity(&self) -> &CurrentIdentity {
        &self.identity
    }

    /// Provision and launch every descriptor
    ///
    /// A descriptor whose listener cannot be provisioned is logged and
    /// recorded in `failures`; the others still start.
    pub async fn start(&self, descriptors: &[ServiceDescriptor]) -> RunningServices {
        let mut running = RunningServices::default();

        for descriptor in descriptors {
            let listener = match provision_listener(self.context.as_ref(), descriptor).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to listen for {}: {}", descriptor, e);
                    running.failures.push((descriptor.name.clone(), e));
                    continue;
                }
            };

            let handler = EchoHandler::new(descriptor.name.clone(), self.identity.clone());
            let server = self.server.clone();
            let name = descriptor.name.clone();

            let task = tokio::spawn(async move {
                match server.serve(listener, handler).await {
                    Ok(()) => info!("Service {} stopped", name),
                    Err(e) => error!("Service {} failed: {}", name, e),
                }
            });

            info!(
                "Hosting {} as {} (addressable: {})",
                descriptor.name,
                self.identity.name(),
                descriptor.address_by_identity
            );
            running.services.push(RunningService {
                name: descriptor.name.clone(),
                task,
            });
        }

        running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockContext, RecordingServe, Served};

    fn descriptors(entries: &[(&str, bool)]) -> Vec<ServiceDescriptor> {
        entries
            .iter()
            .map(|(name, addressable)| ServiceDescriptor::new(*name, *addressable))
            .collect()
    }

    #[tokio::test]
    async fn test_plain_descriptor_uses_default_listen() {
        let context = MockContext::new("alice");

        let listener = provision_listener(&context, &ServiceDescriptor::new("plain", false))
            .await
            .unwrap();

        assert!(listener.options.is_none());
        assert_eq!(context.calls(), vec![Call::Listen("plain".into())]);
    }

    #[tokio::test]
    async fn test_addressable_descriptor_uses_listen_options() {
        let context = MockContext::new("alice");

        provision_listener(&context, &ServiceDescriptor::new("greeter", true))
            .await
            .unwrap();

        assert_eq!(
            context.calls(),
            vec![Call::ListenWithOptions(
                "greeter".into(),
                ListenOptions::addressable()
            )]
        );
    }

    #[tokio::test]
    async fn test_each_descriptor_gets_its_own_server() {
        let context = Arc::new(MockContext::new("alice"));
        let (server, mut served) = RecordingServe::new();
        let host = ServiceHost::new(context.clone(), server).unwrap();

        let running = host
            .start(&descriptors(&[("greeter", true), ("plain", false), ("weather", false)]))
            .await;

        assert_eq!(running.names(), vec!["greeter", "plain", "weather"]);
        assert!(running.failures.is_empty());
        assert_eq!(context.calls().len(), 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(served.recv().await.unwrap());
        }
        seen.sort_by(|a, b| a.listener.cmp(&b.listener));

        let expected: Vec<Served> = ["greeter", "plain", "weather"]
            .iter()
            .map(|name| Served {
                listener: name.to_string(),
                handler_service: name.to_string(),
                handler_identity: "alice".into(),
            })
            .collect();
        assert_eq!(seen, expected);

        // start does not wait for the servers
        assert!(running.services.iter().all(|s| !s.task.is_finished()));
    }

    #[tokio::test]
    async fn test_failed_descriptor_does_not_stop_the_rest() {
        let context = Arc::new(MockContext::new("alice").failing("broken"));
        let (server, mut served) = RecordingServe::new();
        let host = ServiceHost::new(context, server).unwrap();

        let running = host
            .start(&descriptors(&[("broken", true), ("greeter", false)]))
            .await;

        assert_eq!(running.names(), vec!["greeter"]);
        assert_eq!(running.failures.len(), 1);
        assert_eq!(running.failures[0].0, "broken");
        assert_eq!(served.recv().await.unwrap().listener, "greeter");
    }

    #[tokio::test]
    async fn test_nothing_to_host() {
        let context = Arc::new(MockContext::new("alice"));
        let (server, _served) = RecordingServe::new();
        let host = ServiceHost::new(context, server).unwrap();

        let running = host.start(&[]).await;
        assert!(running.is_empty());
        assert_eq!(host.identity().name(), "alice");
    }
}
