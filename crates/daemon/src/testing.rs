/// Recording doubles for the network context and the RPC server seam

use crate::echo::EchoHandler;
use crate::host::ServeListener;
use async_trait::async_trait;
use meshecho_core::{
    CurrentIdentity, DialOptions, Identity, ListenOptions, NetworkContext, NetworkError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Dial(String),
    DialWithOptions(String, DialOptions),
    Listen(String),
    ListenWithOptions(String, ListenOptions),
}

#[derive(Debug)]
pub struct MockListener {
    pub service: String,
    pub options: Option<ListenOptions>,
}

#[derive(Debug)]
pub struct MockConnection {
    pub service: String,
}

/// Network context that records every call and fails for chosen services
pub struct MockContext {
    identity: Arc<CurrentIdentity>,
    failing: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl MockContext {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Arc::new(Identity::generate(identity).to_current()),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, service: &str) -> Self {
        self.failing.insert(service.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, service: &str, call: Call) -> Result<(), NetworkError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(service) {
            Err(NetworkError::NoTerminator(service.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NetworkContext for MockContext {
    type Listener = MockListener;
    type Connection = MockConnection;

    async fn authenticate(&self) -> Result<Arc<CurrentIdentity>, NetworkError> {
        Ok(self.identity.clone())
    }

    fn current_identity(&self) -> Result<Arc<CurrentIdentity>, NetworkError> {
        Ok(self.identity.clone())
    }

    async fn dial(&self, service: &str) -> Result<MockConnection, NetworkError> {
        self.record(service, Call::Dial(service.to_string()))?;
        Ok(MockConnection {
            service: service.to_string(),
        })
    }

    async fn dial_with_options(
        &self,
        service: &str,
        options: &DialOptions,
    ) -> Result<MockConnection, NetworkError> {
        self.record(
            service,
            Call::DialWithOptions(service.to_string(), options.clone()),
        )?;
        Ok(MockConnection {
            service: service.to_string(),
        })
    }

    async fn listen(&self, service: &str) -> Result<MockListener, NetworkError> {
        self.record(service, Call::Listen(service.to_string()))?;
        Ok(MockListener {
            service: service.to_string(),
            options: None,
        })
    }

    async fn listen_with_options(
        &self,
        service: &str,
        options: &ListenOptions,
    ) -> Result<MockListener, NetworkError> {
        self.record(
            service,
            Call::ListenWithOptions(service.to_string(), options.clone()),
        )?;
        Ok(MockListener {
            service: service.to_string(),
            options: Some(options.clone()),
        })
    }
}

/// What a serving task was started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub listener: String,
    pub handler_service: String,
    pub handler_identity: String,
}

/// RPC server double that reports each listener it is handed and then
/// blocks like a real server
pub struct RecordingServe {
    tx: mpsc::UnboundedSender<Served>,
}

impl RecordingServe {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Served>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ServeListener<MockListener> for RecordingServe {
    async fn serve(&self, listener: MockListener, handler: EchoHandler) -> Result<(), NetworkError> {
        let _ = self.tx.send(Served {
            listener: listener.service,
            handler_service: handler.service_name().to_string(),
            handler_identity: handler.identity().name().to_string(),
        });
        std::future::pending::<()>().await;
        Ok(())
    }
}
