/// Echo service
///
/// The single greeter method every hosted service exposes, plus the
/// typed client stub used by the `client` command.

use async_trait::async_trait;
use meshecho_core::{CurrentIdentity, RpcClient, RpcClientError, RpcError, RpcService};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fully qualified name of the greeting method
pub const SAY_HELLO: &str = "helloworld.Greeter/SayHello";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloReply {
    pub message: String,
}

/// Reply text for `greeting` served by `identity` under `service`
pub fn echo_reply(service: &str, identity: &str, greeting: &str) -> String {
    if greeting == "ping" {
        format!("{} {}-->pong", service, identity)
    } else {
        format!("{} {} {}", service, identity, greeting)
    }
}

/// Greeter bound to one hosted service and the hosting identity
#[derive(Debug, Clone)]
pub struct EchoHandler {
    service_name: String,
    identity: Arc<CurrentIdentity>,
}

impl EchoHandler {
    pub fn new(service_name: impl Into<String>, identity: Arc<CurrentIdentity>) -> Self {
        Self {
            service_name: service_name.into(),
            identity,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn identity(&self) -> &CurrentIdentity {
        &self.identity
    }

    pub fn say_hello(&self, request: HelloRequest) -> HelloReply {
        info!(
            service = %self.service_name,
            identity = %self.identity.name(),
            "Received greeting {:?}",
            request.name
        );

        HelloReply {
            message: echo_reply(&self.service_name, self.identity.name(), &request.name),
        }
    }
}

#[async_trait]
impl RpcService for EchoHandler {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            SAY_HELLO => {
                let request: HelloRequest =
                    serde_json::from_value(params).map_err(RpcError::invalid_params)?;
                serde_json::to_value(self.say_hello(request))
                    .map_err(|e| RpcError::Internal(e.to_string()))
            }
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }
}

/// Typed client for the greeter method
pub struct GreeterClient {
    rpc: RpcClient,
}

impl GreeterClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn say_hello(
        &self,
        request: &HelloRequest,
        timeout: Duration,
    ) -> Result<HelloReply, RpcClientError> {
        self.rpc.call(SAY_HELLO, request, timeout).await
    }

    pub fn close(&self) {
        self.rpc.close();
    }
}
