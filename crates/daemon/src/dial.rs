use meshecho_core::{DialOptions, NetworkContext, NetworkError};
use std::time::Duration;
use tracing::info;

/// How the client reaches its service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialStrategy {
    /// The network's default resolution of the service name
    Default,

    /// Only the terminator hosted by `identity`
    Identity {
        identity: String,
        connect_timeout: Duration,
    },
}

impl DialStrategy {
    /// Identity-targeted when a non-empty identity is given, default otherwise
    pub fn select(target_identity: Option<&str>, connect_timeout: Duration) -> Self {
        match target_identity {
            Some(identity) if !identity.is_empty() => Self::Identity {
                identity: identity.to_string(),
                connect_timeout,
            },
            _ => Self::Default,
        }
    }
}

/// Open one connection to `service` using `strategy`
///
/// Failures are returned as-is; nothing is retried.
pub async fn dial_service<C: NetworkContext>(
    context: &C,
    service: &str,
    strategy: &DialStrategy,
) -> Result<C::Connection, NetworkError> {
    match strategy {
        DialStrategy::Default => {
            info!("Dialing {}", service);
            context.dial(service).await
        }
        DialStrategy::Identity {
            identity,
            connect_timeout,
        } => {
            info!("Dialing {} hosted by {}", service, identity);
            let options = DialOptions::to_identity(identity.clone(), *connect_timeout);
            context.dial_with_options(service, &options).await
        }
    }
}
