/// Overlay handshake
///
/// Runs on the first bidirectional stream of every overlay connection.
/// The dialer proves its enrolled identity by signing a hello; the
/// listener checks it against the service directory and answers with a
/// signature over the dialer's nonce, proving it holds the key its
/// terminator was published with.

use super::NetworkError;
use crate::directory::{ServiceDirectory, Terminator};
use crate::identity::{CurrentIdentity, Identity};
use crate::transport::{Connection, FrameCodec};
use meshecho_common::config::protocol;
use meshecho_common::Timestamp;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// How long a rejecting listener waits for the dialer to read the verdict
const REJECT_LINGER: Duration = Duration::from_secs(1);

/// Sent by the dialer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ClientHello {
    pub version: u32,
    pub service: String,
    pub identity: String,
    /// Identity the dialer expects to reach, if any
    pub target_identity: Option<String>,
    /// Hex encoded challenge
    pub nonce: String,
    pub timestamp: Timestamp,
    pub signature: String,
}

impl ClientHello {
    fn new(identity: &Identity, service: &str, target_identity: Option<&str>) -> Self {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hello = Self {
            version: protocol::VERSION,
            service: service.to_string(),
            identity: identity.name().to_string(),
            target_identity: target_identity.map(str::to_string),
            nonce: hex::encode(nonce),
            timestamp: Timestamp::now(),
            signature: String::new(),
        };
        hello.signature = identity.sign_hex(&hello.signing_data());
        hello
    }

    fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.service.as_bytes());
        data.push(0);
        data.extend_from_slice(self.identity.as_bytes());
        data.push(0);
        if let Some(target) = &self.target_identity {
            data.extend_from_slice(target.as_bytes());
        }
        data.push(0);
        data.extend_from_slice(self.nonce.as_bytes());
        data.extend_from_slice(&self.timestamp.as_secs().to_le_bytes());
        data
    }
}

/// Sent by the listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum ServerHello {
    Accepted { identity: String, signature: String },
    Rejected { reason: String },
}

fn acceptance_data(nonce: &str, service: &str, identity: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(nonce.as_bytes());
    data.push(0);
    data.extend_from_slice(service.as_bytes());
    data.push(0);
    data.extend_from_slice(identity.as_bytes());
    data
}

/// Dialer side: authenticate to the listener behind `terminator`
pub(crate) async fn initiate(
    connection: &Connection,
    identity: &Identity,
    terminator: &Terminator,
    target_identity: Option<&str>,
) -> Result<(), NetworkError> {
    let hello = ClientHello::new(identity, &terminator.service, target_identity);

    let (send, mut recv) = connection.open_bi().await?;
    FrameCodec::write_final(send, &hello).await?;

    let reply: ServerHello = FrameCodec::read_frame(&mut recv)
        .await?
        .ok_or_else(|| NetworkError::Handshake("listener closed the handshake stream".into()))?;

    match reply {
        ServerHello::Accepted {
            identity: listener,
            signature,
        } => {
            if listener != terminator.identity {
                return Err(NetworkError::Handshake(format!(
                    "expected {}, listener claims {}",
                    terminator.identity, listener
                )));
            }

            terminator
                .public_key
                .verify_hex(
                    &acceptance_data(&hello.nonce, &hello.service, &listener),
                    &signature,
                )
                .map_err(|_| {
                    NetworkError::Handshake("listener signature verification failed".into())
                })?;

            debug!("Handshake with {} for {} complete", listener, hello.service);
            Ok(())
        }
        ServerHello::Rejected { reason } => Err(NetworkError::Rejected(reason)),
    }
}

/// What a listener needs to judge an inbound hello
pub(crate) struct Responder<'a> {
    pub identity: &'a Identity,
    pub service: &'a str,
    pub addressable: bool,
    pub directory: &'a ServiceDirectory,
}

impl Responder<'_> {
    /// Listener side: authenticate the dialer and answer its hello
    ///
    /// Returns the dialer's identity on success. Rejections are sent to
    /// the dialer before the error is returned.
    pub(crate) async fn respond(
        &self,
        connection: &Connection,
    ) -> Result<CurrentIdentity, NetworkError> {
        let (send, mut recv) = connection.accept_bi().await?;

        let hello: ClientHello = FrameCodec::read_frame(&mut recv)
            .await?
            .ok_or_else(|| NetworkError::Handshake("dialer sent no hello".into()))?;

        match self.check(&hello).await {
            Ok(peer) => {
                let signature = self.identity.sign_hex(&acceptance_data(
                    &hello.nonce,
                    self.service,
                    self.identity.name(),
                ));
                let reply = ServerHello::Accepted {
                    identity: self.identity.name().to_string(),
                    signature,
                };
                FrameCodec::write_final(send, &reply).await?;
                Ok(peer)
            }
            Err(reason) => {
                let reply = ServerHello::Rejected {
                    reason: reason.clone(),
                };
                FrameCodec::write_final(send, &reply).await?;
                let _ = tokio::time::timeout(REJECT_LINGER, connection.closed()).await;
                Err(NetworkError::Rejected(reason))
            }
        }
    }

    async fn check(&self, hello: &ClientHello) -> Result<CurrentIdentity, String> {
        if hello.version != protocol::VERSION {
            return Err(format!("unsupported protocol version {}", hello.version));
        }

        if hello.service != self.service {
            return Err(format!("this listener does not serve {:?}", hello.service));
        }

        let skew = hello.timestamp.abs_diff(Timestamp::now());
        if skew > Duration::from_secs(protocol::HANDSHAKE_MAX_SKEW_SECS) {
            return Err(format!("hello timestamp is off by {}s", skew.as_secs()));
        }

        let record = self
            .directory
            .lookup_identity(&hello.identity)
            .await
            .map_err(|e| e.to_string())?;

        record
            .public_key
            .verify_hex(&hello.signing_data(), &hello.signature)
            .map_err(|_| format!("bad signature from {}", hello.identity))?;

        if let Some(target) = &hello.target_identity {
            if !self.addressable {
                return Err(format!("{} is not addressable by identity", self.service));
            }
            if target != self.identity.name() {
                return Err(format!(
                    "this listener is hosted by {}, not {}",
                    self.identity.name(),
                    target
                ));
            }
        }

        Ok(CurrentIdentity::new(
            record.name,
            record.node_id,
            record.public_key,
        ))
    }
}
