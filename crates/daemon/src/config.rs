/// Client and server configuration
///
/// Built once from the command line and passed down by reference; nothing
/// here changes after startup.

use crate::dial::DialStrategy;
use anyhow::{bail, Result};
use meshecho_common::config::{call_timeout, identity_dial_timeout};
use meshecho_common::types::parse_hosted_services;
use meshecho_common::{DescriptorError, IdentityConfig, ServiceDescriptor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

fn identity_file(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(IdentityConfig::default_path()?),
    }
}

/// Everything the `client` command needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub identity_file: PathBuf,
    pub service: String,
    pub greeting: String,
    /// Empty or absent means the default dial
    pub target_identity: Option<String>,
    /// Connect timeout of identity-targeted dials
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        config: Option<&Path>,
        service: Option<&str>,
        greeting: &str,
        target_identity: Option<&str>,
    ) -> Result<Self> {
        let service = match service {
            Some(service) if !service.trim().is_empty() => service.to_string(),
            _ => bail!("--service is required for the client"),
        };

        Ok(Self {
            identity_file: identity_file(config)?,
            service,
            greeting: greeting.to_string(),
            target_identity: target_identity.map(str::to_string),
            connect_timeout: identity_dial_timeout(),
            call_timeout: call_timeout(),
        })
    }

    pub fn dial_strategy(&self) -> DialStrategy {
        DialStrategy::select(self.target_identity.as_deref(), self.connect_timeout)
    }
}

/// Everything the `server` command needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub identity_file: PathBuf,
    /// Well-formed descriptors, in command line order
    pub descriptors: Vec<ServiceDescriptor>,
    /// Entries that were reported and skipped
    pub rejected: Vec<DescriptorError>,
}

impl ServerConfig {
    /// `--hostedServices` entries take precedence; a lone `--service` is
    /// hosted as a single descriptor using `--addressByIdentity`.
    pub fn new<S: AsRef<str>>(
        config: Option<&Path>,
        service: Option<&str>,
        hosted_services: &[S],
        address_by_identity: bool,
    ) -> Result<Self> {
        let service = service.filter(|s| !s.trim().is_empty());

        let (descriptors, rejected) = if hosted_services.is_empty() {
            match service {
                Some(name) => (
                    vec![ServiceDescriptor::new(name, address_by_identity)],
                    Vec::new(),
                ),
                None => bail!("nothing to host: pass --hostedServices or --service"),
            }
        } else {
            if let Some(name) = service {
                warn!("Ignoring --service {} because --hostedServices is given", name);
            }
            parse_hosted_services(hosted_services)
        };

        Ok(Self {
            identity_file: identity_file(config)?,
            descriptors,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> Option<&'static Path> {
        Some(Path::new("identity.json"))
    }

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new(path(), Some("greeter"), "world", Some("alice")).unwrap();

        assert_eq!(config.identity_file, PathBuf::from("identity.json"));
        assert_eq!(config.call_timeout, Duration::from_millis(1000));
        assert_eq!(
            config.dial_strategy(),
            DialStrategy::Identity {
                identity: "alice".into(),
                connect_timeout: Duration::from_secs(60),
            }
        );

        let config = ClientConfig::new(path(), Some("greeter"), "world", Some("")).unwrap();
        assert_eq!(config.dial_strategy(), DialStrategy::Default);
    }

    #[test]
    fn test_client_requires_service() {
        assert!(ClientConfig::new(path(), None, "world", None).is_err());
        assert!(ClientConfig::new(path(), Some(" "), "world", None).is_err());
    }

    #[test]
    fn test_server_hosted_services() {
        let config = ServerConfig::new(
            path(),
            None,
            &[
                r#"{"Name":"greeter","AddressByIdentity":true}"#,
                "not json",
                r#"{"Name":"plain"}"#,
                r#"{"Name":"greeter"}"#,
            ],
            false,
        )
        .unwrap();

        assert_eq!(
            config.descriptors,
            vec![
                ServiceDescriptor::new("greeter", true),
                ServiceDescriptor::new("plain", false),
            ]
        );
        assert_eq!(config.rejected.len(), 2);
        assert!(matches!(config.rejected[0], DescriptorError::Malformed { .. }));
        assert_eq!(
            config.rejected[1],
            DescriptorError::Duplicate("greeter".into())
        );
        assert_eq!(config.clone(), config);
    }

    #[test]
    fn test_server_single_service() {
        let none: [&str; 0] = [];
        let config = ServerConfig::new(path(), Some("greeter"), &none, true).unwrap();

        assert_eq!(config.descriptors, vec![ServiceDescriptor::new("greeter", true)]);
        assert!(config.rejected.is_empty());

        assert!(ServerConfig::new(path(), None, &none, false).is_err());
    }
}
