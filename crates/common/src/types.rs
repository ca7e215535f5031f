use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A service hosted by the server process
///
/// Decoded from one `--hostedServices` value, e.g.
/// `{"Name": "greeter", "AddressByIdentity": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name, used for overlay lookup and in reply text
    #[serde(rename = "Name", alias = "name")]
    pub name: String,

    /// Bind the listener so that dialers can address this identity
    #[serde(rename = "AddressByIdentity", alias = "addressByIdentity", default)]
    pub address_by_identity: bool,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, address_by_identity: bool) -> Self {
        Self {
            name: name.into(),
            address_by_identity,
        }
    }

    /// Decode a descriptor from its JSON form
    pub fn from_json(input: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self =
            serde_json::from_str(input).map_err(|e| DescriptorError::Malformed {
                input: input.to_string(),
                reason: e.to_string(),
            })?;

        if descriptor.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName(input.to_string()));
        }

        Ok(descriptor)
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address_by_identity {
            write!(f, "{} (addressable)", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Decode every hosted service entry
///
/// Entries that fail to decode, or repeat an earlier name, are returned as
/// errors; the remaining descriptors keep their input order.
pub fn parse_hosted_services<S: AsRef<str>>(
    entries: &[S],
) -> (Vec<ServiceDescriptor>, Vec<DescriptorError>) {
    let mut descriptors = Vec::new();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for entry in entries {
        match ServiceDescriptor::from_json(entry.as_ref()) {
            Ok(descriptor) => {
                if seen.insert(descriptor.name.clone()) {
                    descriptors.push(descriptor);
                } else {
                    errors.push(DescriptorError::Duplicate(descriptor.name));
                }
            }
            Err(e) => errors.push(e),
        }
    }

    (descriptors, errors)
}

/// Timestamp in Unix epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn elapsed(&self) -> Duration {
        let now = Self::now();
        Duration::from_secs(now.0.saturating_sub(self.0))
    }

    /// Distance between two timestamps regardless of order
    pub fn abs_diff(&self, other: Timestamp) -> Duration {
        Duration::from_secs(self.0.abs_diff(other.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_json() {
        let descriptor =
            ServiceDescriptor::from_json(r#"{"Name":"greeter","AddressByIdentity":true}"#).unwrap();
        assert_eq!(descriptor, ServiceDescriptor::new("greeter", true));
    }

    #[test]
    fn test_descriptor_address_flag_defaults_false() {
        let descriptor = ServiceDescriptor::from_json(r#"{"Name":"plain"}"#).unwrap();
        assert!(!descriptor.address_by_identity);
    }

    #[test]
    fn test_descriptor_accepts_lower_camel_keys() {
        let descriptor =
            ServiceDescriptor::from_json(r#"{"name":"greeter","addressByIdentity":true}"#).unwrap();
        assert_eq!(descriptor.name, "greeter");
        assert!(descriptor.address_by_identity);
    }

    #[test]
    fn test_descriptor_rejects_malformed_json() {
        let err = ServiceDescriptor::from_json("{Name: greeter").unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }

    #[test]
    fn test_descriptor_rejects_missing_or_empty_name() {
        assert!(matches!(
            ServiceDescriptor::from_json(r#"{"AddressByIdentity":true}"#),
            Err(DescriptorError::Malformed { .. })
        ));
        assert!(matches!(
            ServiceDescriptor::from_json(r#"{"Name":"  "}"#),
            Err(DescriptorError::EmptyName(_))
        ));
    }

    #[test]
    fn test_parse_hosted_services_skips_bad_entries() {
        let entries = vec![
            r#"{"Name":"greeter","AddressByIdentity":true}"#.to_string(),
            "not json".to_string(),
            r#"{"Name":"plain"}"#.to_string(),
            r#"{"Name":"greeter"}"#.to_string(),
        ];

        let (descriptors, errors) = parse_hosted_services(&entries);

        assert_eq!(
            descriptors,
            vec![
                ServiceDescriptor::new("greeter", true),
                ServiceDescriptor::new("plain", false),
            ]
        );
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], DescriptorError::Malformed { .. }));
        assert_eq!(errors[1], DescriptorError::Duplicate("greeter".to_string()));
    }

    #[test]
    fn test_timestamp() {
        let ts1 = Timestamp::now();
        let ts2 = Timestamp::from_secs(ts1.as_secs() - 10);
        assert!(ts2.elapsed().as_secs() >= 10);
        assert_eq!(ts1.abs_diff(ts2), ts2.abs_diff(ts1));
    }
}
