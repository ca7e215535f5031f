/// Shared service directory
///
/// A directory tree shared by every process of one overlay. It is the
/// trust root for identity names and the place listeners announce
/// themselves:
///
/// ```text
/// <root>/identities/<name>.json
/// <root>/services/<hex(service)>/<node_id>.json
/// ```

use super::{IdentityRecord, Terminator};
use crate::identity::NodeId;
use meshecho_common::config::overlay::TERMINATOR_TTL_SECS;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File-backed service directory
#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    root: PathBuf,
    terminator_ttl: Duration,
}

impl ServiceDirectory {
    /// Open the directory rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            terminator_ttl: Duration::from_secs(TERMINATOR_TTL_SECS),
        }
    }

    pub fn with_terminator_ttl(mut self, ttl: Duration) -> Self {
        self.terminator_ttl = ttl;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enroll an identity
    ///
    /// Re-enrolling the same key is a no-op; a name already bound to a
    /// different key is refused.
    pub async fn enroll(&self, record: &IdentityRecord) -> Result<(), DirectoryError> {
        validate_identity_name(&record.name)?;

        match self.lookup_identity(&record.name).await {
            Ok(existing) if existing.matches(&record.public_key) => return Ok(()),
            Ok(_) => return Err(DirectoryError::NameTaken(record.name.clone())),
            Err(DirectoryError::IdentityNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        write_json(&self.identity_path(&record.name), record).await?;
        debug!("Enrolled identity {} ({})", record.name, record.node_id);
        Ok(())
    }

    /// Look up an enrolled identity by name
    pub async fn lookup_identity(&self, name: &str) -> Result<IdentityRecord, DirectoryError> {
        validate_identity_name(name)?;

        let path = self.identity_path(name);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DirectoryError::IdentityNotFound(name.to_string()))
            }
            Err(e) => return Err(DirectoryError::Io(e)),
        };

        let record: IdentityRecord = serde_json::from_str(&json)
            .map_err(|e| DirectoryError::InvalidRecord(format!("{}: {}", path.display(), e)))?;

        if record.name != name {
            return Err(DirectoryError::InvalidRecord(format!(
                "{}: record names identity {:?}",
                path.display(),
                record.name
            )));
        }

        Ok(record)
    }

    /// Publish (or refresh) a terminator
    pub async fn publish_terminator(&self, terminator: &Terminator) -> Result<(), DirectoryError> {
        if !terminator.verify() {
            return Err(DirectoryError::InvalidRecord(format!(
                "terminator for {} by {} has a bad signature",
                terminator.service, terminator.identity
            )));
        }

        let path = self.terminator_path(&terminator.service, &terminator.node_id);
        write_json(&path, terminator).await?;

        debug!(
            "Published terminator {} -> {} ({})",
            terminator.service, terminator.address, terminator.identity
        );
        Ok(())
    }

    /// Remove a terminator
    pub async fn withdraw_terminator(
        &self,
        service: &str,
        node_id: &NodeId,
    ) -> Result<(), DirectoryError> {
        match tokio::fs::remove_file(self.terminator_path(service, node_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DirectoryError::Io(e)),
        }
    }

    /// Remove a terminator from a non-async context
    pub fn withdraw_terminator_blocking(
        &self,
        service: &str,
        node_id: &NodeId,
    ) -> Result<(), DirectoryError> {
        match std::fs::remove_file(self.terminator_path(service, node_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DirectoryError::Io(e)),
        }
    }

    /// Live terminators for a service, freshest first
    ///
    /// Expired, unsigned or unenrolled terminators are skipped.
    pub async fn terminators(&self, service: &str) -> Result<Vec<Terminator>, DirectoryError> {
        let dir = self.service_dir(service);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DirectoryError::Io(e)),
        };

        let mut terminators = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.load_terminator(&path, service).await {
                Ok(Some(terminator)) => terminators.push(terminator),
                Ok(None) => {}
                Err(e) => warn!("Ignoring terminator {}: {}", path.display(), e),
            }
        }

        terminators.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(terminators)
    }

    async fn load_terminator(
        &self,
        path: &Path,
        service: &str,
    ) -> Result<Option<Terminator>, DirectoryError> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            // withdrawn while listing
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DirectoryError::Io(e)),
        };

        let terminator: Terminator = serde_json::from_str(&json)
            .map_err(|e| DirectoryError::InvalidRecord(e.to_string()))?;

        if terminator.service != service {
            return Err(DirectoryError::InvalidRecord(format!(
                "filed under {:?} but names {:?}",
                service, terminator.service
            )));
        }

        if terminator.is_expired(self.terminator_ttl) {
            debug!(
                "Skipping expired terminator {} ({})",
                terminator.service, terminator.identity
            );
            return Ok(None);
        }

        if !terminator.verify() {
            return Err(DirectoryError::InvalidRecord("bad signature".to_string()));
        }

        let record = self.lookup_identity(&terminator.identity).await?;
        if !record.matches(&terminator.public_key) {
            return Err(DirectoryError::InvalidRecord(format!(
                "key does not match enrolled identity {}",
                terminator.identity
            )));
        }

        Ok(Some(terminator))
    }

    fn identity_path(&self, name: &str) -> PathBuf {
        self.root.join("identities").join(format!("{}.json", name))
    }

    fn service_dir(&self, service: &str) -> PathBuf {
        // service names are free-form; hex keeps them path safe
        self.root.join("services").join(hex::encode(service))
    }

    fn terminator_path(&self, service: &str, node_id: &NodeId) -> PathBuf {
        self.service_dir(service)
            .join(format!("{}.json", node_id.to_hex()))
    }
}

/// Identity names become file names, so they are restricted to a safe set
fn validate_identity_name(name: &str) -> Result<(), DirectoryError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));

    if valid {
        Ok(())
    } else {
        Err(DirectoryError::InvalidName(name.to_string()))
    }
}

/// Write a record atomically (temp file + rename)
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DirectoryError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DirectoryError::InvalidRecord(e.to_string()))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(())
}

/// Service directory errors
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Identity {0:?} is not enrolled")]
    IdentityNotFound(String),

    #[error("Identity name {0:?} is already enrolled with a different key")]
    NameTaken(String),

    #[error("Invalid identity name {0:?}")]
    InvalidName(String),

    #[error("Invalid directory record: {0}")]
    InvalidRecord(String),

    #[error("Directory IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use meshecho_common::Timestamp;

    fn address() -> std::net::SocketAddr {
        "127.0.0.1:4433".parse().unwrap()
    }

    async fn enrolled(directory: &ServiceDirectory, name: &str) -> Identity {
        let identity = Identity::generate(name);
        directory
            .enroll(&IdentityRecord::from_identity(&identity))
            .await
            .unwrap();
        identity
    }

    #[tokio::test]
    async fn test_enroll_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path());

        let alice = enrolled(&directory, "alice").await;

        let record = directory.lookup_identity("alice").await.unwrap();
        assert!(record.matches(&alice.public_key()));

        // same key again is fine
        directory
            .enroll(&IdentityRecord::from_identity(&alice))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enroll_rejects_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path());

        enrolled(&directory, "alice").await;
        let impostor = Identity::generate("alice");

        let err = directory
            .enroll(&IdentityRecord::from_identity(&impostor))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NameTaken(_)));
    }

    #[tokio::test]
    async fn test_lookup_unknown_identity() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path());

        assert!(matches!(
            directory.lookup_identity("nobody").await,
            Err(DirectoryError::IdentityNotFound(_))
        ));
        assert!(matches!(
            directory.lookup_identity("../etc/passwd").await,
            Err(DirectoryError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_and_list_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path());
        let alice = enrolled(&directory, "alice").await;
        let bob = enrolled(&directory, "bob").await;

        let mut older = Terminator::new("greeter", &alice, address(), true);
        older.updated_at = Timestamp::from_secs(older.updated_at.as_secs() - 5);
        older.resign(&alice);
        let newer = Terminator::new("greeter", &bob, address(), false);

        directory.publish_terminator(&older).await.unwrap();
        directory.publish_terminator(&newer).await.unwrap();
        directory
            .publish_terminator(&Terminator::new("other/service", &alice, address(), false))
            .await
            .unwrap();

        let found = directory.terminators("greeter").await.unwrap();
        let names: Vec<_> = found.iter().map(|t| t.identity.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);

        assert_eq!(directory.terminators("other/service").await.unwrap().len(), 1);
        assert!(directory.terminators("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawn_and_expired_terminators_are_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path()).with_terminator_ttl(Duration::from_secs(30));
        let alice = enrolled(&directory, "alice").await;
        let bob = enrolled(&directory, "bob").await;

        let live = Terminator::new("greeter", &alice, address(), false);
        directory.publish_terminator(&live).await.unwrap();

        let mut stale = Terminator::new("greeter", &bob, address(), false);
        stale.updated_at = Timestamp::from_secs(stale.updated_at.as_secs() - 120);
        stale.resign(&bob);
        directory.publish_terminator(&stale).await.unwrap();

        assert_eq!(directory.terminators("greeter").await.unwrap().len(), 1);

        directory
            .withdraw_terminator("greeter", &alice.node_id())
            .await
            .unwrap();
        assert!(directory.terminators("greeter").await.unwrap().is_empty());

        // withdrawing twice is harmless
        directory
            .withdraw_terminator_blocking("greeter", &alice.node_id())
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminator_of_unenrolled_identity_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ServiceDirectory::new(dir.path());
        let stranger = Identity::generate("stranger");

        directory
            .publish_terminator(&Terminator::new("greeter", &stranger, address(), false))
            .await
            .unwrap();

        assert!(directory.terminators("greeter").await.unwrap().is_empty());
    }
}
