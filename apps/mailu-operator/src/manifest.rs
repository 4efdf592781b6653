//! Declarative manifest of domains, mailboxes, aliases and secrets

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use mailu_reconcile::prelude::*;
use mailu_reconcile::store::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OperatorError, OperatorResult};

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Root object of a manifest file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub domains: Vec<ManifestObject<DomainSpec>>,
    #[serde(default)]
    pub users: Vec<ManifestObject<MailboxSpec>>,
    #[serde(default)]
    pub aliases: Vec<ManifestObject<AliasSpec>>,
    #[serde(default)]
    pub secrets: Vec<ManifestSecret>,
}

/// Whether an object should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    /// Delete the remote entity and release the object
    Absent,
}

/// One declared object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestObject<S> {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub state: DesiredState,
    pub spec: S,
}

impl<S> ManifestObject<S> {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// A secret referenced by `passwordSecret`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSecret {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub data: SecretData,
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> OperatorResult<Manifest> {
    if !path.exists() {
        return Err(OperatorError::Manifest(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| OperatorError::Io(format!("Failed to read file {}: {}", path.display(), e)))?;

    let manifest: Manifest = serde_yaml::from_str(&content).map_err(|e| {
        let location = if let Some(loc) = e.location() {
            format!(" at line {}, column {}", loc.line(), loc.column())
        } else {
            String::new()
        };
        OperatorError::Manifest(format!("Invalid YAML{location}: {e}"))
    })?;

    manifest.validate()?;
    Ok(manifest)
}

impl Manifest {
    /// Reject empty and duplicate object names.
    pub fn validate(&self) -> OperatorResult<()> {
        validate_objects("domain", &self.domains)?;
        validate_objects("user", &self.users)?;
        validate_objects("alias", &self.aliases)?;

        let mut seen = BTreeSet::new();
        for secret in &self.secrets {
            if secret.name.is_empty() {
                return Err(OperatorError::Manifest("secret name must not be empty".into()));
            }
            if !seen.insert((secret.namespace.as_str(), secret.name.as_str())) {
                return Err(OperatorError::Manifest(format!(
                    "duplicate secret '{}/{}'",
                    secret.namespace, secret.name
                )));
            }
        }
        Ok(())
    }

    /// Number of declared objects, secrets excluded.
    pub fn object_count(&self) -> usize {
        self.domains.len() + self.users.len() + self.aliases.len()
    }
}

fn validate_objects<S>(kind: &str, objects: &[ManifestObject<S>]) -> OperatorResult<()> {
    let mut seen = BTreeSet::new();
    for object in objects {
        if object.name.is_empty() {
            return Err(OperatorError::Manifest(format!("{kind} name must not be empty")));
        }
        if !seen.insert(object.key()) {
            return Err(OperatorError::Manifest(format!(
                "duplicate {kind} '{}'",
                object.key()
            )));
        }
    }
    Ok(())
}

/// In-memory stores populated from a manifest
pub struct ManifestStores {
    pub domains: Arc<InMemoryStore<DomainSpec>>,
    pub users: Arc<InMemoryStore<MailboxSpec>>,
    pub aliases: Arc<InMemoryStore<AliasSpec>>,
    pub secrets: Arc<InMemorySecretStore>,
}

impl ManifestStores {
    /// Populate the stores.
    ///
    /// Objects declared `absent` are loaded as owned and already marked for
    /// deletion, so the first reconciliation removes the remote entity.
    pub async fn load(manifest: Manifest) -> OperatorResult<Self> {
        let stores = Self {
            domains: Arc::new(InMemoryStore::new()),
            users: Arc::new(InMemoryStore::new()),
            aliases: Arc::new(InMemoryStore::new()),
            secrets: Arc::new(InMemorySecretStore::new()),
        };

        for secret in manifest.secrets {
            stores
                .secrets
                .insert(secret.namespace, secret.name, secret.data)
                .await;
        }

        load_objects(&stores.domains, manifest.domains).await?;
        load_objects(&stores.users, manifest.users).await?;
        load_objects(&stores.aliases, manifest.aliases).await?;

        Ok(stores)
    }
}

async fn load_objects<S>(store: &InMemoryStore<S>, objects: Vec<ManifestObject<S>>) -> OperatorResult<()>
where
    S: Clone + Send + Sync,
{
    for object in objects {
        let key = object.key();
        store.apply(key.clone(), object.spec, object.annotations).await;

        if object.state == DesiredState::Absent {
            store.patch_marker(&key, OwnershipMarker::Present).await?;
            store.request_deletion(&key).await?;
            debug!(key = %key, "Loaded object pending deletion");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
domains:
  - name: example-com
    spec:
      name: example.com
      maxUsers: 10
      maxAliases: 20
      maxQuotaBytes: 1000000000
      alternatives: [example.org]
users:
  - name: john
    namespace: mail
    spec:
      name: john
      domain: example.com
      displayedName: John Doe
      enabled: true
      enableIMAP: true
      passwordSecret: john-credentials
      passwordKey: password
      replyStartDate: "2024-07-01"
aliases:
  - name: old-alias
    state: absent
    annotations:
      mailu.io/force-release: "true"
    spec:
      name: old
      domain: example.com
      destination: [john@example.com]
secrets:
  - name: john-credentials
    namespace: mail
    data:
      password: s3cret
"#;

    fn write_manifest(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_manifest() {
        let file = write_manifest(MANIFEST);
        let manifest = load_manifest(file.path()).unwrap();

        assert_eq!(manifest.object_count(), 3);

        let domain = &manifest.domains[0];
        assert_eq!(domain.namespace, "default");
        assert_eq!(domain.state, DesiredState::Present);
        assert_eq!(domain.spec.max_users, 10);
        assert!(!domain.spec.signup_enabled);
        assert_eq!(domain.spec.alternatives, vec!["example.org".to_string()]);

        let user = &manifest.users[0];
        assert_eq!(user.key(), ObjectKey::new("mail", "john"));
        assert!(user.spec.enable_imap);
        assert!(!user.spec.enable_pop);
        assert_eq!(user.spec.quota_bytes, -1);
        assert_eq!(user.spec.password_secret.as_deref(), Some("john-credentials"));
        assert_eq!(user.spec.reply_start_date.as_deref(), Some("2024-07-01"));

        assert_eq!(manifest.aliases[0].state, DesiredState::Absent);
        assert_eq!(manifest.secrets[0].data.get("password").map(String::as_str), Some("s3cret"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_manifest(Path::new("/nonexistent/manifest.yaml")).unwrap_err();
        assert!(matches!(err, OperatorError::Manifest(_)));
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let file = write_manifest("domains:\n  - name: [unclosed\n");
        let err = load_manifest(file.path()).unwrap_err();
        assert!(err.to_string().contains("line"));
    }

    #[test]
    fn test_missing_spec_is_rejected() {
        let file = write_manifest("domains:\n  - name: example-com\n");
        assert!(load_manifest(file.path()).is_err());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let file = write_manifest(
            r#"
aliases:
  - name: a
    spec: {name: a, domain: example.com}
  - name: a
    spec: {name: b, domain: example.com}
"#,
        );
        let err = load_manifest(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate alias"));
    }

    #[test]
    fn test_same_name_in_other_namespace_is_allowed() {
        let file = write_manifest(
            r#"
aliases:
  - name: a
    spec: {name: a, domain: example.com}
  - name: a
    namespace: other
    spec: {name: a, domain: example.org}
"#,
        );
        assert!(load_manifest(file.path()).is_ok());
    }

    #[tokio::test]
    async fn test_load_stores() {
        let file = write_manifest(MANIFEST);
        let manifest = load_manifest(file.path()).unwrap();
        let stores = ManifestStores::load(manifest).await.unwrap();

        let domain = stores
            .domains
            .get(&ObjectKey::new("default", "example-com"))
            .await
            .unwrap()
            .unwrap();
        assert!(!domain.marker.is_present());
        assert!(!domain.deletion_requested);

        let alias = stores
            .aliases
            .get(&ObjectKey::new("default", "old-alias"))
            .await
            .unwrap()
            .unwrap();
        assert!(alias.marker.is_present());
        assert!(alias.deletion_requested);
        assert!(alias.force_release_requested());

        let secret = stores
            .secrets
            .get_secret("mail", "john-credentials")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secret.get("password").map(String::as_str), Some("s3cret"));
    }
}
