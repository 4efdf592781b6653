//! Desired-state store interfaces.
//!
//! The store holds each resource's spec, ownership marker and status
//! conditions. Writes are patches scoped to the part they change, so a
//! marker write never clobbers a concurrent spec edit and vice versa.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::conditions::Conditions;
use crate::error::{StoreError, StoreResult};

/// Name of the ownership marker.
pub const FINALIZER: &str = "operator.mailu.io/finalizer";

/// Annotation that releases a deleting resource without a remote delete.
pub const FORCE_RELEASE_ANNOTATION: &str = "mailu.io/force-release";

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Store identity of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Whether this controller has claimed cleanup of the remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipMarker {
    #[default]
    Absent,
    Present,
}

impl OwnershipMarker {
    #[must_use]
    pub fn is_present(self) -> bool {
        self == OwnershipMarker::Present
    }
}

/// A resource as read from the store.
#[derive(Debug, Clone)]
pub struct ManagedResource<S> {
    pub key: ObjectKey,
    pub spec: S,
    pub conditions: Conditions,
    pub marker: OwnershipMarker,
    pub deletion_requested: bool,
    pub annotations: BTreeMap<String, String>,
}

impl<S> ManagedResource<S> {
    /// A freshly submitted resource: no marker, no status.
    pub fn new(key: ObjectKey, spec: S) -> Self {
        Self {
            key,
            spec,
            conditions: Conditions::new(),
            marker: OwnershipMarker::Absent,
            deletion_requested: false,
            annotations: BTreeMap::new(),
        }
    }

    /// Whether an operator asked to release the resource without cleanup.
    #[must_use]
    pub fn force_release_requested(&self) -> bool {
        self.annotations
            .get(FORCE_RELEASE_ANNOTATION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Access to the desired-state objects of one kind.
#[async_trait]
pub trait ResourceStore<S>: Send + Sync {
    /// Read the current object, `None` once it has been removed.
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<ManagedResource<S>>>;

    /// All object keys, for periodic resync.
    async fn list_keys(&self) -> StoreResult<Vec<ObjectKey>>;

    /// Persist the ownership marker.
    async fn patch_marker(&self, key: &ObjectKey, marker: OwnershipMarker) -> StoreResult<()>;

    /// Persist the status conditions.
    async fn patch_status(&self, key: &ObjectKey, conditions: &Conditions) -> StoreResult<()>;
}

/// Key/value data of a secret.
pub type SecretData = BTreeMap<String, String>;

/// Read access to secrets holding mailbox credentials.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret, `None` if it does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> StoreResult<Option<SecretData>>;
}

/// In-process store.
///
/// Physically removes an object once deletion has been requested and the
/// ownership marker is absent, mirroring how a cluster control plane
/// garbage-collects finalized objects.
pub struct InMemoryStore<S> {
    objects: RwLock<BTreeMap<ObjectKey, ManagedResource<S>>>,
}

impl<S> Default for InMemoryStore<S> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<S: Clone + Send + Sync> InMemoryStore<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit or replace a spec. Marker, status and deletion state are kept.
    pub async fn apply(&self, key: ObjectKey, spec: S, annotations: BTreeMap<String, String>) {
        let mut objects = self.objects.write().await;
        match objects.get_mut(&key) {
            Some(existing) => {
                existing.spec = spec;
                existing.annotations = annotations;
            }
            None => {
                let mut resource = ManagedResource::new(key.clone(), spec);
                resource.annotations = annotations;
                objects.insert(key, resource);
            }
        }
    }

    /// Set or clear one annotation.
    pub async fn annotate(&self, key: &ObjectKey, name: &str, value: Option<&str>) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let resource = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        match value {
            Some(v) => resource.annotations.insert(name.to_string(), v.to_string()),
            None => resource.annotations.remove(name),
        };
        Ok(())
    }

    /// Request deletion. Returns `true` if the object was removed right away
    /// because nothing holds a marker on it.
    pub async fn request_deletion(&self, key: &ObjectKey) -> StoreResult<bool> {
        let mut objects = self.objects.write().await;
        let resource = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;

        if resource.marker.is_present() {
            resource.deletion_requested = true;
            return Ok(false);
        }

        objects.remove(key);
        debug!(key = %key, "Removed unowned object");
        Ok(true)
    }

    /// Whether the object still exists.
    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl<S: Clone + Send + Sync> ResourceStore<S> for InMemoryStore<S> {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<ManagedResource<S>>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn list_keys(&self) -> StoreResult<Vec<ObjectKey>> {
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn patch_marker(&self, key: &ObjectKey, marker: OwnershipMarker) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let resource = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        resource.marker = marker;

        if resource.deletion_requested && !marker.is_present() {
            objects.remove(key);
            debug!(key = %key, "Removed finalized object");
        }
        Ok(())
    }

    async fn patch_status(&self, key: &ObjectKey, conditions: &Conditions) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let resource = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        resource.conditions = conditions.clone();
        Ok(())
    }
}

/// In-process secret store.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<(String, String), SecretData>>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a secret.
    pub async fn insert(&self, namespace: impl Into<String>, name: impl Into<String>, data: SecretData) {
        self.secrets
            .write()
            .await
            .insert((namespace.into(), name.into()), data);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> StoreResult<Option<SecretData>> {
        Ok(self
            .secrets
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
