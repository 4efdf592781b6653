//! Capability trait implemented by each managed resource kind.

use async_trait::async_trait;
use mailu_client::{ApiResponse, ClientResult};
use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::ReconcileError;
use crate::store::ManagedResource;

/// The managed resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Domain,
    Mailbox,
    Alias,
}

impl ResourceKind {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Domain => "Domain",
            ResourceKind::Mailbox => "Mailbox",
            ResourceKind::Alias => "Alias",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a resource-specific side step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Carry on with the main create or update.
    Continue,
    /// Stop here and try again after the retry delay.
    Retry(String),
    /// Stop here and record a permanent failure.
    Fail(String),
}

/// A remote resource kind the engine can reconcile.
///
/// Implementations supply key derivation, the spec-to-entity mapping, the
/// comparison projection and the remote calls. The state machine itself
/// lives in [`Reconciler`](crate::engine::Reconciler).
#[async_trait]
pub trait MailResource: Send + Sync + 'static {
    /// Declared desired state.
    type Spec: Clone + Send + Sync + 'static;

    /// Remote representation.
    type Entity: Clone + PartialEq + fmt::Debug + DeserializeOwned + Send + Sync + 'static;

    const KIND: ResourceKind;

    /// Natural key of the remote entity (domain name or email address).
    fn natural_key(spec: &Self::Spec) -> String;

    /// Build the entity the remote side should hold.
    ///
    /// Errors describe why the declared state cannot be mapped and are permanent.
    fn desired_entity(spec: &Self::Spec) -> Result<Self::Entity, String>;

    /// Comparison-safe projection of `entity`.
    ///
    /// `desired` is the freshly built desired entity; fields it leaves unset
    /// may be dropped from the projection.
    fn normalize(entity: &Self::Entity, desired: &Self::Entity) -> Self::Entity;

    async fn find(&self, key: &str) -> ClientResult<ApiResponse>;

    async fn create(&self, entity: &Self::Entity) -> ClientResult<ApiResponse>;

    async fn update(&self, key: &str, entity: &Self::Entity) -> ClientResult<ApiResponse>;

    async fn delete(&self, key: &str) -> ClientResult<ApiResponse>;

    /// Runs on the create path only, after the desired entity is built.
    async fn prepare_create(
        &self,
        _resource: &ManagedResource<Self::Spec>,
        _entity: &mut Self::Entity,
    ) -> Result<Step, ReconcileError> {
        Ok(Step::Continue)
    }

    /// Runs on the update path before the comparison. May adjust `observed`
    /// to reflect remote changes it made.
    async fn before_update(
        &self,
        _resource: &ManagedResource<Self::Spec>,
        _observed: &mut Self::Entity,
        _desired: &Self::Entity,
    ) -> Result<Step, ReconcileError> {
        Ok(Step::Continue)
    }
}

/// Canonical form of a set-valued field: sorted, deduplicated, and `None`
/// when empty.
#[must_use]
pub fn normalize_set(values: Option<&Vec<String>>) -> Option<Vec<String>> {
    let mut values: Vec<String> = values?.clone();
    values.sort();
    values.dedup();
    (!values.is_empty()).then_some(values)
}

/// Canonical form of an optional text field: `None` when empty.
#[must_use]
pub fn normalize_text(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
