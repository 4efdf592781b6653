//! Mail aliases.

use std::sync::Arc;

use async_trait::async_trait;
use mailu_client::{Alias, AliasApi, ApiResponse, ClientResult};
use serde::{Deserialize, Serialize};

use crate::resource::{normalize_set, normalize_text, MailResource, ResourceKind};

/// Desired state of an alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasSpec {
    /// Local part of the address.
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub comment: String,
    /// Addresses mail is delivered to.
    #[serde(default)]
    pub destination: Vec<String>,
    /// Treat `name` as a SQL LIKE pattern.
    #[serde(default)]
    pub wildcard: bool,
}

impl AliasSpec {
    /// Full address, `name@domain`.
    #[must_use]
    pub fn email(&self) -> String {
        format!("{}@{}", self.name, self.domain)
    }
}

/// Reconciles [`AliasSpec`] against `/alias`.
pub struct AliasResource {
    api: Arc<dyn AliasApi>,
}

impl AliasResource {
    pub fn new(api: Arc<dyn AliasApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MailResource for AliasResource {
    type Spec = AliasSpec;
    type Entity = Alias;

    const KIND: ResourceKind = ResourceKind::Alias;

    fn natural_key(spec: &AliasSpec) -> String {
        spec.email()
    }

    fn desired_entity(spec: &AliasSpec) -> Result<Alias, String> {
        if spec.name.is_empty() || spec.domain.is_empty() {
            return Err("alias name and domain must not be empty".to_string());
        }

        Ok(Alias {
            email: spec.email(),
            comment: Some(spec.comment.clone()),
            destination: Some(spec.destination.clone()),
            wildcard: Some(spec.wildcard),
        })
    }

    fn normalize(entity: &Alias, _desired: &Alias) -> Alias {
        Alias {
            email: entity.email.to_ascii_lowercase(),
            comment: normalize_text(entity.comment.as_ref()),
            destination: normalize_set(entity.destination.as_ref()),
            wildcard: Some(entity.wildcard.unwrap_or(false)),
        }
    }

    async fn find(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.find_alias(key).await
    }

    async fn create(&self, entity: &Alias) -> ClientResult<ApiResponse> {
        self.api.create_alias(entity).await
    }

    async fn update(&self, key: &str, entity: &Alias) -> ClientResult<ApiResponse> {
        self.api.update_alias(key, entity).await
    }

    async fn delete(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.delete_alias(key).await
    }
}
