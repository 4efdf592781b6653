//! Mail domains.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use mailu_client::{ApiResponse, ClientResult, Domain, DomainApi};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ReconcileError;
use crate::resource::{normalize_set, normalize_text, MailResource, ResourceKind, Step};
use crate::status::{classify, Disposition};
use crate::store::ManagedResource;

/// Desired state of a mail domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    /// FQDN; the natural key.
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub max_users: i64,
    #[serde(default)]
    pub max_aliases: i64,
    #[serde(default)]
    pub max_quota_bytes: i64,
    #[serde(default)]
    pub signup_enabled: bool,
    /// Alternative names served by this domain.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Reconciles [`DomainSpec`] against `/domain`.
pub struct DomainResource {
    api: Arc<dyn DomainApi>,
}

impl DomainResource {
    pub fn new(api: Arc<dyn DomainApi>) -> Self {
        Self { api }
    }
}

/// Mailu stores domain names lowercased.
fn lowercase_names(names: Option<&Vec<String>>) -> Option<Vec<String>> {
    names.map(|names| names.iter().map(|n| n.to_ascii_lowercase()).collect())
}

/// Alternates present remotely but no longer declared.
fn stale_alternatives(observed: &Domain, desired: &Domain) -> Vec<String> {
    let wanted: BTreeSet<String> = desired
        .alternatives
        .iter()
        .flatten()
        .map(|alt| alt.to_ascii_lowercase())
        .collect();

    let mut stale: Vec<String> = observed
        .alternatives
        .iter()
        .flatten()
        .filter(|alt| !wanted.contains(&alt.to_ascii_lowercase()))
        .cloned()
        .collect();
    stale.sort();
    stale.dedup();
    stale
}

#[async_trait]
impl MailResource for DomainResource {
    type Spec = DomainSpec;
    type Entity = Domain;

    const KIND: ResourceKind = ResourceKind::Domain;

    fn natural_key(spec: &DomainSpec) -> String {
        spec.name.clone()
    }

    fn desired_entity(spec: &DomainSpec) -> Result<Domain, String> {
        if spec.name.trim().is_empty() {
            return Err("domain name must not be empty".to_string());
        }

        Ok(Domain {
            name: spec.name.clone(),
            comment: Some(spec.comment.clone()),
            max_users: Some(spec.max_users),
            max_aliases: Some(spec.max_aliases),
            max_quota_bytes: Some(spec.max_quota_bytes),
            signup_enabled: Some(spec.signup_enabled),
            alternatives: (!spec.alternatives.is_empty()).then(|| spec.alternatives.clone()),
            dns_autoconfig: None,
            managers: None,
        })
    }

    fn normalize(entity: &Domain, _desired: &Domain) -> Domain {
        Domain {
            name: entity.name.to_ascii_lowercase(),
            comment: normalize_text(entity.comment.as_ref()),
            max_users: entity.max_users,
            max_aliases: entity.max_aliases,
            max_quota_bytes: entity.max_quota_bytes,
            signup_enabled: entity.signup_enabled,
            alternatives: normalize_set(lowercase_names(entity.alternatives.as_ref()).as_ref()),
            dns_autoconfig: None,
            managers: None,
        }
    }

    async fn find(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.find_domain(key).await
    }

    async fn create(&self, entity: &Domain) -> ClientResult<ApiResponse> {
        self.api.create_domain(entity).await
    }

    async fn update(&self, key: &str, entity: &Domain) -> ClientResult<ApiResponse> {
        self.api.update_domain(key, entity).await
    }

    async fn delete(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.delete_domain(key).await
    }

    /// Remove alternates that are no longer declared, one call per name.
    ///
    /// Not atomic: a failure part way leaves the earlier names removed. The
    /// next run recomputes the difference from a fresh fetch, and a 404 for
    /// an already removed name counts as done.
    #[instrument(skip_all, fields(domain = %desired.name))]
    async fn before_update(
        &self,
        _resource: &ManagedResource<DomainSpec>,
        observed: &mut Domain,
        desired: &Domain,
    ) -> Result<Step, ReconcileError> {
        let stale = stale_alternatives(observed, desired);
        if stale.is_empty() {
            return Ok(Step::Continue);
        }

        for name in &stale {
            match classify(self.api.delete_alternative(name).await)? {
                Disposition::Success(_) | Disposition::NotFound(_) => {
                    info!(alternative = %name, "Alternative removed");
                }
                Disposition::Retryable(reason) => {
                    return Ok(Step::Retry(format!(
                        "removing alternative {name}: {reason}"
                    )));
                }
                Disposition::AuthFailure(response) => {
                    let operation = format!("delete alternative {name}");
                    return Err(ReconcileError::from_auth_status(
                        response.status,
                        &operation,
                        response.message(),
                    )
                    .unwrap_or_else(|| {
                        ReconcileError::unexpected(&operation, response.status, response.message())
                    }));
                }
                Disposition::Conflict(response)
                | Disposition::Permanent(response)
                | Disposition::Unexpected(response) => {
                    return Ok(Step::Fail(format!(
                        "Domain alternative {name} removal failed: {}",
                        response.message()
                    )));
                }
            }
        }

        if let Some(alternatives) = observed.alternatives.as_mut() {
            alternatives.retain(|alt| !stale.contains(alt));
        }
        Ok(Step::Continue)
    }
}
