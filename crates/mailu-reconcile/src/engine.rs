//! Reconciliation engine
//!
//! One generic state machine drives every resource kind:
//!
//! 1. If deletion was requested, fetch the remote entity, delete it and
//!    release the ownership marker.
//! 2. Otherwise build the desired entity, failing before any remote call if
//!    the spec cannot be mapped.
//! 3. Fetch the remote entity (`Absent` or `Present`), persist the marker,
//!    then create or update as needed.
//!
//! Each invocation starts from the stored object and a fresh fetch; nothing
//! is carried over in memory. Transient failures return
//! [`Outcome::RequeueAfter`] instead of retrying in place.

use std::sync::Arc;
use std::time::Duration;

use mailu_client::{ApiResponse, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use crate::conditions::{ConditionStatus, READY, REASON_CREATED, REASON_ERROR, REASON_UPDATED};
use crate::error::ReconcileError;
use crate::finalizer::{ensure_marker, remove_marker};
use crate::resource::{MailResource, Step};
use crate::status::{classify, Disposition};
use crate::store::{ManagedResource, ObjectKey, ResourceStore, FORCE_RELEASE_ANNOTATION};

/// Delay before retrying after a transient failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Successful result of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the object changes.
    Done,
    /// Run again after the delay.
    RequeueAfter(Duration),
}

impl Outcome {
    /// Whether the dispatcher should run the key again.
    #[must_use]
    pub fn requeue(&self) -> bool {
        matches!(self, Outcome::RequeueAfter(_))
    }

    /// Delay before the next run, if any.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Outcome::Done => None,
            Outcome::RequeueAfter(delay) => Some(*delay),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay returned with every retryable outcome.
    pub retry_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Observed remote state.
enum Observed<E> {
    Absent,
    Present(E),
}

/// Result of the fetch step.
enum Fetched<E> {
    Observed(Observed<E>),
    Stop(Outcome),
}

/// Reconciles objects of one resource kind.
pub struct Reconciler<R: MailResource> {
    resource: R,
    store: Arc<dyn ResourceStore<R::Spec>>,
    config: ReconcilerConfig,
}

impl<R: MailResource> Reconciler<R> {
    /// Create a reconciler with the default configuration.
    pub fn new(resource: R, store: Arc<dyn ResourceStore<R::Spec>>) -> Self {
        Self {
            resource,
            store,
            config: ReconcilerConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// The store this reconciler reads and patches.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ResourceStore<R::Spec>> {
        &self.store
    }

    /// Drive one object one step closer to its desired state.
    #[instrument(skip(self, key), fields(kind = %R::KIND, key = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, ReconcileError> {
        let Some(mut resource) = self.store.get(key).await? else {
            debug!("Object no longer exists");
            return Ok(Outcome::Done);
        };
        let natural_key = R::natural_key(&resource.spec);

        if resource.deletion_requested {
            if !resource.marker.is_present() {
                debug!("Deleting object holds no marker, nothing to clean up");
                return Ok(Outcome::Done);
            }
            if resource.force_release_requested() {
                warn!(
                    natural_key = %natural_key,
                    annotation = FORCE_RELEASE_ANNOTATION,
                    "Releasing marker without deleting remote {}",
                    R::KIND
                );
                remove_marker(self.store.as_ref(), &mut resource).await?;
                return Ok(Outcome::Done);
            }

            let observed = match self.fetch(&mut resource, &natural_key).await? {
                Fetched::Observed(observed) => observed,
                Fetched::Stop(outcome) => return Ok(outcome),
            };
            return self.finalize(&mut resource, &natural_key, observed).await;
        }

        // Mapped before any remote call: the natural key itself may be unusable.
        let desired = self.desired(&mut resource, &natural_key).await?;

        let observed = match self.fetch(&mut resource, &natural_key).await? {
            Fetched::Observed(observed) => observed,
            Fetched::Stop(outcome) => return Ok(outcome),
        };

        ensure_marker(self.store.as_ref(), &mut resource).await?;

        match observed {
            Observed::Absent => self.create(&mut resource, &natural_key, desired).await,
            Observed::Present(entity) => {
                self.update(&mut resource, &natural_key, entity, desired)
                    .await
            }
        }
    }

    async fn fetch(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        natural_key: &str,
    ) -> Result<Fetched<R::Entity>, ReconcileError> {
        let operation = format!("find {}", R::KIND);

        match classify(self.resource.find(natural_key).await)? {
            Disposition::Success(response) => {
                let entity = response
                    .json::<R::Entity>()
                    .map_err(|e| ReconcileError::decode(&operation, e))?;
                Ok(Fetched::Observed(Observed::Present(entity)))
            }
            Disposition::NotFound(_) => Ok(Fetched::Observed(Observed::Absent)),
            Disposition::Retryable(reason) => Ok(Fetched::Stop(self.retry(&operation, &reason))),
            Disposition::AuthFailure(response) => Err(auth_error(&operation, &response)),
            Disposition::Permanent(response) if response.status == StatusCode::BAD_REQUEST => {
                let message = format!("{} lookup failed: {}", R::KIND, response.message());
                Ok(Fetched::Stop(self.fail(resource, message).await?))
            }
            Disposition::Permanent(response)
            | Disposition::Conflict(response)
            | Disposition::Unexpected(response) => Err(ReconcileError::unexpected(
                &operation,
                response.status,
                response.message(),
            )),
        }
    }

    async fn finalize(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        natural_key: &str,
        observed: Observed<R::Entity>,
    ) -> Result<Outcome, ReconcileError> {
        if let Observed::Absent = observed {
            remove_marker(self.store.as_ref(), resource).await?;
            info!(natural_key = %natural_key, "Remote {} already absent", R::KIND);
            return Ok(Outcome::Done);
        }

        let operation = format!("delete {}", R::KIND);
        match classify(self.resource.delete(natural_key).await)? {
            Disposition::Success(_) | Disposition::NotFound(_) => {
                remove_marker(self.store.as_ref(), resource).await?;
                info!(natural_key = %natural_key, "{} deleted", R::KIND);
                Ok(Outcome::Done)
            }
            Disposition::Retryable(reason) => Ok(self.retry(&operation, &reason)),
            Disposition::AuthFailure(response) => Err(auth_error(&operation, &response)),
            Disposition::Permanent(response)
            | Disposition::Conflict(response)
            | Disposition::Unexpected(response) => {
                let message = format!("{} deletion failed: {}", R::KIND, response.message());
                self.fail(resource, message).await
            }
        }
    }

    async fn create(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        natural_key: &str,
        mut desired: R::Entity,
    ) -> Result<Outcome, ReconcileError> {
        match self.resource.prepare_create(resource, &mut desired).await? {
            Step::Continue => {}
            Step::Retry(reason) => return Ok(self.retry("prepare create", &reason)),
            Step::Fail(message) => return self.fail(resource, message).await,
        }

        let operation = format!("create {}", R::KIND);
        match classify(self.resource.create(&desired).await)? {
            Disposition::Success(_) => {
                info!(natural_key = %natural_key, "{} created", R::KIND);
                self.set_ready(
                    resource,
                    ConditionStatus::True,
                    REASON_CREATED,
                    format!("{} created", R::KIND),
                )
                .await?;
                Ok(Outcome::Done)
            }
            Disposition::Conflict(_) => {
                info!(
                    natural_key = %natural_key,
                    "{} already exists, will reconcile as update",
                    R::KIND
                );
                Ok(Outcome::RequeueAfter(self.config.retry_delay))
            }
            Disposition::Retryable(reason) => Ok(self.retry(&operation, &reason)),
            Disposition::AuthFailure(response) => Err(auth_error(&operation, &response)),
            Disposition::NotFound(response)
            | Disposition::Permanent(response)
            | Disposition::Unexpected(response) => {
                let message = format!("{} creation failed: {}", R::KIND, response.message());
                self.fail(resource, message).await
            }
        }
    }

    async fn update(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        natural_key: &str,
        mut observed: R::Entity,
        desired: R::Entity,
    ) -> Result<Outcome, ReconcileError> {
        match self
            .resource
            .before_update(resource, &mut observed, &desired)
            .await?
        {
            Step::Continue => {}
            Step::Retry(reason) => return Ok(self.retry("prepare update", &reason)),
            Step::Fail(message) => return self.fail(resource, message).await,
        }

        if R::normalize(&observed, &desired) == R::normalize(&desired, &desired) {
            debug!(natural_key = %natural_key, "{} in sync", R::KIND);
            if !resource.conditions.is_true(READY) {
                self.set_ready(
                    resource,
                    ConditionStatus::True,
                    REASON_UPDATED,
                    format!("{} up to date", R::KIND),
                )
                .await?;
            }
            return Ok(Outcome::Done);
        }

        let operation = format!("update {}", R::KIND);
        match classify(self.resource.update(natural_key, &desired).await)? {
            Disposition::Success(_) => {
                info!(natural_key = %natural_key, "{} updated", R::KIND);
                self.set_ready(
                    resource,
                    ConditionStatus::True,
                    REASON_UPDATED,
                    format!("{} updated", R::KIND),
                )
                .await?;
                Ok(Outcome::Done)
            }
            Disposition::NotFound(_) => Ok(self.retry(&operation, "entity vanished before update")),
            Disposition::Retryable(reason) => Ok(self.retry(&operation, &reason)),
            Disposition::AuthFailure(response) => Err(auth_error(&operation, &response)),
            Disposition::Conflict(response)
            | Disposition::Permanent(response)
            | Disposition::Unexpected(response) => {
                let message = format!("{} update failed: {}", R::KIND, response.message());
                self.fail(resource, message).await
            }
        }
    }

    /// Build the desired entity, recording a permanent failure if the declared
    /// state cannot be mapped.
    async fn desired(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        natural_key: &str,
    ) -> Result<R::Entity, ReconcileError> {
        match R::desired_entity(&resource.spec) {
            Ok(entity) => Ok(entity),
            Err(message) => {
                error!(natural_key = %natural_key, error = %message, "Invalid {} spec", R::KIND);
                self.set_ready(resource, ConditionStatus::False, REASON_ERROR, message.clone())
                    .await?;
                Err(ReconcileError::InvalidSpec {
                    kind: R::KIND,
                    key: natural_key.to_string(),
                    message,
                })
            }
        }
    }

    /// Record a permanent failure. The reconciliation itself succeeds so the
    /// dispatcher does not spin on it.
    async fn fail(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        message: String,
    ) -> Result<Outcome, ReconcileError> {
        error!(key = %resource.key, error = %message, "{} reconciliation failed", R::KIND);
        self.set_ready(resource, ConditionStatus::False, REASON_ERROR, message)
            .await?;
        Ok(Outcome::Done)
    }

    fn retry(&self, operation: &str, reason: &str) -> Outcome {
        warn!(
            operation = %operation,
            reason = %reason,
            retry_after_secs = self.config.retry_delay.as_secs(),
            "Transient failure, will retry"
        );
        Outcome::RequeueAfter(self.config.retry_delay)
    }

    /// Upsert the Ready condition, writing status only when it changed.
    async fn set_ready(
        &self,
        resource: &mut ManagedResource<R::Spec>,
        status: ConditionStatus,
        reason: &str,
        message: String,
    ) -> Result<(), ReconcileError> {
        if resource.conditions.set(READY, status, reason, message) {
            self.store
                .patch_status(&resource.key, &resource.conditions)
                .await?;
        }
        Ok(())
    }
}

fn auth_error(operation: &str, response: &ApiResponse) -> ReconcileError {
    ReconcileError::from_auth_status(response.status, operation, response.message())
        .unwrap_or_else(|| ReconcileError::unexpected(operation, response.status, response.message()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        assert!(!Outcome::Done.requeue());
        assert_eq!(Outcome::Done.requeue_after(), None);

        let outcome = Outcome::RequeueAfter(DEFAULT_RETRY_DELAY);
        assert!(outcome.requeue());
        assert_eq!(outcome.requeue_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_default_config() {
        assert_eq!(ReconcilerConfig::default().retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_auth_error_mapping() {
        let err = auth_error("find Domain", &ApiResponse::empty(StatusCode::FORBIDDEN));
        assert!(matches!(err, ReconcileError::Forbidden { .. }));

        let err = auth_error("find Domain", &ApiResponse::empty(StatusCode::UNAUTHORIZED));
        assert!(matches!(err, ReconcileError::Unauthorized { .. }));
    }
}
