//! Ownership marker management.
//!
//! The marker is added as its own store write before any remote create or
//! delete, so a crash between the two always leaves a marker behind and the
//! remote entity can still be cleaned up. It is only removed once the remote
//! entity is confirmed gone.

use tracing::{debug, info};

use crate::error::StoreResult;
use crate::store::{ManagedResource, OwnershipMarker, ResourceStore, FINALIZER};

/// Persist the marker if it is not already present.
///
/// Returns `true` if a store write was made.
pub async fn ensure_marker<S, St>(store: &St, resource: &mut ManagedResource<S>) -> StoreResult<bool>
where
    S: Send + Sync,
    St: ResourceStore<S> + ?Sized,
{
    if resource.marker.is_present() {
        return Ok(false);
    }

    store
        .patch_marker(&resource.key, OwnershipMarker::Present)
        .await?;
    resource.marker = OwnershipMarker::Present;
    debug!(key = %resource.key, finalizer = FINALIZER, "Added ownership marker");
    Ok(true)
}

/// Clear the marker if present, letting the store drop a deleting object.
///
/// Returns `true` if a store write was made.
pub async fn remove_marker<S, St>(store: &St, resource: &mut ManagedResource<S>) -> StoreResult<bool>
where
    S: Send + Sync,
    St: ResourceStore<S> + ?Sized,
{
    if !resource.marker.is_present() {
        return Ok(false);
    }

    store
        .patch_marker(&resource.key, OwnershipMarker::Absent)
        .await?;
    resource.marker = OwnershipMarker::Absent;
    info!(key = %resource.key, finalizer = FINALIZER, "Released ownership marker");
    Ok(true)
}
