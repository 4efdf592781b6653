//! Mailu reconciliation engine
//!
//! Keeps declared mail domains, mailboxes and aliases convergent with a
//! Mailu server.
//!
//! # Architecture
//!
//! - [`engine::Reconciler`] runs the per-key state machine, generic over
//!   [`resource::MailResource`].
//! - [`resources`] holds the three resource kinds and their side steps
//!   (alternate-name sync for domains, initial credentials for mailboxes).
//! - [`store`] defines the desired-state and secret store interfaces, with
//!   in-memory implementations.
//! - [`conditions`] and [`finalizer`] manage status and the ownership marker.
//! - [`worker::Dispatcher`] drives a reconciler from a work queue.
//!
//! # Crash safety
//!
//! A reconciliation can stop at any await point. Each run recomputes
//! everything from the stored object and a fresh remote fetch, and the
//! ownership marker is persisted before any remote mutation, so the next run
//! always picks up where the last one left off.

pub mod conditions;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod password;
pub mod resource;
pub mod resources;
pub mod status;
pub mod store;
pub mod worker;

pub use engine::{Outcome, Reconciler, ReconcilerConfig, DEFAULT_RETRY_DELAY};
pub use error::{ReconcileError, StoreError, StoreResult};
pub use resource::{MailResource, ResourceKind, Step};
pub use worker::{Dispatcher, DispatcherConfig};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::conditions::{Condition, ConditionStatus, Conditions, READY};
    pub use crate::engine::{Outcome, Reconciler, ReconcilerConfig};
    pub use crate::error::{ReconcileError, StoreError, StoreResult};
    pub use crate::resource::{MailResource, ResourceKind, Step};
    pub use crate::resources::{
        AliasResource, AliasSpec, DomainResource, DomainSpec, MailboxResource, MailboxSpec,
    };
    pub use crate::store::{
        InMemorySecretStore, InMemoryStore, ManagedResource, ObjectKey, OwnershipMarker,
        ResourceStore, SecretData, SecretStore,
    };
    pub use crate::worker::{Dispatcher, DispatcherConfig};
}
