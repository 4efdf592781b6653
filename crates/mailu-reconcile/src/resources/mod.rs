//! The three managed resource kinds.

pub mod alias;
pub mod domain;
pub mod mailbox;

pub use alias::{AliasResource, AliasSpec};
pub use domain::{DomainResource, DomainSpec};
pub use mailbox::{MailboxResource, MailboxSpec};
