//! Mailu admin API client
//!
//! Typed models and a thin reqwest transport for the Mailu `/api/v1`
//! endpoints that manage domains, mailboxes and aliases.
//!
//! # Design
//!
//! The client never interprets status codes. Every completed exchange is
//! returned as an [`ApiResponse`]; only failures to complete the exchange
//! (connection errors, timeouts) surface as [`ClientError`]. Callers decide
//! what a 404 or a 409 means for them.
//!
//! # Example
//!
//! ```ignore
//! use mailu_client::prelude::*;
//!
//! let client = MailuClient::new(MailuConfig::new("http://mailu-front/api/v1", token))?;
//! let response = client.find_domain("example.com").await?;
//! if response.status == StatusCode::NOT_FOUND {
//!     // create it
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod response;

pub use api::{AliasApi, DomainApi, UserApi};
pub use client::MailuClient;
pub use config::MailuConfig;
pub use error::{ClientError, ClientResult};
pub use models::{Alias, Domain, User};
pub use reqwest::StatusCode;
pub use response::ApiResponse;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::api::{AliasApi, DomainApi, UserApi};
    pub use crate::client::MailuClient;
    pub use crate::config::MailuConfig;
    pub use crate::error::{ClientError, ClientResult};
    pub use crate::models::{Alias, Domain, User};
    pub use crate::response::ApiResponse;
    pub use reqwest::StatusCode;
}
