//! Per-resource API capability traits.
//!
//! Each family maps one Mailu resource onto find/create/update/delete.
//! [`MailuClient`](crate::MailuClient) implements all of them; tests supply
//! their own implementations.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::models::{Alias, Domain, User};
use crate::response::ApiResponse;

/// Domain operations (`/domain`, `/alternative`).
#[async_trait]
pub trait DomainApi: Send + Sync {
    /// `GET /domain/{name}`
    async fn find_domain(&self, name: &str) -> ClientResult<ApiResponse>;

    /// `POST /domain`
    async fn create_domain(&self, domain: &Domain) -> ClientResult<ApiResponse>;

    /// `PATCH /domain/{name}`
    async fn update_domain(&self, name: &str, domain: &Domain) -> ClientResult<ApiResponse>;

    /// `DELETE /domain/{name}`
    async fn delete_domain(&self, name: &str) -> ClientResult<ApiResponse>;

    /// `DELETE /alternative/{name}`
    async fn delete_alternative(&self, name: &str) -> ClientResult<ApiResponse>;
}

/// Mailbox operations (`/user`).
#[async_trait]
pub trait UserApi: Send + Sync {
    /// `GET /user/{email}`
    async fn find_user(&self, email: &str) -> ClientResult<ApiResponse>;

    /// `POST /user`
    async fn create_user(&self, user: &User) -> ClientResult<ApiResponse>;

    /// `PATCH /user/{email}`
    async fn update_user(&self, email: &str, user: &User) -> ClientResult<ApiResponse>;

    /// `DELETE /user/{email}`
    async fn delete_user(&self, email: &str) -> ClientResult<ApiResponse>;
}

/// Alias operations (`/alias`).
#[async_trait]
pub trait AliasApi: Send + Sync {
    /// `GET /alias/{email}`
    async fn find_alias(&self, email: &str) -> ClientResult<ApiResponse>;

    /// `POST /alias`
    async fn create_alias(&self, alias: &Alias) -> ClientResult<ApiResponse>;

    /// `PATCH /alias/{email}`
    async fn update_alias(&self, email: &str, alias: &Alias) -> ClientResult<ApiResponse>;

    /// `DELETE /alias/{email}`
    async fn delete_alias(&self, email: &str) -> ClientResult<ApiResponse>;
}
