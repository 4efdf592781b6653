//! Mailu admin API HTTP client (reqwest-based).

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::api::{AliasApi, DomainApi, UserApi};
use crate::config::MailuConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{Alias, Domain, User};
use crate::response::ApiResponse;

/// HTTP client for the Mailu admin API.
///
/// Stateless apart from the connection pool: every call builds its request
/// from scratch and returns whatever status the server answered with.
#[derive(Clone)]
pub struct MailuClient {
    base_url: Url,
    api_token: String,
    timeout_secs: u64,
    http_client: Client,
}

impl std::fmt::Debug for MailuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailuClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl MailuClient {
    /// Create a new client from a validated configuration.
    pub fn new(config: MailuConfig) -> ClientResult<Self> {
        let base_url = config.validate()?;

        let http_client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::invalid_config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_token: config.api_token,
            timeout_secs: config.timeout_secs,
            http_client,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    pub fn with_http_client(config: MailuConfig, http_client: Client) -> ClientResult<Self> {
        let base_url = config.validate()?;
        Ok(Self {
            base_url,
            api_token: config.api_token,
            timeout_secs: config.timeout_secs,
            http_client,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build `{base}/{collection}[/{id}]`, percent-encoding the id.
    fn endpoint(&self, collection: &str, id: Option<&str>) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| ClientError::InvalidUrl {
                message: format!("{} cannot be used as a base", self.base_url),
            })?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                if id.is_empty() {
                    return Err(ClientError::InvalidUrl {
                        message: format!("empty identifier for /{collection}"),
                    });
                }
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> ClientResult<ApiResponse> {
        debug!(method = %method, url = %url, "Mailu request");

        let mut builder = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        debug!(method = %method, url = %url, status = %status, "Mailu response");

        Ok(ApiResponse::new(status, body))
    }

    fn map_send_error(&self, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ClientError::transport("request to Mailu API failed", error)
        }
    }

    async fn get(&self, collection: &str, id: &str) -> ClientResult<ApiResponse> {
        let url = self.endpoint(collection, Some(id))?;
        self.send::<()>(Method::GET, url, None).await
    }

    async fn post<B: Serialize + Sync>(&self, collection: &str, body: &B) -> ClientResult<ApiResponse> {
        let url = self.endpoint(collection, None)?;
        self.send(Method::POST, url, Some(body)).await
    }

    async fn patch<B: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        body: &B,
    ) -> ClientResult<ApiResponse> {
        let url = self.endpoint(collection, Some(id))?;
        self.send(Method::PATCH, url, Some(body)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> ClientResult<ApiResponse> {
        let url = self.endpoint(collection, Some(id))?;
        self.send::<()>(Method::DELETE, url, None).await
    }
}

#[async_trait]
impl DomainApi for MailuClient {
    #[instrument(skip(self))]
    async fn find_domain(&self, name: &str) -> ClientResult<ApiResponse> {
        self.get("domain", name).await
    }

    #[instrument(skip(self, domain), fields(domain = %domain.name))]
    async fn create_domain(&self, domain: &Domain) -> ClientResult<ApiResponse> {
        self.post("domain", domain).await
    }

    #[instrument(skip(self, domain))]
    async fn update_domain(&self, name: &str, domain: &Domain) -> ClientResult<ApiResponse> {
        self.patch("domain", name, domain).await
    }

    #[instrument(skip(self))]
    async fn delete_domain(&self, name: &str) -> ClientResult<ApiResponse> {
        self.delete("domain", name).await
    }

    #[instrument(skip(self))]
    async fn delete_alternative(&self, name: &str) -> ClientResult<ApiResponse> {
        self.delete("alternative", name).await
    }
}

#[async_trait]
impl UserApi for MailuClient {
    #[instrument(skip(self))]
    async fn find_user(&self, email: &str) -> ClientResult<ApiResponse> {
        self.get("user", email).await
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: &User) -> ClientResult<ApiResponse> {
        self.post("user", user).await
    }

    #[instrument(skip(self, user))]
    async fn update_user(&self, email: &str, user: &User) -> ClientResult<ApiResponse> {
        self.patch("user", email, user).await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, email: &str) -> ClientResult<ApiResponse> {
        self.delete("user", email).await
    }
}

#[async_trait]
impl AliasApi for MailuClient {
    #[instrument(skip(self))]
    async fn find_alias(&self, email: &str) -> ClientResult<ApiResponse> {
        self.get("alias", email).await
    }

    #[instrument(skip(self, alias), fields(email = %alias.email))]
    async fn create_alias(&self, alias: &Alias) -> ClientResult<ApiResponse> {
        self.post("alias", alias).await
    }

    #[instrument(skip(self, alias))]
    async fn update_alias(&self, email: &str, alias: &Alias) -> ClientResult<ApiResponse> {
        self.patch("alias", email, alias).await
    }

    #[instrument(skip(self))]
    async fn delete_alias(&self, email: &str) -> ClientResult<ApiResponse> {
        self.delete("alias", email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> MailuClient {
        MailuClient::new(MailuConfig::new(base, "token")).unwrap()
    }

    #[test]
    fn test_endpoint_with_and_without_trailing_slash() {
        let a = client("http://mailu-front:80/api/v1/");
        let b = client("http://mailu-front:80/api/v1");

        let url = a.endpoint("domain", Some("example.com")).unwrap();
        assert_eq!(url.as_str(), "http://mailu-front/api/v1/domain/example.com");
        assert_eq!(b.endpoint("domain", Some("example.com")).unwrap(), url);

        let url = b.endpoint("user", None).unwrap();
        assert_eq!(url.as_str(), "http://mailu-front/api/v1/user");
    }

    #[test]
    fn test_endpoint_encodes_identifier() {
        let c = client("https://mail.example.com/api/v1");
        let url = c.endpoint("alias", Some("a/b@example.com")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://mail.example.com/api/v1/alias/a%2Fb@example.com"
        );
    }

    #[test]
    fn test_endpoint_rejects_empty_identifier() {
        let c = client("https://mail.example.com/api/v1");
        assert!(matches!(
            c.endpoint("domain", Some("")),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = MailuClient::new(MailuConfig::new("https://mail.example.com", "")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig { .. }));
    }

    #[test]
    fn test_debug_omits_token() {
        let c = MailuClient::new(MailuConfig::new("https://mail.example.com", "s3cr3t")).unwrap();
        assert!(!format!("{c:?}").contains("s3cr3t"));
    }
}
