//! Mailboxes (Mailu users).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use mailu_client::{ApiResponse, ClientResult, User, UserApi};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ReconcileError;
use crate::password::{generate_password, GENERATED_PASSWORD_LEN};
use crate::resource::{normalize_set, normalize_text, MailResource, ResourceKind, Step};
use crate::store::{ManagedResource, SecretStore};

/// Date format of the reply window fields.
const DATE_FORMAT: &str = "%Y-%m-%d";

fn default_quota_bytes() -> i64 {
    -1
}

/// Desired state of a mailbox.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSpec {
    /// Local part of the address.
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub allow_spoofing: bool,
    /// Force a password change at next login.
    #[serde(default)]
    pub change_password: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub displayed_name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "enableIMAP")]
    pub enable_imap: bool,
    #[serde(default, rename = "enablePOP")]
    pub enable_pop: bool,
    #[serde(default)]
    pub forward_enabled: bool,
    #[serde(default)]
    pub forward_destination: Vec<String>,
    #[serde(default)]
    pub forward_keep: bool,
    #[serde(default)]
    pub global_admin: bool,
    /// Secret holding the initial password.
    #[serde(default)]
    pub password_secret: Option<String>,
    /// Key inside `password_secret`.
    #[serde(default)]
    pub password_key: Option<String>,
    /// Storage quota, -1 for unlimited.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: i64,
    /// Literal initial password.
    #[serde(default)]
    pub raw_password: Option<String>,
    #[serde(default)]
    pub reply_enabled: bool,
    #[serde(default)]
    pub reply_subject: String,
    #[serde(default)]
    pub reply_body: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub reply_start_date: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub reply_end_date: Option<String>,
    #[serde(default)]
    pub spam_enabled: bool,
    #[serde(default)]
    pub spam_mark_as_read: bool,
    #[serde(default)]
    pub spam_threshold: i64,
}

impl MailboxSpec {
    /// Full address, `name@domain`.
    #[must_use]
    pub fn email(&self) -> String {
        format!("{}@{}", self.name, self.domain)
    }
}

impl fmt::Debug for MailboxSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxSpec")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("enabled", &self.enabled)
            .field("password_secret", &self.password_secret)
            .field("password_key", &self.password_key)
            .field("raw_password", &self.raw_password.as_ref().map(|_| "***"))
            .field("quota_bytes", &self.quota_bytes)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: Option<&String>) -> Result<Option<NaiveDate>, String> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, DATE_FORMAT)
                .map_err(|e| format!("invalid {field} '{v}': {e}"))
        })
        .transpose()
}

/// Reconciles [`MailboxSpec`] against `/user`.
pub struct MailboxResource {
    api: Arc<dyn UserApi>,
    secrets: Arc<dyn SecretStore>,
}

impl MailboxResource {
    pub fn new(api: Arc<dyn UserApi>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { api, secrets }
    }

    /// Set the initial password on `entity`: literal, then secret, then
    /// generated.
    async fn set_initial_password(
        &self,
        resource: &ManagedResource<MailboxSpec>,
        entity: &mut User,
    ) -> Result<Step, ReconcileError> {
        let spec = &resource.spec;

        let password = if let Some(raw) = non_empty(spec.raw_password.as_ref()) {
            raw.to_string()
        } else {
            match (
                non_empty(spec.password_secret.as_ref()),
                non_empty(spec.password_key.as_ref()),
            ) {
                (Some(secret), Some(key)) => {
                    let namespace = &resource.key.namespace;
                    let Some(data) = self.secrets.get_secret(namespace, secret).await? else {
                        return Ok(Step::Retry(format!(
                            "password secret {namespace}/{secret} not found"
                        )));
                    };
                    match data.get(key) {
                        Some(password) if !password.is_empty() => password.clone(),
                        _ => {
                            return Ok(Step::Retry(format!(
                                "password secret {namespace}/{secret} has no key {key}"
                            )));
                        }
                    }
                }
                (None, None) => {
                    info!(email = %spec.email(), "Generating initial password");
                    generate_password(GENERATED_PASSWORD_LEN)
                }
                _ => {
                    return Ok(Step::Fail(
                        "passwordSecret and passwordKey must be set together".to_string(),
                    ));
                }
            }
        };

        debug!(email = %entity.email, "Initial password resolved");
        entity.raw_password = Some(password);
        Ok(Step::Continue)
    }
}

#[async_trait]
impl MailResource for MailboxResource {
    type Spec = MailboxSpec;
    type Entity = User;

    const KIND: ResourceKind = ResourceKind::Mailbox;

    fn natural_key(spec: &MailboxSpec) -> String {
        spec.email()
    }

    fn desired_entity(spec: &MailboxSpec) -> Result<User, String> {
        if spec.name.is_empty() || spec.domain.is_empty() {
            return Err("mailbox name and domain must not be empty".to_string());
        }

        Ok(User {
            email: spec.email(),
            allow_spoofing: Some(spec.allow_spoofing),
            change_pw_next_login: Some(spec.change_password),
            comment: Some(spec.comment.clone()),
            displayed_name: Some(spec.displayed_name.clone()),
            enable_imap: Some(spec.enable_imap),
            enable_pop: Some(spec.enable_pop),
            enabled: Some(spec.enabled),
            forward_destination: Some(spec.forward_destination.clone()),
            forward_enabled: Some(spec.forward_enabled),
            forward_keep: Some(spec.forward_keep),
            global_admin: Some(spec.global_admin),
            password: None,
            raw_password: None,
            quota_bytes: Some(spec.quota_bytes),
            quota_bytes_used: None,
            reply_body: Some(spec.reply_body.clone()),
            reply_enabled: Some(spec.reply_enabled),
            reply_enddate: parse_date("replyEndDate", spec.reply_end_date.as_ref())?,
            reply_startdate: parse_date("replyStartDate", spec.reply_start_date.as_ref())?,
            reply_subject: Some(spec.reply_subject.clone()),
            spam_enabled: Some(spec.spam_enabled),
            spam_mark_as_read: Some(spec.spam_mark_as_read),
            spam_threshold: Some(spec.spam_threshold),
        })
    }

    /// Credentials never take part in the comparison, and reply dates the
    /// spec leaves unset are whatever the server defaults them to.
    fn normalize(entity: &User, desired: &User) -> User {
        let mut user = entity.clone();
        user.email = entity.email.to_ascii_lowercase();
        user.password = None;
        user.raw_password = None;
        user.quota_bytes_used = None;
        user.comment = normalize_text(entity.comment.as_ref());
        user.displayed_name = normalize_text(entity.displayed_name.as_ref());
        user.reply_body = normalize_text(entity.reply_body.as_ref());
        user.reply_subject = normalize_text(entity.reply_subject.as_ref());
        user.forward_destination = normalize_set(entity.forward_destination.as_ref());
        if desired.reply_startdate.is_none() {
            user.reply_startdate = None;
        }
        if desired.reply_enddate.is_none() {
            user.reply_enddate = None;
        }
        user
    }

    async fn find(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.find_user(key).await
    }

    async fn create(&self, entity: &User) -> ClientResult<ApiResponse> {
        self.api.create_user(entity).await
    }

    async fn update(&self, key: &str, entity: &User) -> ClientResult<ApiResponse> {
        self.api.update_user(key, entity).await
    }

    async fn delete(&self, key: &str) -> ClientResult<ApiResponse> {
        self.api.delete_user(key).await
    }

    async fn prepare_create(
        &self,
        resource: &ManagedResource<MailboxSpec>,
        entity: &mut User,
    ) -> Result<Step, ReconcileError> {
        self.set_initial_password(resource, entity).await
    }
}
