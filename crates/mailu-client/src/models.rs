//! Wire models for the Mailu admin API.
//!
//! Every optional field is omitted from request bodies when unset, so a
//! PATCH only touches what the caller filled in. Fields the server computes
//! are accepted on read and never sent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A mail domain (`/domain`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// FQDN, e.g. `example.com`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_aliases: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quota_bytes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_enabled: Option<bool>,

    /// Alternative domain names served by this domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,

    /// Autoconfig DNS records (server computed).
    #[serde(default, skip_serializing)]
    pub dns_autoconfig: Option<Vec<String>>,

    /// Domain managers (server managed).
    #[serde(default, skip_serializing)]
    pub managers: Option<Vec<String>>,
}

/// A mailbox (`/user`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Full address, `local@domain`.
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_spoofing: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_pw_next_login: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_imap: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_pop: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_destination: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_keep: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_admin: Option<bool>,

    /// Password hash (server computed).
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Cleartext password, only ever sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<i64>,

    /// Storage in use (server computed).
    #[serde(default, skip_serializing)]
    pub quota_bytes_used: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_enddate: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_startdate: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_mark_as_read: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_threshold: Option<i64>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("User")
            .field("email", &self.email)
            .field("allow_spoofing", &self.allow_spoofing)
            .field("change_pw_next_login", &self.change_pw_next_login)
            .field("comment", &self.comment)
            .field("displayed_name", &self.displayed_name)
            .field("enable_imap", &self.enable_imap)
            .field("enable_pop", &self.enable_pop)
            .field("enabled", &self.enabled)
            .field("forward_destination", &self.forward_destination)
            .field("forward_enabled", &self.forward_enabled)
            .field("forward_keep", &self.forward_keep)
            .field("global_admin", &self.global_admin)
            .field("password", &masked(&self.password))
            .field("raw_password", &masked(&self.raw_password))
            .field("quota_bytes", &self.quota_bytes)
            .field("quota_bytes_used", &self.quota_bytes_used)
            .field("reply_body", &self.reply_body)
            .field("reply_enabled", &self.reply_enabled)
            .field("reply_enddate", &self.reply_enddate)
            .field("reply_startdate", &self.reply_startdate)
            .field("reply_subject", &self.reply_subject)
            .field("spam_enabled", &self.spam_enabled)
            .field("spam_mark_as_read", &self.spam_mark_as_read)
            .field("spam_threshold", &self.spam_threshold)
            .finish()
    }
}

/// A mail alias (`/alias`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Full address, `local@domain`.
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<bool>,
}

/// Error body returned by the API on failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_omits_unset_fields() {
        let domain = Domain {
            name: "example.com".to_string(),
            max_users: Some(10),
            ..Default::default()
        };
        let value = serde_json::to_value(&domain).unwrap();
        assert_eq!(value, json!({"name": "example.com", "max_users": 10}));
    }

    #[test]
    fn test_domain_reads_server_fields_but_never_sends_them() {
        let domain: Domain = serde_json::from_value(json!({
            "name": "example.com",
            "alternatives": ["example.org"],
            "dns_autoconfig": ["autoconfig.example.com. 600 IN CNAME mail.example.com."],
            "managers": ["admin@example.com"],
            "dns_mx": "example.com. 600 IN MX 10 mail.example.com."
        }))
        .unwrap();

        assert!(domain.dns_autoconfig.is_some());
        assert_eq!(domain.managers.as_deref(), Some(&["admin@example.com".to_string()][..]));

        let value = serde_json::to_value(&domain).unwrap();
        assert!(value.get("dns_autoconfig").is_none());
        assert!(value.get("managers").is_none());
        assert_eq!(value["alternatives"], json!(["example.org"]));
    }

    #[test]
    fn test_user_password_hash_is_read_only() {
        let user: User = serde_json::from_value(json!({
            "email": "john@example.com",
            "password": "{BLF-CRYPT}$2b$12$abc",
            "quota_bytes_used": 1024,
            "reply_startdate": "1900-01-01"
        }))
        .unwrap();

        assert!(user.password.is_some());
        assert_eq!(user.quota_bytes_used, Some(1024));
        assert_eq!(
            user.reply_startdate,
            NaiveDate::from_ymd_opt(1900, 1, 1)
        );

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("quota_bytes_used").is_none());
        assert_eq!(value["reply_startdate"], json!("1900-01-01"));
    }

    #[test]
    fn test_user_raw_password_sent_when_set() {
        let user = User {
            email: "john@example.com".to_string(),
            raw_password: Some("hunter22".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["raw_password"], json!("hunter22"));
    }

    #[test]
    fn test_user_debug_masks_credentials() {
        let user = User {
            email: "john@example.com".to_string(),
            raw_password: Some("hunter22".to_string()),
            ..Default::default()
        };
        let debug = format!("{user:?}");
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("john@example.com"));
    }

    #[test]
    fn test_alias_round_trip_shape() {
        let alias: Alias = serde_json::from_value(json!({
            "email": "postmaster@example.com",
            "destination": ["admin@example.com"],
            "wildcard": false
        }))
        .unwrap();
        assert_eq!(alias.comment, None);
        assert_eq!(alias.wildcard, Some(false));
    }
}
