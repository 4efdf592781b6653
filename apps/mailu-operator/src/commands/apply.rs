//! Reconcile a manifest once

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mailu_client::MailuClient;
use mailu_reconcile::conditions::{ConditionStatus, Conditions, READY};
use mailu_reconcile::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::OperatorConfig;
use crate::error::{OperatorError, OperatorResult};
use crate::manifest::{load_manifest, ManifestStores};

/// Reconcile every object in a manifest once
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to manifest file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// State of one object after its reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Ready,
    Deleted,
    /// Needs another pass; `run` mode would retry it
    Pending,
    Failed,
}

impl ObjectStatus {
    fn symbol(&self) -> (&'static str, &'static str) {
        match self {
            ObjectStatus::Ready => ("✓", "\x1b[32m"),
            ObjectStatus::Deleted => ("-", "\x1b[32m"),
            ObjectStatus::Pending => ("?", "\x1b[33m"),
            ObjectStatus::Failed => ("✗", "\x1b[31m"),
        }
    }
}

/// Result for one object
#[derive(Debug, Clone, Serialize)]
pub struct ObjectResult {
    pub kind: String,
    pub key: String,
    pub status: ObjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObjectResult {
    fn new(kind: ResourceKind, key: &ObjectKey, status: ObjectStatus, message: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            key: key.to_string(),
            status,
            message,
        }
    }

    /// Derive the status from the outcome and what the store holds now.
    fn from_outcome(
        kind: ResourceKind,
        key: &ObjectKey,
        deleting: bool,
        outcome: Outcome,
        conditions: Option<&Conditions>,
    ) -> Self {
        let ready = conditions.and_then(|c| c.get(READY));

        let (status, message) = match (outcome, conditions) {
            (Outcome::RequeueAfter(delay), _) => (
                ObjectStatus::Pending,
                Some(format!("retry in {}s", delay.as_secs())),
            ),
            (Outcome::Done, None) if deleting => (ObjectStatus::Deleted, None),
            (Outcome::Done, _) => match ready {
                Some(c) if c.status == ConditionStatus::False => {
                    (ObjectStatus::Failed, Some(c.message.clone()))
                }
                Some(c) if c.status == ConditionStatus::True && !deleting => {
                    (ObjectStatus::Ready, None)
                }
                _ => (ObjectStatus::Pending, Some("no status reported".to_string())),
            },
        };

        Self::new(kind, key, status, message)
    }
}

/// Summary of an apply run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub ready: usize,
    pub deleted: usize,
    pub pending: usize,
    pub failed: usize,
}

impl ApplySummary {
    pub fn from_results(results: &[ObjectResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                ObjectStatus::Ready => summary.ready += 1,
                ObjectStatus::Deleted => summary.deleted += 1,
                ObjectStatus::Pending => summary.pending += 1,
                ObjectStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

/// Full report of an apply run
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub results: Vec<ObjectResult>,
    pub summary: ApplySummary,
}

/// Execute the apply command
pub async fn execute(args: ApplyArgs, config: OperatorConfig) -> OperatorResult<()> {
    let manifest = load_manifest(&args.file)?;
    info!(
        file = %args.file.display(),
        objects = manifest.object_count(),
        "Applying manifest"
    );

    let stores = ManifestStores::load(manifest).await?;
    let client = Arc::new(MailuClient::new(config.mailu_config())?);
    let reconciler_config = config.reconciler_config();

    let domains = Reconciler::new(DomainResource::new(client.clone()), stores.domains.clone())
        .with_config(reconciler_config.clone());
    let users = Reconciler::new(
        MailboxResource::new(client.clone(), stores.secrets.clone()),
        stores.users.clone(),
    )
    .with_config(reconciler_config.clone());
    let aliases = Reconciler::new(AliasResource::new(client), stores.aliases.clone())
        .with_config(reconciler_config);

    // Domains first: mailboxes and aliases live inside them.
    let mut results = Vec::new();
    apply_kind(&domains, stores.domains.as_ref(), &mut results).await?;
    apply_kind(&users, stores.users.as_ref(), &mut results).await?;
    apply_kind(&aliases, stores.aliases.as_ref(), &mut results).await?;

    let summary = ApplySummary::from_results(&results);
    let failed = summary.failed;
    let report = ApplyReport { results, summary };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if failed > 0 {
        return Err(OperatorError::ReconcileFailed(failed));
    }
    Ok(())
}

/// Reconcile every object of one kind once.
///
/// Authentication failures abort the run; every object would fail the same way.
async fn apply_kind<R: MailResource>(
    reconciler: &Reconciler<R>,
    store: &InMemoryStore<R::Spec>,
    results: &mut Vec<ObjectResult>,
) -> OperatorResult<()> {
    for key in store.list_keys().await? {
        let deleting = store
            .get(&key)
            .await?
            .is_some_and(|r| r.deletion_requested);

        let result = match reconciler.reconcile(&key).await {
            Ok(outcome) => {
                let current = store.get(&key).await?;
                ObjectResult::from_outcome(
                    R::KIND,
                    &key,
                    deleting,
                    outcome,
                    current.as_ref().map(|r| &r.conditions),
                )
            }
            Err(e @ (ReconcileError::Unauthorized { .. } | ReconcileError::Forbidden { .. })) => {
                return Err(e.into());
            }
            Err(e) => ObjectResult::new(R::KIND, &key, ObjectStatus::Failed, Some(e.to_string())),
        };
        results.push(result);
    }
    Ok(())
}

fn print_report(report: &ApplyReport) {
    let reset = "\x1b[0m";

    for result in &report.results {
        let (symbol, color) = result.status.symbol();
        print!(
            "  {color}{symbol}{reset} {} {}: {:?}",
            result.kind, result.key, result.status
        );
        if let Some(ref message) = result.message {
            print!(" - {message}");
        }
        println!();
    }

    let summary = &report.summary;
    println!();
    println!(
        "Summary: {} ready, {} deleted, {} pending, {} failed",
        summary.ready, summary.deleted, summary.pending, summary.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key() -> ObjectKey {
        ObjectKey::new("default", "example-com")
    }

    fn ready(status: ConditionStatus, message: &str) -> Conditions {
        let mut conditions = Conditions::new();
        conditions.set(READY, status, "Test", message);
        conditions
    }

    #[test]
    fn test_requeue_is_pending() {
        let result = ObjectResult::from_outcome(
            ResourceKind::Domain,
            &key(),
            false,
            Outcome::RequeueAfter(Duration::from_secs(5)),
            None,
        );
        assert_eq!(result.status, ObjectStatus::Pending);
        assert_eq!(result.message.as_deref(), Some("retry in 5s"));
    }

    #[test]
    fn test_ready_condition() {
        let conditions = ready(ConditionStatus::True, "Domain created");
        let result = ObjectResult::from_outcome(
            ResourceKind::Domain,
            &key(),
            false,
            Outcome::Done,
            Some(&conditions),
        );
        assert_eq!(result.status, ObjectStatus::Ready);
    }

    #[test]
    fn test_error_condition_is_failure() {
        let conditions = ready(ConditionStatus::False, "Domain creation failed: bad quota");
        let result = ObjectResult::from_outcome(
            ResourceKind::Domain,
            &key(),
            false,
            Outcome::Done,
            Some(&conditions),
        );
        assert_eq!(result.status, ObjectStatus::Failed);
        assert!(result.message.unwrap().contains("bad quota"));
    }

    #[test]
    fn test_removed_object_is_deleted() {
        let result =
            ObjectResult::from_outcome(ResourceKind::Alias, &key(), true, Outcome::Done, None);
        assert_eq!(result.status, ObjectStatus::Deleted);
    }

    #[test]
    fn test_deleting_object_still_held_is_not_ready() {
        let conditions = ready(ConditionStatus::True, "Alias created");
        let result = ObjectResult::from_outcome(
            ResourceKind::Alias,
            &key(),
            true,
            Outcome::Done,
            Some(&conditions),
        );
        assert_eq!(result.status, ObjectStatus::Pending);
    }

    #[test]
    fn test_summary() {
        let results = vec![
            ObjectResult::new(ResourceKind::Domain, &key(), ObjectStatus::Ready, None),
            ObjectResult::new(ResourceKind::Mailbox, &key(), ObjectStatus::Failed, None),
            ObjectResult::new(ResourceKind::Alias, &key(), ObjectStatus::Failed, None),
        ];
        let summary = ApplySummary::from_results(&results);
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.pending, 0);
    }

    #[test]
    fn test_report_json_shape() {
        let results = vec![ObjectResult::new(
            ResourceKind::Mailbox,
            &ObjectKey::new("mail", "john"),
            ObjectStatus::Pending,
            Some("retry in 5s".to_string()),
        )];
        let report = ApplyReport {
            summary: ApplySummary::from_results(&results),
            results,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["results"][0]["kind"], "Mailbox");
        assert_eq!(value["results"][0]["key"], "mail/john");
        assert_eq!(value["results"][0]["status"], "pending");
        assert_eq!(value["summary"]["pending"], 1);
    }
}
