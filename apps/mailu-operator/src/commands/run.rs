//! Keep a manifest reconciled until interrupted

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mailu_client::MailuClient;
use mailu_reconcile::prelude::*;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::OperatorConfig;
use crate::error::{OperatorError, OperatorResult};
use crate::manifest::{load_manifest, ManifestStores};

/// Run the reconciliation loop until Ctrl-C
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to manifest file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
}

/// Execute the run command
pub async fn execute(args: RunArgs, config: OperatorConfig) -> OperatorResult<()> {
    let manifest = load_manifest(&args.file)?;
    info!(
        file = %args.file.display(),
        objects = manifest.object_count(),
        api_url = %config.api_url,
        "Starting reconciliation loop"
    );

    let stores = ManifestStores::load(manifest).await?;
    let client = Arc::new(MailuClient::new(config.mailu_config())?);
    let reconciler_config = config.reconciler_config();
    let dispatcher_config = config.dispatcher_config();

    let domains = Arc::new(Dispatcher::new(
        Reconciler::new(DomainResource::new(client.clone()), stores.domains.clone())
            .with_config(reconciler_config.clone()),
        dispatcher_config.clone(),
    ));
    let users = Arc::new(Dispatcher::new(
        Reconciler::new(
            MailboxResource::new(client.clone(), stores.secrets.clone()),
            stores.users.clone(),
        )
        .with_config(reconciler_config.clone()),
        dispatcher_config.clone(),
    ));
    let aliases = Arc::new(Dispatcher::new(
        Reconciler::new(AliasResource::new(client), stores.aliases.clone())
            .with_config(reconciler_config),
        dispatcher_config,
    ));

    // The first resync tick fires immediately and submits every stored key.
    let handles = vec![
        spawn_dispatcher(&domains),
        spawn_dispatcher(&users),
        spawn_dispatcher(&aliases),
    ];

    let signal = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, stopping dispatchers");

    domains.shutdown();
    users.shutdown();
    aliases.shutdown();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Dispatcher task panicked");
        }
    }

    signal.map_err(|e| OperatorError::Io(format!("Failed to listen for Ctrl-C: {e}")))?;
    info!("Reconciliation loop stopped");
    Ok(())
}

fn spawn_dispatcher<R: MailResource>(dispatcher: &Arc<Dispatcher<R>>) -> JoinHandle<()> {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move { dispatcher.run().await })
}
