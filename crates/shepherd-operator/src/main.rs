//! shepherd-operator: AWS account lifecycle operator
//!
//! Watches Account, AccountClaim, and AccountPool objects and reconciles
//! them against AWS: creating and verifying accounts, matching claims to
//! pooled accounts, and tearing accounts down for reuse when released.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shepherd_common::defaults::MAX_CONCURRENT_RECONCILES;
use shepherd_common::AccountPool;
use shepherd_operator::aws::SdkBuilder;
use shepherd_operator::config::OperatorConfig;
use shepherd_operator::controller::{
    AccountReconciler, ClaimReconciler, PoolReconciler, ReconcileOutcome,
};
use shepherd_operator::dispatch::Dispatcher;
use shepherd_operator::limits::BudgetWatcher;
use shepherd_operator::retry::TokioSleep;
use shepherd_operator::secrets::{CredentialSecret, MemorySecrets, SecretStore};
use shepherd_operator::store::{ControlPlane, EntityKind, MemoryStore, StoreEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shepherd-operator")]
#[command(about = "AWS account lifecycle operator")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the operator loop
    Run {
        /// Path to the operator configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Desired size for the default pool (creates the pool object)
        #[arg(long)]
        pool_size: Option<u32>,

        /// Maximum concurrent reconciliations
        #[arg(long, default_value_t = MAX_CONCURRENT_RECONCILES)]
        max_reconciles: usize,
    },

    /// Parse and print the effective configuration, then exit
    ValidateConfig {
        /// Path to the operator configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<OperatorConfig> {
    match path {
        Some(path) => OperatorConfig::load(path)
            .with_context(|| format!("failed loading config from {}", path.display())),
        None => Ok(OperatorConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let mut source = e.source();
        eprintln!("Error: {e}");
        while let Some(cause) = source {
            eprintln!("  Caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::ValidateConfig { config } => {
            let config = load_config(config.as_ref())?;
            println!("{config:#?}");
            Ok(())
        }
        Command::Run {
            config,
            pool_size,
            max_reconciles,
        } => {
            let config = Arc::new(load_config(config.as_ref())?);
            run_operator(config, pool_size, max_reconciles).await
        }
    }
}

async fn run_operator(
    config: Arc<OperatorConfig>,
    pool_size: Option<u32>,
    max_reconciles: usize,
) -> Result<()> {
    info!(
        namespace = %config.namespace,
        region = %config.default_region,
        "starting shepherd-operator"
    );

    let store = MemoryStore::new();
    let secrets = MemorySecrets::new();
    seed_operator_secret(&secrets, &config).await?;

    let builder = SdkBuilder::new(secrets.clone(), config.operator_secret.clone());
    let budget = BudgetWatcher::new(config.account_ceiling);

    let accounts = Arc::new(AccountReconciler::new(
        store.clone(),
        builder.clone(),
        TokioSleep,
        secrets.clone(),
        config.clone(),
        budget.clone(),
    ));
    let claims = Arc::new(ClaimReconciler::new(
        store.clone(),
        builder.clone(),
        TokioSleep,
        config.clone(),
    ));
    let pools = Arc::new(PoolReconciler::new(
        store.clone(),
        config.clone(),
        budget.clone(),
    ));

    // Declarative default pool from the CLI, for bootstrapping
    if let Some(size) = pool_size {
        let name = config.default_pool_name().unwrap_or("default").to_string();
        let pool = AccountPool::new(name, config.namespace.clone(), size);
        store
            .create_pool(&pool)
            .await
            .context("failed creating default pool")?;
    }

    let cancel = CancellationToken::new();

    // Budget refresh: tracked accounts vs. the configured ceiling
    {
        let store = store.clone();
        let budget = budget.clone();
        let namespace = config.namespace.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                }
                match store.list_accounts(&namespace).await {
                    Ok(accounts) => budget.refresh(accounts.len() as u32),
                    Err(err) => warn!(error = %err, "budget refresh failed"),
                }
            }
        });
    }

    // Merge store change notifications with reconciler requeues
    let (dispatch_tx, dispatch_rx) = tokio::sync::mpsc::unbounded_channel::<StoreEvent>();
    {
        let mut store_events = store
            .take_events()
            .await
            .context("store event stream already taken")?;
        let dispatch_tx = dispatch_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = store_events.recv() => {
                        let Some(event) = event else { return };
                        let _ = dispatch_tx.send(event);
                    }
                }
            }
        });
    }

    let handler = {
        let cancel = cancel.clone();
        let requeue_tx = dispatch_tx.clone();
        move |event: StoreEvent| {
            let accounts = accounts.clone();
            let claims = claims.clone();
            let pools = pools.clone();
            let cancel = cancel.child_token();
            let requeue_tx = requeue_tx.clone();
            async move {
                let result = match event.kind {
                    EntityKind::Account => accounts.reconcile(&cancel, &event.key).await,
                    EntityKind::Claim => claims.reconcile(&cancel, &event.key).await,
                    EntityKind::Pool => pools.reconcile(&event.key).await,
                };
                match result {
                    Ok(ReconcileOutcome::Done) => {}
                    Ok(ReconcileOutcome::Requeue) => {
                        let _ = requeue_tx.send(event);
                    }
                    Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = requeue_tx.send(event);
                        });
                    }
                    Err(err) if err.is_conflict() => {
                        // stale read; run again from a fresh one
                        let _ = requeue_tx.send(event);
                    }
                    Err(err) => {
                        error!(
                            kind = %event.kind,
                            key = %event.key,
                            error = %err,
                            "reconciliation failed"
                        );
                        let requeue_tx = requeue_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            let _ = requeue_tx.send(event);
                        });
                    }
                }
            }
        }
    };

    let dispatcher = Dispatcher::new(max_reconciles);
    let dispatch_cancel = cancel.clone();
    let dispatch =
        tokio::spawn(async move { dispatcher.run(dispatch_rx, dispatch_cancel, handler).await });

    tokio::signal::ctrl_c()
        .await
        .context("failed waiting for shutdown signal")?;
    info!("shutdown requested");
    cancel.cancel();
    dispatch.await.context("dispatcher task panicked")?;
    Ok(())
}

/// Seed the operator's credential secret from the environment so the SDK
/// builder can construct the operator client.
async fn seed_operator_secret(secrets: &MemorySecrets, config: &OperatorConfig) -> Result<()> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default();
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
    if access_key_id.is_empty() || secret_access_key.is_empty() {
        warn!("no AWS credentials in environment; operator client will not authenticate");
        return Ok(());
    }
    secrets
        .put_secret(
            &config.operator_secret,
            CredentialSecret {
                access_key_id,
                secret_access_key,
            },
        )
        .await
        .context("failed seeding operator secret")?;
    Ok(())
}
