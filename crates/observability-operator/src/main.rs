//! Observability Operator - grafana operator lifecycle for Observability tenants

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use observability_common::crd::Observability;
use observability_grafana::model::{DEFAULT_GRAFANA_OPERATOR_VERSION, DEFAULT_REGISTRY};
use observability_grafana::InstallConfig;
use observability_operator::controller::{error_policy, reconcile, Context};

/// Installs and removes the grafana operator for Observability resources
#[derive(Parser, Debug)]
#[command(name = "observability-operator", version, about, long_about = None)]
struct Cli {
    /// Print the Observability CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Registry hosting the grafana operator index image
    #[arg(long, env = "GRAFANA_OPERATOR_REGISTRY", default_value = DEFAULT_REGISTRY)]
    registry: String,

    /// Grafana operator version for resources that do not pin one
    #[arg(long, env = "GRAFANA_OPERATOR_VERSION", default_value = DEFAULT_GRAFANA_OPERATOR_VERSION)]
    default_version: String,

    /// Seconds between reconciles of the same resource
    #[arg(long, env = "OBSERVABILITY_REQUEUE_SECS", default_value_t = 30)]
    requeue_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Observability::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    run_controller(cli).await
}

async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    // Abort in-flight stages on shutdown instead of waiting on slow store calls
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let stages = observability_grafana::Context::new(client.clone())
        .with_config(InstallConfig {
            registry: cli.registry,
            default_version: cli.default_version,
        })
        .with_cancellation(cancel);
    let ctx = Arc::new(Context::new(
        client.clone(),
        stages,
        Duration::from_secs(cli.requeue_secs),
    ));

    tracing::info!(
        registry = %ctx.stages.config.registry,
        default_version = %ctx.stages.config.default_version,
        "starting Observability controller"
    );

    let observabilities: Api<Observability> = Api::all(client);
    Controller::new(observabilities, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Observability reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Observability reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Observability controller stopped");
    Ok(())
}
