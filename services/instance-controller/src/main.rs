//! capve Instance Controller
//!
//! Keeps one QEMU instance converged to its desired spec.
//!
//! ## Architecture
//!
//! - **Controller**: Ticks the reconciler under a per-pass deadline
//! - **Reconciler**: Looks the VM up by its recorded identity or creates it
//! - **Identity store**: SQLite record of VM ID, node and storage
//! - **Platform / scheduler**: In-memory for now; the real clients plug in
//!   behind the same traits

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use capve_instance_controller::config::Config;
use capve_instance_controller::controller::{Controller, ControllerConfig};
use capve_instance_controller::mock::{InMemoryPlatform, NoopImageStager, StaticPlacement};
use capve_instance_controller::reconciler::InstanceReconciler;
use capve_instance_controller::state::{SqliteIdentityStore, StateStore};
use capve_vm_options::{DesiredSpec, OptionBuilder};
use tokio::sync::watch;
use tracing::{info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting capve instance controller");
    info!(
        spec_path = %config.spec_path.display(),
        data_dir = %config.data_dir.display(),
        disk_overflow = %config.disk_overflow,
        "Configuration loaded"
    );

    let raw = tokio::fs::read(&config.spec_path)
        .await
        .with_context(|| format!("failed to read {}", config.spec_path.display()))?;
    let spec: DesiredSpec = serde_json::from_slice(&raw).context("failed to parse desired spec")?;

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let store = StateStore::open(config.state_db_path())?;
    info!(
        path = %config.state_db_path().display(),
        provisioned = store.count_provisioned()?,
        "State store opened"
    );
    let identities = Arc::new(SqliteIdentityStore::new(store));

    // Platform and scheduler are in-memory for now
    let platform = Arc::new(InMemoryPlatform::new());
    let placement = Arc::new(StaticPlacement::new(
        config.placement_node.clone(),
        config.placement_storage.clone(),
        config.first_vmid,
    ));

    let builder = OptionBuilder::new(config.disk_overflow)
        .with_span(info_span!("option_builder", vm_name = %spec.name));
    let reconciler = InstanceReconciler::new(
        platform,
        placement,
        Arc::new(NoopImageStager::new()),
        identities.clone(),
    )
    .with_option_builder(builder);

    let controller = Controller::new(
        reconciler,
        identities,
        spec,
        ControllerConfig {
            reconcile_interval: Duration::from_secs(config.reconcile_interval_secs),
            pass_timeout: Duration::from_secs(config.pass_timeout_secs),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = tokio::spawn(async move { controller.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    if let Err(e) = controller_handle.await {
        tracing::error!(error = %e, "Controller task panicked");
    }

    info!("Instance controller shutdown complete");
    Ok(())
}
