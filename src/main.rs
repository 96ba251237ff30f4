mod config_defs;

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webhook::{
    admit::{KubeNetworkAttachments, PodReviewer},
    Webhook,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = config_defs::Args::parse();
    let switches = args.control_switches()?;
    tracing::info!(
        mutation = switches.enable_mutation,
        validation = switches.enable_validation,
        injections = switches.user_defined_injections.len(),
        "control switches loaded"
    );

    let k = kube::Client::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let reviewer = PodReviewer::new(Arc::new(KubeNetworkAttachments::new(k)));

    tracing::info!(
        address = %args.address,
        port = args.port,
        tls = !args.insecure,
        "starting webhook server"
    );
    webhook::rocket(Webhook::new(switches, reviewer))
        .configure(args.figment())
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("webhook server failed: {}", e))?;
    Ok(())
}
