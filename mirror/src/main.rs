use crate::config::Config;
use crate::reconciler::Reconciler;
use anyhow::anyhow;
use clap::Parser;
use log::{debug, error, info};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;

mod config;
mod k8s;
mod reconciler;

#[derive(Parser, Debug)]
#[command(version, about = "Mirrors an Endpoints object into an EndpointSlice", long_about = None)]
struct CliArgs {
    #[arg(short, long)]
    config_file: Option<String>,

    #[arg(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    env_logger::builder()
        .filter_level(cli_args.log_level)
        .init();

    if let Err(e) = run(cli_args) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: CliArgs) -> Result<(), anyhow::Error> {
    let config = match &args.config_file {
        Some(filename) => config::load(filename)?,
        None => Config::default(),
    };
    let rt = Runtime::new().map_err(|e| anyhow!("Failed to create runtime {}", e))?;
    rt.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), anyhow::Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(|e| anyhow!("unable to create Kubernetes client: {}", e))?;
    debug!("Kubernetes client acquisition successful");
    info!(
        "Mirroring Endpoints {} into EndpointSlice {}",
        config.source, config.target
    );

    let reconciler = Arc::new(Reconciler::new(
        k8s::endpoint_slices(client.clone(), &config.target),
        config.target.clone(),
        config.conflict_retries,
    ));
    let service = k8s::watcher::Service::new(
        k8s::endpoints(client, &config.source),
        &config.source.name,
        reconciler.update(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
        }
        if shutdown_tx.send(true).is_err() {
            debug!("Watch service already stopped");
        }
    });

    service.run(shutdown_rx).await
}
