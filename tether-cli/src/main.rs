use clap::Parser;
use std::sync::Arc;
use tether_cli::{execute, Cli, CliError, TetherConfig};
use tether_storage::{RestBackend, StorageGateway};
use tether_sync::SyncCoordinator;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tether=info";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("error: {err}");
            2
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<bool, CliError> {
    let config = TetherConfig::load(cli.config.as_deref())?;
    init_tracing(config.log_filter.as_deref());

    let backend = RestBackend::new(config.store)?;
    let gateway = Arc::new(StorageGateway::new(Arc::new(backend)).with_retry(config.retry));
    let mut sync =
        SyncCoordinator::new(gateway).with_location_policy(config.telemetry.location_policy);
    tracing::debug!(?sync, "coordinator ready");

    let mut stdout = std::io::stdout().lock();
    let outcome = execute(&cli.command, &mut sync, &mut stdout, cli.json).await;
    sync.cancel_all();
    outcome
}

/// `RUST_LOG` wins over the config file, which wins over the default.
fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
