use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use contract_cluster::interface::ContractInterface;
use contract_cluster::server;
use contract_cluster::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "could not load settings");
            return ExitCode::FAILURE;
        }
    };
    let bind = settings.bind.clone();
    // a missing or corrupt dataset is fatal at startup
    let interface = match ContractInterface::open(settings) {
        Ok(interface) => Arc::new(interface),
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "could not open the contract dataset");
            return ExitCode::FAILURE;
        }
    };
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %bind, "could not bind");
            return ExitCode::FAILURE;
        }
    };
    info!(%bind, "serving contract lookups");
    if let Err(e) = axum::serve(listener, server::router(interface)).await {
        error!(error = %e, "server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
