//! ua-serviced - OPC UA service dispatch core daemon
//!
//! This daemon holds the address space, session/subscription state, and
//! dispatches decoded service requests to their handlers over a
//! single-threaded event loop.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use ua_serviced::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ua_serviced=info".parse().unwrap()))
        .init();

    let config = ServerConfig::parse();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("ua-serviced v{} - OPC UA service dispatch core", env!("CARGO_PKG_VERSION"));

    match Server::new(&config) {
        Ok(server) => {
            let shutdown_core = server.core();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("received shutdown signal");
                shutdown_core.shutdown();
            });

            if let Err(e) = server.run().await {
                error!("server error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        Err(e) => {
            error!("failed to initialize server: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
