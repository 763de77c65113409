//! Bid Duel Server
//!
//! Real-time session server for the two-player all-pay bidding duel.

use std::sync::Arc;
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use bid_duel::{
    config::Args,
    logging,
    GameServer, CHALLENGE_EXPIRY, INITIAL_BUDGET, MAX_STEPS, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::setup_logging(args.debug, args.json_logs)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Bid Duel Server v{}", VERSION);
    info!(
        "Rules: {} steps to win, budget {}, challenges expire after {:?}",
        MAX_STEPS, INITIAL_BUDGET, CHALLENGE_EXPIRY
    );

    let config = args.server_config();
    info!("Max connections: {}, outbound buffer: {}", config.max_connections, config.outbound_buffer);

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
