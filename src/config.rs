//! Command-line configuration
//!
//! Every flag can also be supplied through the environment.

use std::net::SocketAddr;
use clap::Parser;

use crate::network::ServerConfig;

/// Command-line arguments for the bid duel server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on.
    #[arg(short, long, env = "BID_DUEL_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Maximum concurrent connections.
    #[arg(long, env = "BID_DUEL_MAX_CONNECTIONS", default_value_t = 1000)]
    pub max_connections: usize,

    /// Outbound messages buffered per connection before it is dropped.
    #[arg(long, env = "BID_DUEL_OUTBOUND_BUFFER", default_value_t = 64)]
    pub outbound_buffer: usize,

    /// Capacity of the hub's inbound event queue.
    #[arg(long, env = "BID_DUEL_INBOUND_QUEUE", default_value_t = 256)]
    pub inbound_queue: usize,

    /// Enable debug logging.
    ///
    /// Ignored when `RUST_LOG` is set.
    #[arg(short, long, env = "BID_DUEL_DEBUG")]
    pub debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BID_DUEL_JSON_LOGS")]
    pub json_logs: bool,
}

impl Args {
    /// Build the server configuration. Zero capacities are raised to one.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.listen,
            max_connections: self.max_connections,
            outbound_buffer: self.outbound_buffer.max(1),
            inbound_queue: self.inbound_queue.max(1),
            ..ServerConfig::default()
        }
    }
}
