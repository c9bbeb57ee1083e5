use std::sync::Arc;

use clap::Parser;
use docgate::{start_server, ConnectionManager, Mode, ServerConfig};
use tracing_subscriber::EnvFilter;

/// HTTP gateway that runs JSON-described commands against MongoDB.
#[derive(Debug, Parser)]
#[command(name = "docgate-server", version)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Connection lifecycle: a connection per request, or one configured via /configure
    #[arg(long, env = "DOCGATE_MODE", value_enum, default_value_t = Mode::Stateless)]
    mode: Mode,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::new()
        .host(cli.host)
        .port(cli.port)
        .mode(cli.mode);
    let connections = Arc::new(ConnectionManager::new());
    start_server(&config, connections).await?;
    Ok(())
}
