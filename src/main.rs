//! Relay server: pairs players into rooms and forwards their match traffic.

use tokio::net::TcpListener;
use tracing::info;

use carball::config::{init_tracing, Config};
use carball::relay::{start_relay, RelayState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("🚀 Starting carball relay...");

    let listener = TcpListener::bind(config.relay_addr).await?;
    let state = RelayState::shared();

    tokio::select! {
        _ = start_relay(listener, state) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
