//! Windowless client: plays one scripted match (solo, local or over the relay)
//! and logs what happens.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use carball::config::{init_tracing, Config};
use carball::input::InputCapture;
use carball::lobby::Lobby;
use carball::score::{JsonFileStore, LogDisplay, MemoryStore, ScoreLedger, ScoreStore};
use carball::session::{driver, Mode, Session, SessionConfig, SessionParts};
use carball::spawn::Player;
use carball::transport::{Transport, WsTransport};

#[derive(Parser)]
#[command(about = "Play a scripted carball match without a window")]
struct CliArgs {
    #[command(subcommand)]
    role: Role,

    /// Seconds to drive before pressing Escape.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,
}

#[derive(Subcommand)]
enum Role {
    /// One car, no network.
    Solo,
    /// Two cars on one keyboard.
    Local,
    /// Create a room and wait for an opponent.
    Host,
    /// Join an existing room by code.
    Join { room: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    let args = CliArgs::parse();

    let store: Box<dyn ScoreStore> = match &config.score_file {
        Some(path) => Box::new(JsonFileStore::open(path)),
        None => Box::new(MemoryStore::default()),
    };
    let score = ScoreLedger::new(store, Box::new(LogDisplay));

    let (session_config, lobby) = match args.role {
        Role::Solo => (SessionConfig::solo(), None),
        Role::Local => (SessionConfig::local_two_player(), None),
        Role::Host => {
            let lobby = connect(&config.relay_url).await?;
            (lobby.host(config.sync).await?, Some(lobby))
        }
        Role::Join { room } => {
            let lobby = connect(&config.relay_url).await?;
            (lobby.join(&room, config.sync).await?, Some(lobby))
        }
    };

    let parts = SessionParts {
        input: InputCapture::new(),
        score,
        transport: lobby.as_ref().map(Lobby::transport),
        ..SessionParts::default()
    };
    let mut session = Session::new(session_config.clone(), parts)?;

    let two_cars = session_config.mode == Mode::LocalTwoPlayer;
    let stop_at = (args.seconds.max(0.0) * config.tick_hz as f32) as u64;
    driver::run(&mut session, config.tick_hz, |keys, tick| {
        keys.key_down("w");
        if two_cars {
            keys.key_down("ArrowUp");
        }
        // Weave a little so the cars don't just ram the far wall.
        if tick % 180 < 30 {
            keys.key_down("a");
        } else {
            keys.key_up("a");
        }
        if tick >= stop_at {
            keys.key_down("Escape");
        }
    })
    .await;

    info!(
        p1 = session.score(Player::P1),
        p2 = session.score(Player::P2),
        "final score"
    );

    if let (Some(lobby), Some(room), true) =
        (&lobby, &session_config.room, session_config.authoritative)
    {
        if let Err(e) = lobby.delete_room(room).await {
            warn!(error = %e, "room not deleted");
        }
    }

    Ok(())
}

async fn connect(url: &str) -> anyhow::Result<Lobby> {
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::connect(url).await?);
    let lobby = Lobby::new(transport);
    let rtt = lobby.ping().await?;
    info!(%url, rtt_ms = rtt.as_millis() as u64, "📡 relay reachable");
    Ok(lobby)
}
