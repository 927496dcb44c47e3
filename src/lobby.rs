//! Matchmaking handshake over the relay.
//!
//! The host creates a room and waits for somebody to join; the guest joins by
//! room code. Each side comes out with a networked `SessionConfig`: the host
//! plays p1 and is authoritative, the guest plays p2 and follows.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::config::SyncSettings;
use crate::protocol::ClientMsg;
use crate::session::SessionConfig;
use crate::spawn::Player;
use crate::transport::{LobbyEvent, Transport, TransportError};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("join rejected: {0}")]
    JoinRejected(String),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("no {0} reply from relay")]
    Timeout(&'static str),

    #[error("relay connection closed")]
    Disconnected,
}

pub struct Lobby {
    transport: Arc<dyn Transport>,
    reply_timeout: Duration,
}

impl Lobby {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, reply_timeout: REPLY_TIMEOUT }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub async fn create_room(&self) -> Result<String, LobbyError> {
        let mut events = self.transport.inbound().lobby_events();
        self.transport.send(ClientMsg::CreateRoom)?;
        self.reply(&mut events, "room-created", |ev| match ev {
            LobbyEvent::RoomCreated(room) => Some(room),
            _ => None,
        })
        .await
    }

    pub async fn join_room(&self, room: &str) -> Result<JoinOutcome, LobbyError> {
        let mut events = self.transport.inbound().lobby_events();
        self.transport.send(ClientMsg::JoinRoom { room_id: room.to_string() })?;
        self.reply(&mut events, "join-result", |ev| match ev {
            LobbyEvent::JoinResult { success, error_message } => {
                Some(JoinOutcome { success, error_message })
            }
            _ => None,
        })
        .await
    }

    pub async fn delete_room(&self, room: &str) -> Result<(), LobbyError> {
        let mut events = self.transport.inbound().lobby_events();
        self.transport.send(ClientMsg::DeleteRoom { room_id: room.to_string() })?;
        self.reply(&mut events, "room-deleted", |ev| match ev {
            LobbyEvent::RoomDeleted(id) if id == room => Some(()),
            _ => None,
        })
        .await
    }

    /// Round trip to the relay. The stamp is wall-clock millis so replies to
    /// an older ping are not mistaken for this one.
    pub async fn ping(&self) -> Result<Duration, LobbyError> {
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let started = Instant::now();
        let mut events = self.transport.inbound().lobby_events();
        self.transport.send(ClientMsg::Ping { t })?;
        self.reply(&mut events, "pong", |ev| match ev {
            LobbyEvent::Pong(echo) if echo == t => Some(()),
            _ => None,
        })
        .await?;
        Ok(started.elapsed())
    }

    /// Resolves once the relay reports a second member in `room`. No timeout.
    pub async fn wait_for_opponent(&self, room: &str) -> Result<(), LobbyError> {
        let mut events = self.transport.inbound().lobby_events();
        next_matching(&mut events, |ev| opponent_in(ev, room)).await
    }

    /// Create a room, wait for a guest, and configure p1 as authoritative.
    pub async fn host(&self, sync: SyncSettings) -> Result<SessionConfig, LobbyError> {
        // One receiver for both steps so a fast joiner is not missed.
        let mut events = self.transport.inbound().lobby_events();
        self.transport.send(ClientMsg::CreateRoom)?;
        let room = self
            .reply(&mut events, "room-created", |ev| match ev {
                LobbyEvent::RoomCreated(room) => Some(room),
                _ => None,
            })
            .await?;

        info!(%room, "🏠 room created, waiting for opponent");
        next_matching(&mut events, |ev| opponent_in(ev, &room)).await?;
        info!(%room, "🤝 opponent joined");

        Ok(SessionConfig::networked(Player::P1, room, true, sync))
    }

    /// Join `room` as p2. A refusal is final; there is no retry.
    pub async fn join(&self, room: &str, sync: SyncSettings) -> Result<SessionConfig, LobbyError> {
        let outcome = self.join_room(room).await?;
        if !outcome.success {
            let reason = outcome.error_message.unwrap_or_else(|| "join rejected".to_string());
            warn!(%room, %reason, "join failed");
            return Err(LobbyError::JoinRejected(reason));
        }
        info!(%room, "🤝 joined room");
        Ok(SessionConfig::networked(Player::P2, room.to_string(), false, sync))
    }

    async fn reply<R>(
        &self,
        events: &mut broadcast::Receiver<LobbyEvent>,
        what: &'static str,
        pick: impl FnMut(LobbyEvent) -> Option<R>,
    ) -> Result<R, LobbyError> {
        tokio::time::timeout(self.reply_timeout, next_matching(events, pick))
            .await
            .map_err(|_| LobbyError::Timeout(what))?
    }
}

fn opponent_in(event: LobbyEvent, room: &str) -> Option<()> {
    match event {
        LobbyEvent::SomebodyJoined(id) if id == room => Some(()),
        _ => None,
    }
}

async fn next_matching<R>(
    events: &mut broadcast::Receiver<LobbyEvent>,
    mut pick: impl FnMut(LobbyEvent) -> Option<R>,
) -> Result<R, LobbyError> {
    loop {
        match events.recv().await {
            Ok(LobbyEvent::Error(message)) => return Err(LobbyError::Relay(message)),
            Ok(event) => {
                if let Some(found) = pick(event) {
                    return Ok(found);
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "lobby events lagged"),
            Err(RecvError::Closed) => return Err(LobbyError::Disconnected),
        }
    }
}
