// ==============================================================================
// transport - CLIENT SIDE OF THE RELAY CHANNEL
// ------------------------------------------------------------------------------
// Outbound: `Transport::send` encodes a ClientMsg and hands it to a writer.
// Inbound: the connection's reader feeds every frame into `Inbound`, which keeps
//   - the latest remote input      (watch, last value wins)
//   - the latest remote pose bundle (watch, last value wins)
//   - lobby replies                 (broadcast, consumed by the lobby handshake)
//
// A match session takes a `MatchSubscription` at start and drops it on exit.
// Nothing is queued for the session: if two pose bundles arrive between ticks
// the first is simply overwritten.
// ==============================================================================

pub mod memory;
pub mod ws;

pub use memory::MemoryTransport;
pub use ws::WsTransport;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::input::Controls;
use crate::protocol::{ClientMsg, InputPayload, PoseBundle, ServerMsg};
use crate::spawn::Player;

const LOBBY_BACKLOG: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to reach relay: {0}")]
    Connect(#[from] tungstenite::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("relay connection closed")]
    Closed,
}

/// Room-scoped publish/subscribe channel to the relay.
pub trait Transport: Send + Sync {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError>;
    fn inbound(&self) -> &Inbound;
}

/// Held controls received from the peer, tagged with the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInput {
    pub player: Player,
    pub controls: Controls,
}

/// Relay replies that drive matchmaking.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyEvent {
    RoomCreated(String),
    JoinResult { success: bool, error_message: Option<String> },
    RoomDeleted(String),
    SomebodyJoined(String),
    Pong(u64),
    Error(String),
}

pub struct Inbound {
    input: watch::Sender<Option<RemoteInput>>,
    pose: watch::Sender<Option<PoseBundle>>,
    lobby: broadcast::Sender<LobbyEvent>,
}

impl Default for Inbound {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbound {
    pub fn new() -> Self {
        let (input, _) = watch::channel(None);
        let (pose, _) = watch::channel(None);
        let (lobby, _) = broadcast::channel(LOBBY_BACKLOG);
        Self { input, pose, lobby }
    }

    /// Entry point for raw frames. Malformed frames are logged and dropped.
    pub fn dispatch_text(&self, text: &str) {
        match serde_json::from_str::<ServerMsg>(text) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => warn!(error = %e, "dropping malformed relay frame"),
        }
    }

    pub fn dispatch(&self, msg: ServerMsg) {
        let event = match msg {
            ServerMsg::ReceiveInput { payload } => {
                match InputPayload::decode(&payload) {
                    Ok(input) => {
                        self.input.send_replace(Some(RemoteInput {
                            player: input.player,
                            controls: input.controls(),
                        }));
                    }
                    Err(e) => warn!(error = %e, "dropping malformed input payload"),
                }
                return;
            }
            ServerMsg::ReceivePos { payload } => {
                self.pose.send_replace(Some(payload));
                return;
            }
            ServerMsg::RoomCreated { room_id } => LobbyEvent::RoomCreated(room_id),
            ServerMsg::JoinResult { success, error_message } => {
                LobbyEvent::JoinResult { success, error_message }
            }
            ServerMsg::RoomDeleted { room_id } => LobbyEvent::RoomDeleted(room_id),
            ServerMsg::SomebodyJoined { room_id } => LobbyEvent::SomebodyJoined(room_id),
            ServerMsg::Pong { t } => LobbyEvent::Pong(t),
            ServerMsg::Error { message } => {
                warn!(%message, "relay reported an error");
                LobbyEvent::Error(message)
            }
        };

        // No lobby listener is fine; the event just has nowhere to go.
        if self.lobby.send(event).is_err() {
            debug!("lobby event with no listener");
        }
    }

    /// Start listening for match traffic. Input that arrived before this
    /// call is kept: the peer may already be holding keys.
    pub fn subscribe(&self) -> MatchSubscription {
        MatchSubscription {
            input: self.input.subscribe(),
            pose: self.pose.subscribe(),
        }
    }

    /// Forget cached match traffic once a match is over.
    pub fn clear_match(&self) {
        self.input.send_replace(None);
        self.pose.send_replace(None);
    }

    pub fn lobby_events(&self) -> broadcast::Receiver<LobbyEvent> {
        self.lobby.subscribe()
    }

    /// Number of live match subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.input.receiver_count()
    }
}

/// A session's view of inbound match traffic. Dropping it unsubscribes.
pub struct MatchSubscription {
    input: watch::Receiver<Option<RemoteInput>>,
    pose: watch::Receiver<Option<PoseBundle>>,
}

impl MatchSubscription {
    /// Most recent remote input; stays in effect until replaced.
    pub fn latest_input(&self) -> Option<RemoteInput> {
        *self.input.borrow()
    }

    /// Pose bundle that arrived since the last call, if any.
    pub fn take_pose(&mut self) -> Option<PoseBundle> {
        if self.pose.has_changed().unwrap_or(false) {
            *self.pose.borrow_and_update()
        } else {
            None
        }
    }
}
