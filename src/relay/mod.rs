pub mod rooms;

use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMsg, ServerMsg};
use self::rooms::{ClientId, Delivery, RoomRegistry};

pub use self::rooms::{ROOM_CAPACITY, ROOM_CODE_LEN};

pub struct RelayState {
    pub rooms: RoomRegistry,
    pub clients: HashMap<ClientId, mpsc::UnboundedSender<String>>,
}

pub type SharedRelay = Arc<Mutex<RelayState>>;

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            rooms: RoomRegistry::new(),
            clients: HashMap::new(),
        }
    }

    pub fn shared() -> SharedRelay {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn register_client(&mut self, id: ClientId, tx: mpsc::UnboundedSender<String>) {
        self.clients.insert(id, tx);
    }

    pub fn remove_client(&mut self, id: ClientId) {
        self.clients.remove(&id);
        self.rooms.disconnect(id);
    }

    /// Queue each message on its recipient's writer. Gone clients are skipped.
    pub fn deliver(&self, out: Vec<Delivery>) {
        for (to, msg) in out {
            let Some(tx) = self.clients.get(&to) else { continue };
            match msg.to_text() {
                Ok(text) => {
                    let _ = tx.send(text);
                }
                Err(e) => warn!(error = %e, "cannot encode relay message"),
            }
        }
    }
}

/// Accept WebSocket clients on `listener` forever.
pub async fn start_relay(listener: TcpListener, state: SharedRelay) {
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 Relay listening on ws://{}", addr);
    }

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(raw, peer, state).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}

async fn handle_connection(
    raw: TcpStream,
    peer: SocketAddr,
    state: SharedRelay,
) -> Result<(), tungstenite::Error> {
    let ws = accept_async(raw).await?;
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing message channel
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id: ClientId = Uuid::new_v4();
    state.lock().await.register_client(client_id, tx.clone());

    // -------------------------------
    // 2) Send loop
    // -------------------------------
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    info!(%client_id, %peer, "🟢 Client connected");

    // -------------------------------
    // 3) Receive loop
    // -------------------------------
    let mut result = Ok(());
    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                result = Err(e);
                break;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let msg = match serde_json::from_str::<ClientMsg>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%client_id, error = %e, "malformed frame ignored");
                let reply = ServerMsg::Error { message: format!("malformed message: {e}") };
                state.lock().await.deliver(vec![(client_id, reply)]);
                continue;
            }
        };

        debug!(%client_id, ?msg, "relay message");
        let mut relay = state.lock().await;
        let out = relay.rooms.handle(client_id, msg);
        relay.deliver(out);
    }

    info!(%client_id, "🔴 Client disconnected");
    state.lock().await.remove_client(client_id);
    drop(tx);
    writer.abort();
    result
}
