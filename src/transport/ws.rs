use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{Inbound, Transport, TransportError};
use crate::protocol::ClientMsg;

/// WebSocket connection to the relay. Reader and writer run as tasks and
/// are aborted when the transport is dropped.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<String>,
    inbound: Arc<Inbound>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = connect_async(url).await?;
        info!(%url, "🌐 connected to relay");
        let (mut write, mut read) = stream.split();

        // -------------------------------
        // outgoing frames
        // -------------------------------
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(error = %e, "relay write failed");
                    break;
                }
            }
            let _ = write.close().await;
        });

        // -------------------------------
        // incoming frames
        // -------------------------------
        let inbound = Arc::new(Inbound::new());
        let sink = Arc::clone(&inbound);
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => sink.dispatch_text(&text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "relay read failed");
                        break;
                    }
                }
            }
            debug!("relay reader finished");
        });

        Ok(Self { tx, inbound, reader, writer })
    }
}

impl Transport for WsTransport {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        let text = msg.to_text()?;
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    fn inbound(&self) -> &Inbound {
        &self.inbound
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
