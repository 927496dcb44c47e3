use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Inbound, Transport, TransportError};
use crate::protocol::ClientMsg;

/// In-process transport: outbound messages are recorded, inbound messages
/// are injected through `inbound()`.
#[derive(Default)]
pub struct MemoryTransport {
    inbound: Inbound,
    sent: Mutex<Vec<ClientMsg>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first, leaving the record empty.
    pub fn take_sent(&self) -> Vec<ClientMsg> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Make every later `send` fail as if the relay had gone away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Transport for MemoryTransport {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(msg);
        Ok(())
    }

    fn inbound(&self) -> &Inbound {
        &self.inbound
    }
}
