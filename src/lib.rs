//! carball - two-car soccer with peer sync over a WebSocket relay.

pub mod arena;
pub mod ball;
pub mod camera;
pub mod config;
pub mod goal;
pub mod hooks;
pub mod input;
pub mod lobby;
pub mod physics;
pub mod protocol;
pub mod relay;
pub mod score;
pub mod session;
pub mod spawn;
pub mod transport;
pub mod vehicle;
