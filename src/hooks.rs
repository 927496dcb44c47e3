//! Boundary to the host UI: what the session calls when a match ends.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub trait MenuHost: Send {
    fn hide_scoreboard(&mut self);
    fn hide_canvas(&mut self);
    fn show_main_menu(&mut self);
}

/// Per-car engine sound loop.
pub trait EngineAudio: Send {
    fn silence(&mut self);
}

/// Used when there is no UI to hand back to.
#[derive(Debug, Default)]
pub struct LogHooks;

impl MenuHost for LogHooks {
    fn hide_scoreboard(&mut self) {
        debug!("hide scoreboard");
    }

    fn hide_canvas(&mut self) {
        debug!("hide canvas");
    }

    fn show_main_menu(&mut self) {
        debug!("show main menu");
    }
}

impl EngineAudio for LogHooks {
    fn silence(&mut self) {
        debug!("engine audio silenced");
    }
}

/// Records each call by name, in order. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingHooks {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl MenuHost for RecordingHooks {
    fn hide_scoreboard(&mut self) {
        self.calls.lock().push("hide_scoreboard");
    }

    fn hide_canvas(&mut self) {
        self.calls.lock().push("hide_canvas");
    }

    fn show_main_menu(&mut self) {
        self.calls.lock().push("show_main_menu");
    }
}

impl EngineAudio for RecordingHooks {
    fn silence(&mut self) {
        self.calls.lock().push("silence");
    }
}
