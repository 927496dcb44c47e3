//! Per-player score with a persisted store and a display sink.
//!
//! Scores are absolute values: `update_score` overwrites, it never adds. The
//! session computes `current + 1` on a goal, and a remote pose bundle applies
//! the authoritative peer's numbers verbatim.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::spawn::Player;

/// Key-value persistence for `p1-score` / `p2-score`.
pub trait ScoreStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn clear(&mut self);
}

/// Where the current score is shown.
pub trait ScoreDisplay: Send {
    fn show(&mut self, player: Player, score: u32);
}

// ------------------------------------------------------------------
// stores
// ------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl ScoreStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScoreFile {
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

/// Store backed by a small JSON object on disk. I/O failures are logged and
/// the in-memory copy keeps working.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    file: ScoreFile,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "score file unreadable, starting empty");
                ScoreFile::default()
            }),
            Err(_) => ScoreFile::default(),
        };
        Self { path, file }
    }

    fn flush(&self) {
        let result = serde_json::to_string_pretty(&self.file)
            .map_err(std::io::Error::other)
            .and_then(|text| std::fs::write(&self.path, text));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist scores");
        }
    }
}

impl ScoreStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.file.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.file.entries.insert(key.to_string(), value);
        self.flush();
    }

    fn clear(&mut self) {
        self.file.entries.clear();
        self.flush();
    }
}

// ------------------------------------------------------------------
// displays
// ------------------------------------------------------------------

/// Scoreboard that writes to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl ScoreDisplay for LogDisplay {
    fn show(&mut self, player: Player, score: u32) {
        info!(%player, score, "⚽ scoreboard");
    }
}

/// Scoreboard that remembers everything it was asked to show.
#[derive(Debug, Default, Clone)]
pub struct RecordingDisplay {
    pub shown: Arc<Mutex<Vec<(Player, u32)>>>,
}

impl ScoreDisplay for RecordingDisplay {
    fn show(&mut self, player: Player, score: u32) {
        self.shown.lock().push((player, score));
    }
}

// ------------------------------------------------------------------
// ledger
// ------------------------------------------------------------------

pub struct ScoreLedger {
    store: Box<dyn ScoreStore>,
    display: Box<dyn ScoreDisplay>,
}

impl ScoreLedger {
    pub fn new(store: Box<dyn ScoreStore>, display: Box<dyn ScoreDisplay>) -> Self {
        Self { store, display }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()), Box::new(LogDisplay))
    }

    /// Persisted score, 0 when absent or unparsable.
    pub fn get_score(&self, player: Player) -> u32 {
        self.store
            .get(player.score_key())
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn update_score(&mut self, player: Player, score: u32) {
        self.store.set(player.score_key(), score.to_string());
        self.display.show(player, score);
    }

    /// Wipe persisted scores and publish zero for both players.
    pub fn reset(&mut self) {
        self.store.clear();
        for player in Player::ALL {
            self.display.show(player, 0);
        }
    }
}
