use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------
// PLAYER IDENTITY
// ---------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::P1, Player::P2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Player::P1 => "p1",
            Player::P2 => "p2",
        }
    }

    pub fn opponent(&self) -> Player {
        match self {
            Player::P1 => Player::P2,
            Player::P2 => Player::P1,
        }
    }

    /// Key under which this player's score is persisted.
    pub fn score_key(&self) -> &'static str {
        match self {
            Player::P1 => "p1-score",
            Player::P2 => "p2-score",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------
// SPAWN POINTS
// ---------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: [f32; 3],
    /// Mirrored so "forward" points at the opposing goal.
    pub reversed: bool,
}

pub const BALL_SPAWN: [f32; 3] = [0.0, 1.5, 0.0];

pub fn spawn_for(player: Player) -> SpawnPoint {
    match player {
        Player::P1 => SpawnPoint { position: [-3.0, 1.0, 0.0], reversed: false },
        Player::P2 => SpawnPoint { position: [3.0, 1.0, 0.0], reversed: true },
    }
}
