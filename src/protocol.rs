//! Relay wire messages.
//!
//! Every frame is a JSON text message tagged by `"type"` with kebab-case names.
//! Room-scoped messages carry the room code as `roomID`. Input payloads travel
//! as an embedded JSON string; pose payloads as a nested object.

use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::input::Controls;
use crate::spawn::Player;
use crate::vehicle::{CarPose, WHEEL_COUNT};

/// Messages sent from a game client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    CreateRoom,
    JoinRoom {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    DeleteRoom {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    /// Held controls of the sender; `payload` is an encoded [`InputPayload`].
    UpdateInput {
        #[serde(rename = "roomID")]
        room_id: String,
        payload: String,
    },
    /// Authoritative world state.
    UpdatePos {
        #[serde(rename = "roomID")]
        room_id: String,
        payload: PoseBundle,
    },
    Ping {
        t: u64,
    },
}

/// Messages sent from the relay to a game client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMsg {
    RoomCreated {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    JoinResult {
        success: bool,
        #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    RoomDeleted {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    SomebodyJoined {
        #[serde(rename = "roomID")]
        room_id: String,
    },
    ReceiveInput {
        payload: String,
    },
    ReceivePos {
        payload: PoseBundle,
    },
    Pong {
        t: u64,
    },
    Error {
        message: String,
    },
}

impl ClientMsg {
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerMsg {
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ------------------------------------------------------------------
// input payload
// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    pub player: Player,
    #[serde(rename = "keyMap")]
    pub key_map: BTreeMap<String, bool>,
}

impl InputPayload {
    pub fn new(player: Player, controls: &Controls) -> Self {
        Self { player, key_map: controls.to_key_map() }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn controls(&self) -> Controls {
        Controls::from_key_map(&self.key_map)
    }
}

// ------------------------------------------------------------------
// pose bundle
// ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

impl From<&Isometry<Real>> for Vec3 {
    fn from(pose: &Isometry<Real>) -> Self {
        let t = pose.translation.vector;
        Self { x: t.x, y: t.y, z: t.z }
    }
}

impl From<&Isometry<Real>> for Quat {
    fn from(pose: &Isometry<Real>) -> Self {
        let q = pose.rotation;
        Self { x: q.i, y: q.j, z: q.k, w: q.w }
    }
}

impl Quat {
    /// A degenerate (all-zero) quaternion decodes as identity.
    pub fn to_rotation(&self) -> UnitQuaternion<Real> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        UnitQuaternion::try_new(q, 1.0e-6).unwrap_or_else(UnitQuaternion::identity)
    }
}

fn isometry(position: &Vec3, orientation: &Quat) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        orientation.to_rotation(),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorePair {
    pub p1: u32,
    pub p2: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarPositions {
    pub chassis: Vec3,
    pub wheels: [Vec3; WHEEL_COUNT],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarOrientations {
    pub chassis: Quat,
    pub wheels: [Quat; WHEEL_COUNT],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Positions {
    pub p1: CarPositions,
    pub p2: CarPositions,
    pub ball: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientations {
    pub p1: CarOrientations,
    pub p2: CarOrientations,
    pub ball: Quat,
}

/// Snapshot of everything the authoritative peer owns: both cars, the ball
/// and both scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseBundle {
    pub score: ScorePair,
    pub position: Positions,
    pub quaternion: Orientations,
}

impl PoseBundle {
    pub fn capture(score: ScorePair, p1: &CarPose, p2: &CarPose, ball: &Isometry<Real>) -> Self {
        let positions = |car: &CarPose| CarPositions {
            chassis: Vec3::from(&car.chassis),
            wheels: car.wheels.each_ref().map(Vec3::from),
        };
        let orientations = |car: &CarPose| CarOrientations {
            chassis: Quat::from(&car.chassis),
            wheels: car.wheels.each_ref().map(Quat::from),
        };

        Self {
            score,
            position: Positions {
                p1: positions(p1),
                p2: positions(p2),
                ball: Vec3::from(ball),
            },
            quaternion: Orientations {
                p1: orientations(p1),
                p2: orientations(p2),
                ball: Quat::from(ball),
            },
        }
    }

    pub fn score(&self, player: Player) -> u32 {
        match player {
            Player::P1 => self.score.p1,
            Player::P2 => self.score.p2,
        }
    }

    pub fn car(&self, player: Player) -> CarPose {
        let (pos, rot) = match player {
            Player::P1 => (&self.position.p1, &self.quaternion.p1),
            Player::P2 => (&self.position.p2, &self.quaternion.p2),
        };
        let mut wheels = [Isometry::identity(); WHEEL_COUNT];
        for (slot, (p, q)) in wheels.iter_mut().zip(pos.wheels.iter().zip(&rot.wheels)) {
            *slot = isometry(p, q);
        }
        CarPose { chassis: isometry(&pos.chassis, &rot.chassis), wheels }
    }

    pub fn ball(&self) -> Isometry<Real> {
        isometry(&self.position.ball, &self.quaternion.ball)
    }
}
