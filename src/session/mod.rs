// ==============================================================================
// session - ONE MATCH, FROM LAUNCH TO EXIT
// ------------------------------------------------------------------------------
// A Session owns the pitch (physics world, cars, ball, goals, score), reads the
// keyboard, talks to the peer when networked and drives the chase camera.
//
// Main entry:
// - tick(frame_dt)
//     1. step physics (dt clamped to MAX_FRAME_DT) and cap wheel spin
//     2. route every new collision through the goal handler
//     3. refresh renderable poses
//     4. local controls → local car (and p2's split keys in local two-player)
//     5. networked: remote input → remote car, publish input / poses,
//        adopt the newest inbound pose bundle
//     6. chase camera follows the local car
//     7. exit key → exit()
//
// Lifecycle: Idle → Running → Exited. There is no pause and no restart; every
// launch builds a new Session.
// ==============================================================================

pub mod driver;
pub mod network;
pub mod pitch;

use std::sync::Arc;
use tracing::info;

use crate::camera::ChaseCamera;
use crate::config::SyncSettings;
use crate::hooks::{EngineAudio, LogHooks, MenuHost};
use crate::input::{InputCapture, Layout};
use crate::physics::{Collision, PhysicsError};
use crate::score::ScoreLedger;
use crate::spawn::Player;
use crate::transport::Transport;

use self::network::NetSync;
use self::pitch::Pitch;

/// Longest frame the simulation will take in one tick (seconds).
pub const MAX_FRAME_DT: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Solo,
    LocalTwoPlayer,
    Networked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Exited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub mode: Mode,
    pub local: Player,
    pub room: Option<String>,
    pub authoritative: bool,
    pub sync: SyncSettings,
}

impl SessionConfig {
    pub fn solo() -> Self {
        Self {
            mode: Mode::Solo,
            local: Player::P1,
            room: None,
            authoritative: true,
            sync: SyncSettings::default(),
        }
    }

    pub fn local_two_player() -> Self {
        Self { mode: Mode::LocalTwoPlayer, ..Self::solo() }
    }

    pub fn networked(local: Player, room: String, authoritative: bool, sync: SyncSettings) -> Self {
        Self {
            mode: Mode::Networked,
            local,
            room: Some(room),
            authoritative,
            sync,
        }
    }

    /// Car steered from this keyboard (the camera follows it).
    pub fn local_car(&self) -> Player {
        match self.mode {
            Mode::Networked => self.local,
            Mode::Solo | Mode::LocalTwoPlayer => Player::P1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("networked session needs a transport")]
    MissingTransport,

    #[error("networked session needs a room id")]
    MissingRoom,

    #[error("failed to build the pitch: {0}")]
    Physics(#[from] PhysicsError),
}

/// Collaborators a session is wired to.
pub struct SessionParts {
    pub input: InputCapture,
    pub score: ScoreLedger,
    pub transport: Option<Arc<dyn Transport>>,
    pub menu: Box<dyn MenuHost>,
    pub audio: Box<dyn EngineAudio>,
}

impl Default for SessionParts {
    fn default() -> Self {
        Self {
            input: InputCapture::new(),
            score: ScoreLedger::in_memory(),
            transport: None,
            menu: Box::new(LogHooks),
            audio: Box::new(LogHooks),
        }
    }
}

pub struct Session {
    config: SessionConfig,
    state: SessionState,
    pitch: Pitch,
    input: InputCapture,
    camera: ChaseCamera,
    net: Option<NetSync>,
    menu: Box<dyn MenuHost>,
    audio: Box<dyn EngineAudio>,
    ticks: u64,
}

impl Session {
    /// Build the whole match or nothing.
    pub fn new(config: SessionConfig, parts: SessionParts) -> Result<Self, SessionError> {
        let SessionParts { input, mut score, transport, menu, audio } = parts;

        let net_target = match config.mode {
            Mode::Networked => {
                let transport = transport.ok_or(SessionError::MissingTransport)?;
                let room = config.room.clone().ok_or(SessionError::MissingRoom)?;
                Some((transport, room))
            }
            Mode::Solo | Mode::LocalTwoPlayer => None,
        };

        score.reset();
        let pitch = Pitch::build(config.mode != Mode::Solo, score)?;

        let net = net_target.map(|(transport, room)| {
            NetSync::new(transport, room, config.local, config.authoritative, config.sync)
        });

        let mut camera = ChaseCamera::default();
        if let Some(car) = pitch.car(config.local_car()) {
            camera.position = ChaseCamera::target(&car.visual().chassis);
        }

        info!(
            mode = ?config.mode,
            local = %config.local,
            room = config.room.as_deref().unwrap_or("-"),
            authoritative = config.authoritative,
            "🏟️  session ready"
        );

        Ok(Self {
            config,
            state: SessionState::Idle,
            pitch,
            input,
            camera,
            net,
            menu,
            audio,
            ticks: 0,
        })
    }

    pub fn start(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Running;
            info!("▶️  session running");
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn input(&self) -> &InputCapture {
        &self.input
    }

    pub fn camera(&self) -> &ChaseCamera {
        &self.camera
    }

    pub fn pitch(&self) -> &Pitch {
        &self.pitch
    }

    pub fn pitch_mut(&mut self) -> &mut Pitch {
        &mut self.pitch
    }

    pub fn score(&self, player: Player) -> u32 {
        self.pitch.score.get_score(player)
    }

    pub fn is_subscribed(&self) -> bool {
        self.net.as_ref().is_some_and(NetSync::is_subscribed)
    }

    fn local_layout(&self) -> Layout {
        match self.config.mode {
            Mode::LocalTwoPlayer => Layout::Split(Player::P1),
            Mode::Solo | Mode::Networked => Layout::Combined,
        }
    }

    pub fn tick(&mut self, frame_dt: f32) {
        if self.state != SessionState::Running {
            return;
        }
        self.ticks += 1;
        let dt = frame_dt.clamp(0.0, MAX_FRAME_DT);

        let hits = self.pitch.step(dt);
        for hit in &hits {
            self.dispatch_collision(hit);
        }
        self.pitch.refresh();

        let local = self.config.local_car();
        let keys = self.input.snapshot();
        let controls = keys.controls(self.local_layout());
        self.pitch.drive(local, &controls);

        if self.config.mode == Mode::LocalTwoPlayer {
            self.pitch.drive(Player::P2, &keys.controls(Layout::Split(Player::P2)));
        }

        if let Some(net) = self.net.as_mut() {
            if let Some(remote) = net.remote_controls() {
                self.pitch.drive(local.opponent(), &remote);
            }
            net.publish_input(controls);
            net.publish_pose(&self.pitch);
            net.adopt_pose(&mut self.pitch);
        }

        if let Some(car) = self.pitch.car(local) {
            self.camera.follow(&car.visual().chassis);
        }

        if controls.exit {
            self.exit();
        }
    }

    pub(crate) fn dispatch_collision(&mut self, hit: &Collision) -> Option<Player> {
        self.pitch.dispatch_collision(hit)
    }

    /// Leave the match and hand control back to the menu. Safe to call twice.
    pub fn exit(&mut self) {
        if self.state == SessionState::Exited {
            return;
        }
        self.state = SessionState::Exited;

        if let Some(net) = self.net.as_mut() {
            net.release();
        }
        self.audio.silence();
        self.menu.hide_scoreboard();
        self.menu.hide_canvas();
        self.menu.show_main_menu();

        info!(
            ticks = self.ticks,
            p1 = self.score(Player::P1),
            p2 = self.score(Player::P2),
            "🏁 session exited"
        );
    }
}
