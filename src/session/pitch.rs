//! Everything physical in one match: world, arena, goals, cars, ball, score.

use rapier3d::prelude::*;
use tracing::{info, warn};

use crate::arena::{Arena, ArenaSize};
use crate::ball::Ball;
use crate::goal::{Goal, GOAL_SHAPE};
use crate::input::Controls;
use crate::physics::{Collision, PhysicsError, PhysicsWorld};
use crate::protocol::{PoseBundle, ScorePair};
use crate::score::ScoreLedger;
use crate::spawn::{spawn_for, Player, BALL_SPAWN};
use crate::vehicle::{Vehicle, OCTANE};

pub struct Pitch {
    pub world: PhysicsWorld,
    pub arena: Arena,
    pub goals: [Goal; 2],
    pub p1: Vehicle,
    pub p2: Option<Vehicle>,   // absent in solo
    pub ball: Ball,
    pub score: ScoreLedger,
}

impl Pitch {
    pub fn build(with_p2: bool, score: ScoreLedger) -> Result<Self, PhysicsError> {
        let mut world = PhysicsWorld::new();
        let size = ArenaSize::default();
        let arena = Arena::build(&mut world, size);
        let goals = [
            Goal::spawn(&mut world, Player::P1, &size, GOAL_SHAPE),
            Goal::spawn(&mut world, Player::P2, &size, GOAL_SHAPE),
        ];
        let p1 = Vehicle::spawn(&mut world, Player::P1, spawn_for(Player::P1), OCTANE)?;
        let p2 = if with_p2 {
            Some(Vehicle::spawn(&mut world, Player::P2, spawn_for(Player::P2), OCTANE)?)
        } else {
            None
        };
        let ball = Ball::spawn(&mut world, BALL_SPAWN)?;

        Ok(Self { world, arena, goals, p1, p2, ball, score })
    }

    pub fn car(&self, player: Player) -> Option<&Vehicle> {
        match player {
            Player::P1 => Some(&self.p1),
            Player::P2 => self.p2.as_ref(),
        }
    }

    /// Advance physics and cap wheel spin; returns collisions that began.
    pub fn step(&mut self, dt: Real) -> Vec<Collision> {
        let hits = self.world.step(dt);
        let world = &mut self.world;
        for car in std::iter::once(&self.p1).chain(self.p2.as_ref()) {
            car.enforce_speed_cap(world);
        }
        hits
    }

    /// Single handler for every collision of the frame. Only ball-in-goal
    /// does anything; returns who scored.
    pub fn dispatch_collision(&mut self, hit: &Collision) -> Option<Player> {
        let (other, _) = self.ball.contact(hit)?;
        let goal = self.goals.iter().find(|g| g.identity() == other)?;
        let scorer = goal.scorer();

        let score = self.score.get_score(scorer) + 1;
        self.score.update_score(scorer, score);
        info!(%scorer, score, "🥅 goal");

        self.reset_all();
        Some(scorer)
    }

    pub fn reset_all(&mut self) {
        let world = &mut self.world;
        for car in std::iter::once(&mut self.p1).chain(self.p2.as_mut()) {
            car.reset_position(world);
        }
        self.ball.reset_position(world);
    }

    /// Copy body poses into renderable poses.
    pub fn refresh(&mut self) {
        let world = &self.world;
        for car in std::iter::once(&mut self.p1).chain(self.p2.as_mut()) {
            car.update(world);
        }
        self.ball.update(world);
    }

    /// Steering is zeroed first; then every held control is applied.
    pub fn drive(&mut self, player: Player, controls: &Controls) {
        let car = match player {
            Player::P1 => &mut self.p1,
            Player::P2 => match self.p2.as_mut() {
                Some(car) => car,
                None => return,
            },
        };
        let world = &mut self.world;

        car.set_zero_torque(world);
        if controls.accelerate {
            car.accelerate(world);
        }
        if controls.reverse {
            car.reverse(world);
        }
        if controls.left {
            car.turn_left(world);
        }
        if controls.right {
            car.turn_right(world);
        }
        if controls.reset {
            car.reset_position(world);
        }
    }

    /// Snapshot for the peer. Needs both cars.
    pub fn capture(&self) -> Option<PoseBundle> {
        let p2 = self.p2.as_ref()?;
        self.try_capture(p2)
            .map_err(|e| warn!(error = %e, "cannot capture pose bundle"))
            .ok()
    }

    fn try_capture(&self, p2: &Vehicle) -> Result<PoseBundle, PhysicsError> {
        let score = ScorePair {
            p1: self.score.get_score(Player::P1),
            p2: self.score.get_score(Player::P2),
        };
        Ok(PoseBundle::capture(
            score,
            &self.p1.body_pose(&self.world)?,
            &p2.body_pose(&self.world)?,
            &self.ball.body_pose(&self.world)?,
        ))
    }

    /// Adopt the peer's world: scores verbatim, then every body pose.
    pub fn apply(&mut self, bundle: &PoseBundle, orientation: bool) {
        for player in Player::ALL {
            self.score.update_score(player, bundle.score(player));
        }

        let world = &mut self.world;
        for car in std::iter::once(&self.p1).chain(self.p2.as_ref()) {
            let pose = bundle.car(car.owner);
            if orientation {
                car.update_pose_from_network(world, &pose);
            } else {
                car.update_position_from_network(world, &pose);
            }
        }

        let ball = bundle.ball();
        if orientation {
            self.ball.update_pose_from_network(world, &ball);
        } else {
            self.ball.update_position_from_network(world, &ball);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{MemoryStore, RecordingDisplay};

    fn pitch(with_p2: bool) -> (Pitch, RecordingDisplay) {
        let display = RecordingDisplay::default();
        let score = ScoreLedger::new(Box::new(MemoryStore::default()), Box::new(display.clone()));
        (Pitch::build(with_p2, score).unwrap(), display)
    }

    #[test]
    fn solo_pitch_has_no_second_car() {
        let (pitch, _) = pitch(false);
        assert!(pitch.car(Player::P2).is_none());
        assert_eq!(pitch.arena.colliders.len(), 6);
    }

    #[test]
    fn ball_in_p2_goal_scores_for_p1_and_resets() {
        let (mut pitch, _) = pitch(true);
        let p2_goal = pitch.goals[1].identity();

        pitch.world.teleport(pitch.ball.body_handle(), Isometry::translation(10.0, 1.5, 3.0));
        let hit = Collision { a: p2_goal, b: pitch.ball.identity() };

        assert_eq!(pitch.dispatch_collision(&hit), Some(Player::P1));
        assert_eq!(pitch.score.get_score(Player::P1), 1);
        assert_eq!(pitch.score.get_score(Player::P2), 0);
        let ball = pitch.ball.body_pose(&pitch.world).unwrap();
        assert_eq!(ball.translation.vector, vector![0.0, 1.5, 0.0]);
    }

    #[test]
    fn other_collisions_are_ignored() {
        let (mut pitch, display) = pitch(true);
        let chassis = pitch.p1.chassis_collider();
        let wall = pitch.arena.colliders[1];
        let goal = pitch.goals[0].identity();

        assert_eq!(pitch.dispatch_collision(&Collision { a: chassis, b: wall }), None);
        assert_eq!(pitch.dispatch_collision(&Collision { a: chassis, b: goal }), None);
        assert_eq!(
            pitch.dispatch_collision(&Collision { a: pitch.ball.identity(), b: wall }),
            None
        );
        assert!(display.shown.lock().is_empty());
    }

    #[test]
    fn capture_then_apply_moves_bodies() {
        let (mut source, _) = pitch(true);
        let (mut mirror, _) = pitch(true);

        source.world.teleport(source.ball.body_handle(), Isometry::translation(4.0, 2.0, -1.0));
        source.score.update_score(Player::P2, 3);
        let bundle = source.capture().unwrap();

        mirror.apply(&bundle, true);
        assert_eq!(mirror.score.get_score(Player::P2), 3);
        let ball = mirror.ball.body_pose(&mirror.world).unwrap();
        assert_eq!(ball.translation.vector, vector![4.0, 2.0, -1.0]);
    }

    #[test]
    fn capture_needs_both_cars() {
        let (pitch, _) = pitch(false);
        assert!(pitch.capture().is_none());
    }
}
