// ==============================================================================
// physics.rs - RIGID BODY WORLD ADAPTER
// ------------------------------------------------------------------------------
// Owns every rapier set for one match: cars (chassis + 4 wheel bodies joined by
// revolute hinges), the ball, the arena and the goal sensors.
//
// Main entry:
// - step(dt)
//     Advances the world by `dt` seconds, split into substeps no longer than
//     MAX_SUBSTEP, and returns the collision pairs that *started* during the
//     frame. Torques added since the previous frame act for the whole frame and
//     are cleared afterwards, matching a per-frame force accumulator.
//
// Notes:
// - Every collider is registered with a BodyTag so collision pairs can be
//   logged and classified without holding references into the sets.
// - Bodies that leave the sane coordinate range are put back near the origin.
// ==============================================================================

use rapier3d::crossbeam::channel::unbounded;
use rapier3d::na::Unit;
use rapier3d::prelude::*;
use std::collections::HashMap;
use tracing::{trace, warn};

use crate::spawn::Player;

pub const GRAVITY_Y: Real = -9.82;

/// Longest single rapier step; longer frames are split.
const MAX_SUBSTEP: Real = 1.0 / 60.0;

/// Anything further out than this has tunnelled through the arena.
const MAX_COORD: Real = 1_000.0;

/// What a collider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyTag {
    Arena,
    Ball,
    Goal(Player),
    Chassis(Player),
    Wheel(Player, usize),
}

/// A contact (or sensor overlap) that began during the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub a: ColliderHandle,
    pub b: ColliderHandle,
}

impl Collision {
    /// The other participant, if `me` is one of the two colliders.
    pub fn other(&self, me: ColliderHandle) -> Option<ColliderHandle> {
        if self.a == me {
            Some(self.b)
        } else if self.b == me {
            Some(self.a)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("rigid body {0:?} is not in the world")]
    MissingBody(RigidBodyHandle),
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,                      // gravity vector
    pub integration: IntegrationParameters,         // dt is overwritten per substep
    pub pipeline: PhysicsPipeline,                  // physics pipeline
    pub island_manager: IslandManager,              // manages islands of bodies
    pub broad_phase: DefaultBroadPhase,             // broad-phase collision detection
    pub narrow_phase: NarrowPhase,                  // collision detection
    pub bodies: RigidBodySet,                       // for rigid bodies
    pub colliders: ColliderSet,                     // for collision shapes
    pub joints: ImpulseJointSet,                    // wheel hinges
    pub multibody_joints: MultibodyJointSet,        // unused, required by the pipeline
    pub ccd: CCDSolver,                             // continuous collision detection
    tags: HashMap<ColliderHandle, BodyTag>,         // collider → owner
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, GRAVITY_Y, 0.0],
            integration: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            tags: HashMap::new(),
        }
    }

    /// Insert a body with a single collider and remember who owns it.
    pub fn insert(
        &mut self,
        body: RigidBody,
        collider: Collider,
        tag: BodyTag,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        self.tags.insert(collider, tag);
        (body, collider)
    }

    pub fn insert_joint(
        &mut self,
        parent: RigidBodyHandle,
        child: RigidBodyHandle,
        joint: impl Into<GenericJoint>,
    ) -> ImpulseJointHandle {
        self.joints.insert(parent, child, joint, true)
    }

    pub fn tag(&self, collider: ColliderHandle) -> Option<BodyTag> {
        self.tags.get(&collider).copied()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Result<&RigidBody, PhysicsError> {
        self.bodies
            .get(handle)
            .ok_or(PhysicsError::MissingBody(handle))
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn pose(&self, handle: RigidBodyHandle) -> Option<Isometry<Real>> {
        self.bodies.get(handle).map(|b| *b.position())
    }

    /// Move a body to `pose` and leave it at rest.
    pub fn teleport(&mut self, handle: RigidBodyHandle, pose: Isometry<Real>) {
        let Some(body) = self.bodies.get_mut(handle) else { return };
        body.set_position(pose, true);
        body.set_linvel(Vector::zeros(), true);
        body.set_angvel(Vector::zeros(), true);
        body.reset_forces(true);
        body.reset_torques(true);
    }

    /// Re-aim a hinge. `axis` is expressed in the parent (chassis) frame.
    pub fn set_hinge_axis(&mut self, joint: ImpulseJointHandle, axis: Vector<Real>) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.data.set_local_axis1(Unit::new_normalize(axis));
        }
    }

    pub fn step(&mut self, dt: Real) -> Vec<Collision> {
        let mut started = Vec::new();
        if !(dt > 0.0) {
            return started;
        }

        let (collision_send, collision_recv) = unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = unbounded::<ContactForceEvent>();
        let events = ChannelEventCollector::new(collision_send, force_send);
        let hooks = ();

        let substeps = (dt / MAX_SUBSTEP).ceil().max(1.0) as usize;
        self.integration.dt = dt / substeps as Real;

        for _ in 0..substeps {
            self.pipeline.step(
                &self.gravity,
                &self.integration,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                None,
                &hooks,
                &events,
            );

            while let Ok(event) = collision_recv.try_recv() {
                if let CollisionEvent::Started(a, b, _) = event {
                    trace!(a = ?self.tag(a), b = ?self.tag(b), "collision started");
                    started.push(Collision { a, b });
                }
            }
        }

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);

            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.abs().max() > MAX_COORD;

            if bad {
                warn!(position = ?pos, "resetting runaway body");
                body.set_translation(vector![0.0, 1.0, 0.0], true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(Vector::zeros(), true);
            }
        }

        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground(world: &mut PhysicsWorld) {
        world.insert(
            RigidBodyBuilder::fixed().translation(vector![0.0, -0.5, 0.0]).build(),
            ColliderBuilder::cuboid(50.0, 0.5, 50.0).build(),
            BodyTag::Arena,
        );
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut world = PhysicsWorld::new();
        let (body, _) = world.insert(
            RigidBodyBuilder::dynamic().translation(vector![0.0, 5.0, 0.0]).build(),
            ColliderBuilder::ball(0.5).build(),
            BodyTag::Ball,
        );
        assert!(world.step(0.0).is_empty());
        assert_eq!(world.body(body).unwrap().translation().y, 5.0);
    }

    #[test]
    fn bodies_fall_under_gravity() {
        let mut world = PhysicsWorld::new();
        let (body, _) = world.insert(
            RigidBodyBuilder::dynamic().translation(vector![0.0, 5.0, 0.0]).build(),
            ColliderBuilder::ball(0.5).build(),
            BodyTag::Ball,
        );
        world.step(0.1);
        assert!(world.body(body).unwrap().translation().y < 5.0);
    }

    #[test]
    fn sensor_overlap_reports_started_collision() {
        let mut world = PhysicsWorld::new();
        ground(&mut world);
        let (_, sensor) = world.insert(
            RigidBodyBuilder::fixed().translation(vector![0.0, 1.0, 0.0]).build(),
            ColliderBuilder::cuboid(2.0, 1.0, 2.0)
                .sensor(true)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            BodyTag::Goal(Player::P2),
        );
        let (_, ball) = world.insert(
            RigidBodyBuilder::dynamic().translation(vector![0.0, 4.0, 0.0]).build(),
            ColliderBuilder::ball(0.5)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            BodyTag::Ball,
        );

        let mut hits = Vec::new();
        for _ in 0..120 {
            hits.extend(world.step(1.0 / 60.0));
        }
        assert!(hits.iter().any(|c| c.other(ball) == Some(sensor)));
        assert_eq!(world.tag(sensor), Some(BodyTag::Goal(Player::P2)));
    }

    #[test]
    fn teleport_leaves_body_at_rest() {
        let mut world = PhysicsWorld::new();
        let (body, _) = world.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![0.0, 5.0, 0.0])
                .linvel(vector![3.0, 0.0, 0.0])
                .build(),
            ColliderBuilder::ball(0.5).build(),
            BodyTag::Ball,
        );
        world.teleport(body, Isometry::translation(1.0, 2.0, 3.0));
        let b = world.body(body).unwrap();
        assert_eq!(*b.translation(), vector![1.0, 2.0, 3.0]);
        assert_eq!(b.linvel().norm(), 0.0);
    }

    #[test]
    fn collision_other_side() {
        let a = ColliderHandle::from_raw_parts(1, 0);
        let b = ColliderHandle::from_raw_parts(2, 0);
        let c = ColliderHandle::from_raw_parts(3, 0);
        let hit = Collision { a, b };
        assert_eq!(hit.other(a), Some(b));
        assert_eq!(hit.other(b), Some(a));
        assert_eq!(hit.other(c), None);
    }
}
