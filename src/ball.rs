use rapier3d::prelude::*;

use crate::physics::{BodyTag, Collision, PhysicsError, PhysicsWorld};

pub const BALL_RADIUS: Real = 1.5;

/// Light enough that a car barely notices it, heavy enough to stay dynamic.
pub const BALL_MASS: Real = 0.01;

pub struct Ball {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    spawn: Isometry<Real>,
    baseline: Option<Isometry<Real>>,
    visual: Isometry<Real>,
}

impl Ball {
    pub fn spawn(world: &mut PhysicsWorld, position: [f32; 3]) -> Result<Self, PhysicsError> {
        let [x, y, z] = position;
        let (body, collider) = world.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![x, y, z])
                .ccd_enabled(true)
                .build(),
            ColliderBuilder::ball(BALL_RADIUS)
                .mass(BALL_MASS)
                .restitution(0.8)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            BodyTag::Ball,
        );
        let spawn = *world.body(body)?.position();

        Ok(Self {
            body,
            collider,
            spawn,
            baseline: None,
            visual: spawn,
        })
    }

    /// Identity the physics step reports in collision pairs.
    pub fn identity(&self) -> ColliderHandle {
        self.collider
    }

    pub fn body_handle(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn visual(&self) -> &Isometry<Real> {
        &self.visual
    }

    pub fn baseline(&self) -> Option<&Isometry<Real>> {
        self.baseline.as_ref()
    }

    pub fn body_pose(&self, world: &PhysicsWorld) -> Result<Isometry<Real>, PhysicsError> {
        Ok(*world.body(self.body)?.position())
    }

    /// `(other, self)` when the ball took part in `collision`. Which bodies
    /// matter is up to the caller.
    pub fn contact(&self, collision: &Collision) -> Option<(ColliderHandle, ColliderHandle)> {
        collision.other(self.collider).map(|other| (other, self.collider))
    }

    pub fn update(&mut self, world: &PhysicsWorld) {
        if let Some(pose) = world.pose(self.body) {
            self.visual = pose;
        }
    }

    pub fn reset_position(&mut self, world: &mut PhysicsWorld) {
        let baseline = *self.baseline.get_or_insert(self.spawn);
        world.teleport(self.body, baseline);
    }

    pub fn update_position_from_network(&self, world: &mut PhysicsWorld, pose: &Isometry<Real>) {
        if let Some(body) = world.body_mut(self.body) {
            body.set_translation(pose.translation.vector, true);
        }
    }

    pub fn update_pose_from_network(&self, world: &mut PhysicsWorld, pose: &Isometry<Real>) {
        if let Some(body) = world.body_mut(self.body) {
            body.set_position(*pose, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::BALL_SPAWN;

    #[test]
    fn mass_is_tiny_but_dynamic() {
        let mut world = PhysicsWorld::new();
        let ball = Ball::spawn(&mut world, BALL_SPAWN).unwrap();
        let body = world.body(ball.body_handle()).unwrap();
        assert!(body.is_dynamic());
        assert!(body.mass() > 0.0 && body.mass() < 0.1);
    }

    #[test]
    fn reset_is_idempotent_and_stops_the_ball() {
        let mut world = PhysicsWorld::new();
        let mut ball = Ball::spawn(&mut world, BALL_SPAWN).unwrap();
        world.body_mut(ball.body_handle()).unwrap().set_linvel(vector![4.0, 0.0, 1.0], true);
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }

        ball.reset_position(&mut world);
        let first = ball.body_pose(&world).unwrap();
        world.step(0.1);
        ball.reset_position(&mut world);
        let second = ball.body_pose(&world).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.translation.vector, vector![0.0, 1.5, 0.0]);
        assert_eq!(world.body(ball.body_handle()).unwrap().linvel().norm(), 0.0);
    }

    #[test]
    fn forwards_only_its_own_contacts() {
        let mut world = PhysicsWorld::new();
        let ball = Ball::spawn(&mut world, BALL_SPAWN).unwrap();
        let other = ColliderHandle::from_raw_parts(40, 0);
        let stranger = ColliderHandle::from_raw_parts(41, 0);

        let hit = Collision { a: other, b: ball.identity() };
        assert_eq!(ball.contact(&hit), Some((other, ball.identity())));
        assert_eq!(ball.contact(&Collision { a: other, b: stranger }), None);
    }

    #[test]
    fn update_mirrors_body_pose() {
        let mut world = PhysicsWorld::new();
        let mut ball = Ball::spawn(&mut world, BALL_SPAWN).unwrap();
        world.step(0.1);
        ball.update(&world);
        assert_eq!(*ball.visual(), ball.body_pose(&world).unwrap());
    }
}
