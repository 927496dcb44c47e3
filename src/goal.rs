use rapier3d::prelude::*;
use std::f32::consts::PI;

use crate::arena::ArenaSize;
use crate::physics::{BodyTag, PhysicsWorld};
use crate::spawn::Player;

/// Sensor volume in front of one end wall.
#[derive(Debug, Clone, Copy)]
pub struct GoalShape {
    pub half_depth: Real,   // along x, into the field
    pub half_height: Real,
    pub half_width: Real,   // along z, post to post
    pub lateral_offset: Real,
}

pub const GOAL_SHAPE: GoalShape = GoalShape {
    half_depth: 1.0,
    half_height: 3.0,
    half_width: 5.0,
    lateral_offset: 0.0,
};

/// Static trigger at one end of the field. A ball touching the goal that
/// belongs to `side` scores for the other player.
pub struct Goal {
    pub side: Player,
    pub pose: Isometry<Real>,
    collider: ColliderHandle,
}

impl Goal {
    pub fn spawn(world: &mut PhysicsWorld, side: Player, field: &ArenaSize, shape: GoalShape) -> Self {
        // p1 defends -x, p2 defends +x; the sign flips every lateral offset.
        let (sign, rotation) = match side {
            Player::P1 => (-1.0, PI),
            Player::P2 => (1.0, 0.0),
        };
        let x = sign * (field.half_width() - field.wall_thickness * 0.5 - shape.half_depth);
        let z = sign * shape.lateral_offset;
        let pose = Isometry::new(vector![x, shape.half_height, z], vector![0.0, rotation, 0.0]);

        let (_, collider) = world.insert(
            RigidBodyBuilder::fixed().position(pose).build(),
            ColliderBuilder::cuboid(shape.half_depth, shape.half_height, shape.half_width)
                .sensor(true)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            BodyTag::Goal(side),
        );

        Self { side, pose, collider }
    }

    pub fn identity(&self) -> ColliderHandle {
        self.collider
    }

    /// Player credited when the ball enters this goal.
    pub fn scorer(&self) -> Player {
        self.side.opponent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goals_are_mirrored_across_the_field() {
        let mut world = PhysicsWorld::new();
        let field = ArenaSize::default();
        let p1 = Goal::spawn(&mut world, Player::P1, &field, GOAL_SHAPE);
        let p2 = Goal::spawn(&mut world, Player::P2, &field, GOAL_SHAPE);

        assert_eq!(p1.pose.translation.x, -p2.pose.translation.x);
        assert!(p2.pose.translation.x > 0.0);
        assert_ne!(p1.identity(), p2.identity());
        assert_eq!(p2.scorer(), Player::P1);
        assert_eq!(world.tag(p1.identity()), Some(BodyTag::Goal(Player::P1)));
    }
}
