//! Playing field: ground plane, four boundary walls and a ceiling.

use rapier3d::prelude::*;

use crate::physics::{BodyTag, PhysicsWorld};

const SIZE_FACTOR: Real = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaSize {
    pub width: Real,          // along x, goal to goal
    pub depth: Real,          // along z
    pub wall_height: Real,
    pub wall_thickness: Real,
}

impl Default for ArenaSize {
    fn default() -> Self {
        Self {
            width: 105.0 * SIZE_FACTOR,
            depth: 68.0 * SIZE_FACTOR,
            wall_height: 40.0,
            wall_thickness: 1.0,
        }
    }
}

impl ArenaSize {
    pub fn half_width(&self) -> Real {
        self.width * 0.5
    }
}

pub struct Arena {
    pub size: ArenaSize,
    pub colliders: Vec<ColliderHandle>,
}

impl Arena {
    pub fn build(world: &mut PhysicsWorld, size: ArenaSize) -> Self {
        let ArenaSize { width, depth, wall_height: h, wall_thickness: t } = size;
        let mut colliders = Vec::with_capacity(6);

        // Ground: top surface exactly at y = 0.
        let mut slab = |center: Vector<Real>, half: Vector<Real>| {
            let (_, collider) = world.insert(
                RigidBodyBuilder::fixed().translation(center).build(),
                ColliderBuilder::cuboid(half.x, half.y, half.z)
                    .friction(1.0)
                    .restitution(0.0)
                    .build(),
                BodyTag::Arena,
            );
            colliders.push(collider);
        };

        slab(vector![0.0, -0.5, 0.0], vector![width * 0.5, 0.5, depth * 0.5]);

        // front / back
        for z in [-depth * 0.5, depth * 0.5] {
            slab(vector![0.0, h * 0.5, z], vector![width * 0.5, h * 0.5, t * 0.5]);
        }
        // left / right (goal ends)
        for x in [-width * 0.5, width * 0.5] {
            slab(vector![x, h * 0.5, 0.0], vector![t * 0.5, h * 0.5, depth * 0.5]);
        }
        // ceiling
        slab(vector![0.0, h, 0.0], vector![width * 0.5, 0.5, depth * 0.5]);

        Self { size, colliders }
    }
}
