// ==============================================================================
// vehicle.rs - FOUR WHEEL RIGID VEHICLE
// ------------------------------------------------------------------------------
// A chassis body with four sphere wheels, each held by a revolute hinge whose
// axis points along the chassis z axis. Wheels 0/1 sit at the front and steer
// by re-aiming their hinge; wheels 2/3 sit at the rear and are driven with a
// torque about their hinge.
//
// Control entry points are called once per frame by the session:
// - set_zero_torque() first (steering does not self-centre), then any of
//   accelerate() / reverse() / turn_left() / turn_right() / reset_position().
// - update() copies body poses into the renderable poses after the step.
//
// Notes:
// - The orientation-reversed car is spawned with mirrored wheel offsets and
//   flips its drive sign, so every control means the same thing from that
//   car's own point of view.
// ==============================================================================

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::*;
use std::f32::consts::{FRAC_PI_2, PI};

use crate::physics::{BodyTag, PhysicsError, PhysicsWorld};
use crate::spawn::{Player, SpawnPoint};

pub const WHEEL_COUNT: usize = 4;
pub const STEERED_WHEELS: [usize; 2] = [0, 1];
pub const DRIVEN_WHEELS: [usize; 2] = [2, 3];

#[derive(Debug, Clone, Copy)]
pub struct VehicleConfig {
    pub max_force: f32,                     // drive torque per driven wheel
    pub max_speed: f32,                     // wheel angular speed cap (rad/s)
    pub max_steer: f32,                     // radians
    pub chassis_mass: f32,
    pub chassis_half_extents: [f32; 3],
    pub chassis_offset: [f32; 3],           // collider offset from the body origin
    pub wheel_mass: f32,
    pub wheel_radius: f32,
    pub wheel_angular_damping: f32,
    pub wheel_offsets: [[f32; 3]; WHEEL_COUNT], // FL, FR, RR, RL in chassis space
}

pub const OCTANE: VehicleConfig = VehicleConfig {
    max_force: 10.0,
    max_speed: 20.0,
    max_steer: PI / 16.0,
    chassis_mass: 1.0,
    chassis_half_extents: [1.1, 0.3125, 0.375],
    chassis_offset: [0.0, 0.418, 0.0],
    wheel_mass: 1.0,
    wheel_radius: 0.35,
    wheel_angular_damping: 0.3,
    wheel_offsets: [
        [1.1, -0.25, 0.6],
        [1.1, -0.25, -0.6],
        [-0.5, -0.25, -0.6],
        [-0.5, -0.25, 0.6],
    ],
};

/// Chassis and wheel poses, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarPose {
    pub chassis: Isometry<Real>,
    pub wheels: [Isometry<Real>; WHEEL_COUNT],
}

#[derive(Debug, Clone, Copy)]
struct WheelBody {
    body: RigidBodyHandle,
    hinge: ImpulseJointHandle,
}

pub struct Vehicle {
    pub owner: Player,
    pub config: VehicleConfig,
    pub reversed: bool,
    chassis: RigidBodyHandle,
    chassis_collider: ColliderHandle,
    wheels: [WheelBody; WHEEL_COUNT],
    steer_angle: f32,                       // current steering (radians)
    drive_force: [f32; WHEEL_COUNT],        // last force requested per wheel
    spawn: CarPose,                         // pose at construction
    baseline: Option<CarPose>,              // captured on first reset, then fixed
    visual: CarPose,                        // renderable pose
}

impl Vehicle {
    pub fn spawn(
        world: &mut PhysicsWorld,
        owner: Player,
        at: SpawnPoint,
        config: VehicleConfig,
    ) -> Result<Self, PhysicsError> {
        let [x, y, z] = at.position;
        let [hx, hy, hz] = config.chassis_half_extents;
        let [cx, cy, cz] = config.chassis_offset;

        let (chassis, chassis_collider) = world.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![x, y, z])
                .ccd_enabled(true)
                .build(),
            ColliderBuilder::cuboid(hx, hy, hz)
                .translation(vector![cx, cy, cz])
                .mass(config.chassis_mass)
                .build(),
            BodyTag::Chassis(owner),
        );

        let mirror = if at.reversed { -1.0 } else { 1.0 };
        let mut index = 0;
        let wheels = config.wheel_offsets.map(|[ox, oy, oz]| {
            let offset = vector![ox * mirror, oy, oz * mirror];

            let (body, _) = world.insert(
                RigidBodyBuilder::dynamic()
                    .translation(vector![x, y, z] + offset)
                    .angular_damping(config.wheel_angular_damping)
                    .build(),
                ColliderBuilder::ball(config.wheel_radius)
                    .mass(config.wheel_mass)
                    .friction(1.0)
                    .build(),
                BodyTag::Wheel(owner, index),
            );
            index += 1;

            let hinge = RevoluteJointBuilder::new(Vector::z_axis())
                .local_anchor1(offset.into())
                .local_anchor2(point![0.0, 0.0, 0.0])
                .contacts_enabled(false);
            let hinge = world.insert_joint(chassis, body, hinge);

            WheelBody { body, hinge }
        });

        let mut vehicle = Self {
            owner,
            config,
            reversed: at.reversed,
            chassis,
            chassis_collider,
            wheels,
            steer_angle: 0.0,
            drive_force: [0.0; WHEEL_COUNT],
            spawn: CarPose {
                chassis: Isometry::identity(),
                wheels: [Isometry::identity(); WHEEL_COUNT],
            },
            baseline: None,
            visual: CarPose {
                chassis: Isometry::identity(),
                wheels: [Isometry::identity(); WHEEL_COUNT],
            },
        };
        vehicle.spawn = vehicle.body_pose(world)?;
        vehicle.update(world);
        Ok(vehicle)
    }

    pub fn chassis_handle(&self) -> RigidBodyHandle {
        self.chassis
    }

    pub fn chassis_collider(&self) -> ColliderHandle {
        self.chassis_collider
    }

    /// Every body of the car, chassis first.
    pub fn body_handles(&self) -> [RigidBodyHandle; WHEEL_COUNT + 1] {
        [
            self.chassis,
            self.wheels[0].body,
            self.wheels[1].body,
            self.wheels[2].body,
            self.wheels[3].body,
        ]
    }

    pub fn steer_angle(&self) -> f32 {
        self.steer_angle
    }

    pub fn drive_force(&self, index: usize) -> f32 {
        self.drive_force[index]
    }

    pub fn baseline(&self) -> Option<&CarPose> {
        self.baseline.as_ref()
    }

    /// Renderable pose, refreshed by `update`.
    pub fn visual(&self) -> &CarPose {
        &self.visual
    }

    /// Current body poses as simulated.
    pub fn body_pose(&self, world: &PhysicsWorld) -> Result<CarPose, PhysicsError> {
        let chassis = *world.body(self.chassis)?.position();
        let mut wheels = [Isometry::identity(); WHEEL_COUNT];
        for (slot, wheel) in wheels.iter_mut().zip(&self.wheels) {
            *slot = *world.body(wheel.body)?.position();
        }
        Ok(CarPose { chassis, wheels })
    }

    // --------------------------------------------------------------
    // drive
    // --------------------------------------------------------------

    fn direction(&self) -> f32 {
        if self.reversed { -1.0 } else { 1.0 }
    }

    pub fn accelerate(&mut self, world: &mut PhysicsWorld) {
        // Negative torque about +z rolls the car toward +x.
        let force = -self.config.max_force * self.direction();
        self.drive(world, force);
    }

    pub fn reverse(&mut self, world: &mut PhysicsWorld) {
        let force = self.config.max_force * 0.5 * self.direction();
        self.drive(world, force);
    }

    fn drive(&mut self, world: &mut PhysicsWorld, force: f32) {
        for i in DRIVEN_WHEELS {
            let applied = if self.wheel_speed(world, i).abs() < self.config.max_speed {
                force
            } else {
                0.0
            };
            self.apply_wheel_force(world, i, applied);
        }
    }

    fn apply_wheel_force(&mut self, world: &mut PhysicsWorld, index: usize, force: f32) {
        self.drive_force[index] = force;
        let axis = self.hinge_axis_world(world, index);
        if let Some(body) = world.body_mut(self.wheels[index].body) {
            body.add_torque(axis * force, true);
        }
    }

    /// Hinge axis in chassis space, including steering on the front wheels.
    fn hinge_axis_local(&self, index: usize) -> Vector<Real> {
        if STEERED_WHEELS.contains(&index) {
            UnitQuaternion::from_axis_angle(&Vector::y_axis(), self.steer_angle) * Vector::z()
        } else {
            Vector::z()
        }
    }

    fn hinge_axis_world(&self, world: &PhysicsWorld, index: usize) -> Vector<Real> {
        let local = self.hinge_axis_local(index);
        match world.body(self.chassis) {
            Ok(chassis) => chassis.rotation() * local,
            Err(_) => local,
        }
    }

    /// Angular speed of a wheel about its hinge.
    pub fn wheel_speed(&self, world: &PhysicsWorld, index: usize) -> f32 {
        let axis = self.hinge_axis_world(world, index);
        world
            .body(self.wheels[index].body)
            .map(|wheel| wheel.angvel().dot(&axis))
            .unwrap_or(0.0)
    }

    /// Clamp driven wheel spin so the cap holds after every step, not only
    /// at the moment a force is requested.
    pub fn enforce_speed_cap(&self, world: &mut PhysicsWorld) {
        for i in DRIVEN_WHEELS {
            let axis = self.hinge_axis_world(world, i);
            let Some(wheel) = world.body_mut(self.wheels[i].body) else { continue };
            let angvel = *wheel.angvel();
            let speed = angvel.dot(&axis);
            if speed.abs() > self.config.max_speed {
                let excess = speed - speed.signum() * self.config.max_speed;
                wheel.set_angvel(angvel - axis * excess, true);
            }
        }
    }

    // --------------------------------------------------------------
    // steering
    // --------------------------------------------------------------

    pub fn set_zero_torque(&mut self, world: &mut PhysicsWorld) {
        self.steer(world, 0.0);
    }

    pub fn turn_left(&mut self, world: &mut PhysicsWorld) {
        self.steer(world, self.config.max_steer);
    }

    pub fn turn_right(&mut self, world: &mut PhysicsWorld) {
        self.steer(world, -self.config.max_steer);
    }

    fn steer(&mut self, world: &mut PhysicsWorld, angle: f32) {
        self.steer_angle = angle;
        for i in STEERED_WHEELS {
            world.set_hinge_axis(self.wheels[i].hinge, self.hinge_axis_local(i));
        }
    }

    // --------------------------------------------------------------
    // reset / sync
    // --------------------------------------------------------------

    pub fn reset_position(&mut self, world: &mut PhysicsWorld) {
        let baseline = *self.baseline.get_or_insert(self.spawn);
        world.teleport(self.chassis, baseline.chassis);
        for (wheel, pose) in self.wheels.iter().zip(baseline.wheels) {
            world.teleport(wheel.body, pose);
        }
        self.drive_force = [0.0; WHEEL_COUNT];
    }

    /// Overwrite body positions from a remote snapshot; orientation is kept.
    pub fn update_position_from_network(&self, world: &mut PhysicsWorld, pose: &CarPose) {
        self.apply_network_pose(world, pose, false);
    }

    /// Overwrite body positions and orientations from a remote snapshot.
    pub fn update_pose_from_network(&self, world: &mut PhysicsWorld, pose: &CarPose) {
        self.apply_network_pose(world, pose, true);
    }

    fn apply_network_pose(&self, world: &mut PhysicsWorld, pose: &CarPose, orientation: bool) {
        let targets = std::iter::once(pose.chassis).chain(pose.wheels);
        for (handle, target) in self.body_handles().into_iter().zip(targets) {
            let Some(body) = world.body_mut(handle) else { continue };
            body.set_translation(target.translation.vector, true);
            if orientation {
                body.set_rotation(target.rotation, true);
            }
        }
    }

    // --------------------------------------------------------------
    // render
    // --------------------------------------------------------------

    /// Rotation taking body space to the visual asset's authored frame.
    fn visual_correction(&self) -> UnitQuaternion<Real> {
        let quarter = UnitQuaternion::from_axis_angle(&Vector::x_axis(), -FRAC_PI_2);
        if self.reversed {
            UnitQuaternion::from_axis_angle(&Vector::y_axis(), PI) * quarter
        } else {
            quarter
        }
    }

    pub fn update(&mut self, world: &PhysicsWorld) {
        let Ok(pose) = self.body_pose(world) else { return };
        let wheel_fix = UnitQuaternion::from_axis_angle(&Vector::x_axis(), -FRAC_PI_2);

        self.visual.chassis = Isometry::from_parts(
            pose.chassis.translation,
            pose.chassis.rotation * self.visual_correction(),
        );
        for (slot, wheel) in self.visual.wheels.iter_mut().zip(pose.wheels) {
            *slot = Isometry::from_parts(wheel.translation, wheel.rotation * wheel_fix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaSize};
    use crate::spawn::spawn_for;

    fn world_with_car(player: Player) -> (PhysicsWorld, Vehicle) {
        let mut world = PhysicsWorld::new();
        Arena::build(&mut world, ArenaSize::default());
        let car = Vehicle::spawn(&mut world, player, spawn_for(player), OCTANE).unwrap();
        (world, car)
    }

    #[test]
    fn has_four_wheels_with_front_steering() {
        let (mut world, mut car) = world_with_car(Player::P1);
        car.turn_left(&mut world);
        assert_eq!(car.steer_angle(), OCTANE.max_steer);
        car.turn_right(&mut world);
        assert_eq!(car.steer_angle(), -OCTANE.max_steer);
        car.set_zero_torque(&mut world);
        assert_eq!(car.steer_angle(), 0.0);
        assert_eq!(car.body_handles().len(), WHEEL_COUNT + 1);
    }

    #[test]
    fn reverse_force_is_half_and_reversed_car_flips_sign() {
        let (mut world, mut p1) = world_with_car(Player::P1);
        p1.accelerate(&mut world);
        assert_eq!(p1.drive_force(2), -10.0);
        p1.reverse(&mut world);
        assert_eq!(p1.drive_force(3), 5.0);

        let (mut world, mut p2) = world_with_car(Player::P2);
        p2.accelerate(&mut world);
        assert_eq!(p2.drive_force(2), 10.0);
        assert_eq!(p2.drive_force(0), 0.0);
    }

    #[test]
    fn driven_wheel_speed_never_exceeds_cap() {
        let (mut world, mut car) = world_with_car(Player::P1);
        let mut fastest = 0.0_f32;
        for _ in 0..600 {
            world.step(1.0 / 60.0);
            car.enforce_speed_cap(&mut world);
            car.set_zero_torque(&mut world);
            car.accelerate(&mut world);
            for i in DRIVEN_WHEELS {
                let speed = car.wheel_speed(&world, i).abs();
                assert!(speed <= OCTANE.max_speed + 1e-3, "wheel {i} spun at {speed}");
                fastest = fastest.max(speed);
            }
        }
        assert!(fastest > 0.0);
    }

    #[test]
    fn accelerating_moves_p1_toward_positive_x() {
        let (mut world, mut car) = world_with_car(Player::P1);
        let start = world.body(car.chassis_handle()).unwrap().translation().x;
        for _ in 0..180 {
            world.step(1.0 / 60.0);
            car.enforce_speed_cap(&mut world);
            car.accelerate(&mut world);
        }
        let end = world.body(car.chassis_handle()).unwrap().translation().x;
        assert!(end > start, "car went from {start} to {end}");
    }

    #[test]
    fn reset_twice_yields_same_pose() {
        let (mut world, mut car) = world_with_car(Player::P1);
        for _ in 0..60 {
            world.step(1.0 / 60.0);
            car.accelerate(&mut world);
        }
        car.reset_position(&mut world);
        let first = car.body_pose(&world).unwrap();
        for _ in 0..30 {
            world.step(1.0 / 60.0);
            car.accelerate(&mut world);
        }
        car.reset_position(&mut world);
        let second = car.body_pose(&world).unwrap();

        assert_eq!(first, second);
        assert_eq!(car.baseline(), Some(&first));
        for handle in car.body_handles() {
            let body = world.body(handle).unwrap();
            assert_eq!(body.linvel().norm(), 0.0);
            assert_eq!(body.angvel().norm(), 0.0);
        }
    }

    #[test]
    fn network_position_update_keeps_orientation() {
        let (mut world, car) = world_with_car(Player::P1);
        let mut remote = car.body_pose(&world).unwrap();
        remote.chassis = Isometry::new(vector![5.0, 2.0, 1.0], vector![0.0, 1.0, 0.0]);

        car.update_position_from_network(&mut world, &remote);
        let body = world.body(car.chassis_handle()).unwrap();
        assert_eq!(*body.translation(), vector![5.0, 2.0, 1.0]);
        assert_eq!(*body.rotation(), UnitQuaternion::identity());

        car.update_pose_from_network(&mut world, &remote);
        let body = world.body(car.chassis_handle()).unwrap();
        assert!(body.rotation().angle_to(&remote.chassis.rotation) < 1e-5);
    }

    #[test]
    fn reversed_visual_gets_half_turn() {
        let (world, mut p2) = world_with_car(Player::P2);
        p2.update(&world);
        let chassis = world.body(p2.chassis_handle()).unwrap();
        let extra = chassis.rotation().inverse() * p2.visual().chassis.rotation;
        // quarter turn about x plus half turn about y
        assert!((extra.angle() - PI).abs() < 1e-4);
    }
}
