use rapier3d::prelude::*;

/// Pivot offset in the car's visual frame: behind the car and above it.
/// The rig hangs off the car model, which is drawn at twice scale, so the
/// model-space offset (-5, 0, 4) doubles.
pub const PIVOT_OFFSET: [Real; 3] = [-10.0, 0.0, 8.0];
pub const FOLLOW_LERP: Real = 0.05;
pub const MIN_HEIGHT: Real = 1.0;

/// Camera trailing the locally controlled car.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseCamera {
    pub position: Point<Real>,
    pub look_at: Point<Real>,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self {
            position: point![0.0, 5.0, 10.0],
            look_at: Point::origin(),
        }
    }
}

impl ChaseCamera {
    /// Where the camera wants to be for a car whose visual pose is `car`.
    pub fn target(car: &Isometry<Real>) -> Point<Real> {
        let [x, y, z] = PIVOT_OFFSET;
        let mut target = car * point![x, y, z];
        target.y = target.y.max(MIN_HEIGHT);
        target
    }

    pub fn follow(&mut self, car: &Isometry<Real>) {
        self.look_at = Point::from(car.translation.vector);
        let target = Self::target(car);
        self.position = self.position + (target - self.position) * FOLLOW_LERP;
    }
}
