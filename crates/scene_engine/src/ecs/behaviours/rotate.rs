//! Spin an entity about an axis

use rand::Rng;

use crate::ecs::components::{Behaviour, BehaviourContext, BehaviourKind};
use crate::foundation::math::{utils, Vec3};

/// Rotates the owner's transform at a constant angular speed
///
/// Without a fixed axis, `start` picks a random normalized axis from the
/// cube [-1, 1]^3.
#[derive(Debug, Clone)]
pub struct RotateBehaviour {
    axis: Vec3,
    angle: f32,
    speed: f32,
    randomize_axis: bool,
}

impl Default for RotateBehaviour {
    fn default() -> Self {
        Self::new()
    }
}

impl RotateBehaviour {
    /// Default speed in radians per second (90 degrees)
    pub fn default_speed() -> f32 {
        utils::deg_to_rad(90.0)
    }

    /// Rotation about a random axis chosen at start
    pub fn new() -> Self {
        Self {
            axis: Vec3::y(),
            angle: 0.0,
            speed: Self::default_speed(),
            randomize_axis: true,
        }
    }

    /// Rotation about a fixed axis
    pub fn with_axis(axis: Vec3) -> Self {
        Self {
            axis: axis.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y),
            randomize_axis: false,
            ..Self::new()
        }
    }

    /// Override the angular speed (radians per second)
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Current rotation axis
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    /// Accumulated angle in radians
    pub fn angle(&self) -> f32 {
        self.angle
    }

    fn random_axis() -> Vec3 {
        let mut rng = rand::thread_rng();
        let axis = Vec3::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        axis.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y)
    }
}

impl Behaviour for RotateBehaviour {
    fn kind(&self) -> BehaviourKind {
        BehaviourKind::Rotate
    }

    fn start(&mut self, ctx: &mut BehaviourContext<'_>) {
        if self.randomize_axis {
            self.axis = Self::random_axis();
            log::debug!("Entity {} rotates about {:?}", ctx.entity, self.axis);
        }
    }

    fn update(&mut self, ctx: &mut BehaviourContext<'_>, delta_time: f32) {
        self.angle += self.speed * delta_time;
        if let Some(transform) = ctx.transform() {
            transform.set_rotation_from_angle_axis(self.angle, self.axis);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_axis_is_normalized() {
        let rotate = RotateBehaviour::with_axis(Vec3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(rotate.axis(), Vec3::z());
    }

    #[test]
    fn test_random_axis_is_unit_length() {
        for _ in 0..32 {
            assert_relative_eq!(RotateBehaviour::random_axis().norm(), 1.0, epsilon = 1e-5);
        }
    }
}
