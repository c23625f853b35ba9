use super::{AxisInput, EntityFlags, MotionConfig, Transform};

/// Moves an owned cube straight from axis input: no acceleration, no
/// collision, no bounds.
#[derive(Debug, Clone, Default)]
pub struct PlayerCubeController {
    config: MotionConfig,
}

impl PlayerCubeController {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Applies one tick of motion. Returns `true` if the transform moved.
    pub fn tick(
        &self,
        flags: EntityFlags,
        input: AxisInput,
        transform: &mut Transform,
        dt: f32,
    ) -> bool {
        if !flags.is_spawned() || !flags.has_authority() {
            return false;
        }

        let motion = input.motion(self.config.apply_vertical_to_z_axis);

        // Any non-zero input moves; there is no deadzone.
        if motion.length_squared() > 0.0 {
            transform.position += self.config.speed * dt * motion;
            true
        } else {
            false
        }
    }
}
