use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Units per second at full axis deflection.
    pub speed: f32,
    /// Route the vertical axis to Z instead of Y.
    pub apply_vertical_to_z_axis: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            apply_vertical_to_z_axis: false,
        }
    }
}
