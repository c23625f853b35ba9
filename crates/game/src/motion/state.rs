use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Flags owned by the networking runtime. The motion controller only
    /// reads them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntityFlags: u8 {
        const SPAWNED = 1 << 0;
        const AUTHORITY = 1 << 1;
    }
}

impl EntityFlags {
    pub fn is_spawned(&self) -> bool {
        self.contains(Self::SPAWNED)
    }

    pub fn has_authority(&self) -> bool {
        self.contains(Self::AUTHORITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }
}

/// Two axis readings for one tick, each nominally in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisInput {
    pub horizontal: f32,
    pub vertical: f32,
}

impl AxisInput {
    pub fn new(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Horizontal drives X; vertical drives Y, or Z when `vertical_to_z`.
    pub fn motion(&self, vertical_to_z: bool) -> Vec3 {
        if vertical_to_z {
            Vec3::new(self.horizontal, 0.0, self.vertical)
        } else {
            Vec3::new(self.horizontal, self.vertical, 0.0)
        }
    }
}
