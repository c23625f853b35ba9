mod input;

use std::time::Instant;

use cubesync::{ClientId, EntityFlags, FixedTimestep, MotionConfig, PlayerCubeController, Transform};

pub use input::InputAxes;

/// The local player's cube.
#[derive(Debug, Clone)]
pub struct CubeEntity {
    pub owner: ClientId,
    pub transform: Transform,
    pub flags: EntityFlags,
}

pub struct Scene {
    cube: Option<CubeEntity>,
    controller: PlayerCubeController,
    timestep: FixedTimestep,
    input: InputAxes,
    ticks: u64,
}

impl Scene {
    pub fn new(motion: MotionConfig, tick_rate: u32) -> Self {
        Self {
            cube: None,
            controller: PlayerCubeController::new(motion),
            timestep: FixedTimestep::new(tick_rate),
            input: InputAxes::default(),
            ticks: 0,
        }
    }

    pub fn cube(&self) -> Option<&CubeEntity> {
        self.cube.as_ref()
    }

    pub fn input(&self) -> &InputAxes {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputAxes {
        &mut self.input
    }

    pub fn controller(&self) -> &PlayerCubeController {
        &self.controller
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick_rate(&self) -> u32 {
        self.timestep.tick_rate()
    }

    /// Spawns the cube at the origin with local authority. A second spawn
    /// for the same client keeps the existing cube.
    pub fn spawn_local_cube(&mut self, client_id: ClientId) {
        if self.cube.as_ref().is_some_and(|cube| cube.owner == client_id) {
            return;
        }

        log::info!("Spawning cube for client {}", client_id);
        self.cube = Some(CubeEntity {
            owner: client_id,
            transform: Transform::default(),
            flags: EntityFlags::SPAWNED | EntityFlags::AUTHORITY,
        });
        self.timestep.reset();
    }

    pub fn despawn(&mut self) {
        if let Some(cube) = self.cube.take() {
            log::info!("Despawning cube for client {}", cube.owner);
        }
        self.input.clear();
    }

    /// Advances the fixed-rate simulation by a frame delta.
    pub fn update(&mut self, delta: f32, now: Instant) {
        self.timestep.accumulate(delta);
        let dt = self.timestep.dt();

        while self.timestep.consume_tick() {
            let axes = self.input.update(now, dt);
            if let Some(cube) = self.cube.as_mut() {
                self.controller.tick(cube.flags, axes, &mut cube.transform, dt);
            }
            self.ticks += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    #[test]
    fn spawned_cube_moves_with_input() {
        let mut scene = Scene::new(MotionConfig::default(), 10);
        scene.spawn_local_cube(7);

        let now = Instant::now();
        scene.input_mut().key_pressed(KeyCode::Right, now);
        scene.update(0.2, now);

        let cube = scene.cube().unwrap();
        assert!(cube.flags.has_authority());
        assert!(cube.transform.position.x > 0.0);
        assert_eq!(cube.transform.position.y, 0.0);
        assert_eq!(scene.ticks(), 2);
    }

    #[test]
    fn nothing_moves_before_spawn_or_after_despawn() {
        let mut scene = Scene::new(MotionConfig::default(), 10);
        let now = Instant::now();
        scene.input_mut().key_pressed(KeyCode::Up, now);
        scene.update(0.2, now);
        assert!(scene.cube().is_none());

        scene.spawn_local_cube(1);
        scene.despawn();
        scene.update(0.2, now);
        assert!(scene.cube().is_none());
    }

    #[test]
    fn respawn_for_same_client_keeps_position() {
        let mut scene = Scene::new(MotionConfig::default(), 10);
        scene.spawn_local_cube(3);

        let now = Instant::now();
        scene.input_mut().key_pressed(KeyCode::Char('d'), now);
        scene.update(0.2, now);
        let x = scene.cube().unwrap().transform.position.x;

        scene.spawn_local_cube(3);
        assert_eq!(scene.cube().unwrap().transform.position.x, x);
    }
}
