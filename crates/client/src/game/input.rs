use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use cubesync::AxisInput;

/// Without release reporting the terminal only repeats presses, so a key
/// counts as held until this long after its last press. Covers the initial
/// auto-repeat delay of common keyboards.
const REPEAT_HOLD_WINDOW: Duration = Duration::from_millis(550);

/// Smoothed axis in `[-1, 1]` that ramps toward the raw key value.
#[derive(Debug, Clone, Copy)]
pub struct VirtualAxis {
    value: f32,
    /// Units per second toward the target while a key is held.
    pub sensitivity: f32,
    /// Units per second back to zero once released.
    pub gravity: f32,
    /// Jump to zero when the opposite direction is pressed.
    pub snap: bool,
}

impl Default for VirtualAxis {
    fn default() -> Self {
        Self {
            value: 0.0,
            sensitivity: 3.0,
            gravity: 3.0,
            snap: true,
        }
    }
}

impl VirtualAxis {
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn update(&mut self, raw: f32, dt: f32) -> f32 {
        let raw = raw.clamp(-1.0, 1.0);

        if raw == 0.0 {
            self.value = move_towards(self.value, 0.0, self.gravity * dt);
        } else {
            if self.snap && self.value != 0.0 && raw.signum() != self.value.signum() {
                self.value = 0.0;
            }
            self.value = move_towards(self.value, raw, self.sensitivity * dt);
        }

        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

fn move_towards(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step * delta.signum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    Left,
    Right,
    Up,
    Down,
}

fn direction(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Direction::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Direction::Right),
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Direction::Up),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Direction::Down),
        _ => None,
    }
}

/// Arrow keys / WASD mapped onto horizontal and vertical virtual axes.
#[derive(Debug, Default)]
pub struct InputAxes {
    held: HashMap<Direction, Instant>,
    reports_release: bool,
    horizontal: VirtualAxis,
    vertical: VirtualAxis,
}

impl InputAxes {
    /// Set when the terminal reports key releases; held keys then stay down
    /// until released instead of expiring.
    pub fn set_reports_release(&mut self, reports_release: bool) {
        self.reports_release = reports_release;
    }

    /// Returns `false` if the key is not a movement key.
    pub fn key_pressed(&mut self, code: KeyCode, now: Instant) -> bool {
        match direction(code) {
            Some(dir) => {
                self.held.insert(dir, now);
                true
            }
            None => false,
        }
    }

    pub fn key_released(&mut self, code: KeyCode) -> bool {
        match direction(code) {
            Some(dir) => self.held.remove(&dir).is_some(),
            None => false,
        }
    }

    fn is_held(&self, dir: Direction, now: Instant) -> bool {
        match self.held.get(&dir) {
            Some(_) if self.reports_release => true,
            Some(pressed) => now.saturating_duration_since(*pressed) <= REPEAT_HOLD_WINDOW,
            None => false,
        }
    }

    /// Unsmoothed axis values from the keys currently held.
    pub fn raw(&self, now: Instant) -> AxisInput {
        let axis = |negative, positive| {
            let mut value = 0.0;
            if self.is_held(positive, now) {
                value += 1.0;
            }
            if self.is_held(negative, now) {
                value -= 1.0;
            }
            value
        };

        AxisInput::new(
            axis(Direction::Left, Direction::Right),
            axis(Direction::Down, Direction::Up),
        )
    }

    pub fn update(&mut self, now: Instant, dt: f32) -> AxisInput {
        let raw = self.raw(now);
        AxisInput::new(
            self.horizontal.update(raw.horizontal, dt),
            self.vertical.update(raw.vertical, dt),
        )
    }

    pub fn current(&self) -> AxisInput {
        AxisInput::new(self.horizontal.value(), self.vertical.value())
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.horizontal.reset();
        self.vertical.reset();
    }
}
