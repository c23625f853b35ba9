/// Turns variable frame deltas into a whole number of fixed ticks.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

// Long stalls are clamped so a paused frame does not replay seconds of input.
const MAX_FRAME_DELTA: f32 = 0.25;

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.clamp(0.0, MAX_FRAME_DELTA);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_ticks_consumed() {
        let mut timestep = FixedTimestep::new(10);
        timestep.accumulate(0.25);

        let mut ticks = 0;
        while timestep.consume_tick() {
            ticks += 1;
        }

        assert_eq!(ticks, 2);
        timestep.accumulate(0.06);
        assert!(timestep.consume_tick());
    }

    #[test]
    fn test_long_stall_clamped() {
        let mut timestep = FixedTimestep::new(60);
        timestep.accumulate(5.0);

        let mut ticks = 0;
        while timestep.consume_tick() {
            ticks += 1;
        }

        assert!(ticks <= 15);
    }
}
