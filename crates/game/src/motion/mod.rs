mod config;
mod controller;
mod state;
mod timestep;

pub use config::MotionConfig;
pub use controller::PlayerCubeController;
pub use state::{AxisInput, EntityFlags, Transform};
pub use timestep::FixedTimestep;
