use std::net::SocketAddr;

use cubesync::{DEFAULT_MAX_PLAYERS, MotionConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `None` runs against an in-process session service.
    pub server_addr: Option<SocketAddr>,
    pub max_players: u32,
    pub tick_rate: u32,
    pub motion: MotionConfig,
    pub profile: String,
    pub session: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: None,
            max_players: DEFAULT_MAX_PLAYERS,
            tick_rate: 60,
            motion: MotionConfig::default(),
            profile: String::new(),
            session: String::new(),
        }
    }
}
