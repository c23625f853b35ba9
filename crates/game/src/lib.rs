pub mod backend;
pub mod connection;
pub mod motion;
pub mod net;
pub mod session;

pub use backend::{LocalBackend, RemoteBackend, SessionBackend};
pub use connection::{
    ConnectionError, ConnectionEvent, ConnectionManager, ConnectionState, SessionHandle,
};
pub use motion::{AxisInput, EntityFlags, FixedTimestep, MotionConfig, PlayerCubeController, Transform};
pub use net::{DEFAULT_PORT, ProtocolError, ServerConfig, SessionServer};
pub use session::{
    ClientId, DEFAULT_MAX_PLAYERS, JoinedSession, NetworkEvent, NetworkTopology, PlayerId,
    SessionConfig, SessionError, SessionId, SessionService, SharedSessionService,
};
