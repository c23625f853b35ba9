mod auth;
mod service;

use rkyv::{Archive, Deserialize, Serialize};

pub use auth::{AuthState, DEFAULT_PROFILE, MAX_PROFILE_LEN, PlayerDirectory, validate_profile};
pub use service::{
    EventSink, LeaveOutcome, Session, SessionService, SessionSummary, SharedSessionService,
};

pub type PlayerId = u32;
pub type SessionId = u64;
pub type ClientId = u64;

pub const DEFAULT_MAX_PLAYERS: u32 = 10;
pub const MAX_PLAYERS_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum NetworkTopology {
    #[default]
    ClientServer,
    DistributedAuthority,
}

impl NetworkTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkTopology::ClientServer => "client-server",
            NetworkTopology::DistributedAuthority => "distributed-authority",
        }
    }
}

/// Options for a create-or-join request. Only `name` is used to find an
/// existing session; the rest apply when the session is created.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SessionConfig {
    pub name: String,
    pub max_players: u32,
    pub topology: NetworkTopology,
}

impl SessionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_players: DEFAULT_MAX_PLAYERS,
            topology: NetworkTopology::default(),
        }
    }

    pub fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    pub fn with_distributed_authority(mut self) -> Self {
        self.topology = NetworkTopology::DistributedAuthority;
        self
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.name.is_empty() {
            return Err(SessionError::EmptySessionName);
        }
        if self.max_players == 0 || self.max_players > MAX_PLAYERS_LIMIT {
            return Err(SessionError::InvalidMaxPlayers(self.max_players));
        }
        Ok(())
    }
}

/// What a participant gets back after a successful create-or-join.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct JoinedSession {
    pub session_id: SessionId,
    pub name: String,
    pub client_id: ClientId,
    pub owner_client_id: ClientId,
    pub max_players: u32,
    pub player_count: u32,
    pub topology: NetworkTopology,
    pub created: bool,
}

/// Notifications pushed by the session backend to every member of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum NetworkEvent {
    ClientConnected {
        session_id: SessionId,
        client_id: ClientId,
    },
    ClientDisconnected {
        session_id: SessionId,
        client_id: ClientId,
    },
    SessionOwnerPromoted {
        session_id: SessionId,
        client_id: ClientId,
    },
}

impl NetworkEvent {
    pub fn session_id(&self) -> SessionId {
        match *self {
            NetworkEvent::ClientConnected { session_id, .. }
            | NetworkEvent::ClientDisconnected { session_id, .. }
            | NetworkEvent::SessionOwnerPromoted { session_id, .. } => session_id,
        }
    }

    pub fn client_id(&self) -> ClientId {
        match *self {
            NetworkEvent::ClientConnected { client_id, .. }
            | NetworkEvent::ClientDisconnected { client_id, .. }
            | NetworkEvent::SessionOwnerPromoted { client_id, .. } => client_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session name must not be empty")]
    EmptySessionName,
    #[error("max players must be between 1 and 100, got {0}")]
    InvalidMaxPlayers(u32),
    #[error("invalid profile name '{0}'")]
    InvalidProfile(String),
    #[error("already signed in as profile '{0}'")]
    AlreadySignedIn(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("session '{name}' is full ({max_players} players)")]
    SessionFull { name: String, max_players: u32 },
    #[error("player is already in session {0}")]
    AlreadyInSession(SessionId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("player is not a member of session {0}")]
    NotAMember(SessionId),
    #[error("session service rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response from session service")]
    UnexpectedResponse,
    #[error("connection to session service lost")]
    Disconnected,
    #[error(transparent)]
    Protocol(#[from] crate::net::ProtocolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
