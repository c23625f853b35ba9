use crate::session::{ClientId, JoinedSession, NetworkTopology, SessionId};

/// The session a [`ConnectionManager`](super::ConnectionManager) currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    session_id: SessionId,
    name: String,
    local_client_id: ClientId,
    owner_client_id: ClientId,
    max_players: u32,
    player_count: u32,
    topology: NetworkTopology,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_client_id(&self) -> ClientId {
        self.local_client_id
    }

    pub fn owner_client_id(&self) -> ClientId {
        self.owner_client_id
    }

    pub fn is_session_owner(&self) -> bool {
        self.local_client_id == self.owner_client_id
    }

    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    /// Members in the session, kept current from join and leave
    /// notifications.
    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    pub fn topology(&self) -> NetworkTopology {
        self.topology
    }

    pub(super) fn set_owner(&mut self, client_id: ClientId) {
        self.owner_client_id = client_id;
    }

    pub(super) fn member_joined(&mut self) {
        self.player_count = self.player_count.saturating_add(1).min(self.max_players);
    }

    pub(super) fn member_left(&mut self) {
        self.player_count = self.player_count.saturating_sub(1).max(1);
    }
}

impl From<JoinedSession> for SessionHandle {
    fn from(joined: JoinedSession) -> Self {
        Self {
            session_id: joined.session_id,
            name: joined.name,
            local_client_id: joined.client_id,
            owner_client_id: joined.owner_client_id,
            max_players: joined.max_players,
            player_count: joined.player_count,
            topology: joined.topology,
        }
    }
}
