use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};

use super::auth::PlayerDirectory;
use super::{
    ClientId, JoinedSession, NetworkEvent, NetworkTopology, PlayerId, SessionConfig, SessionError,
    SessionId,
};

pub type EventSink = broadcast::Sender<NetworkEvent>;
pub type SharedSessionService = Arc<Mutex<SessionService>>;

#[derive(Debug)]
struct Member {
    player_id: PlayerId,
    client_id: ClientId,
    events: EventSink,
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub max_players: u32,
    pub topology: NetworkTopology,
    pub owner: ClientId,
    members: Vec<Member>,
    next_client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub player_count: u32,
    pub max_players: u32,
    pub owner: ClientId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub client_id: ClientId,
    pub promoted: Option<ClientId>,
    pub session_closed: bool,
}

impl Session {
    fn new(id: SessionId, config: SessionConfig, host: PlayerId, events: EventSink) -> Self {
        let mut session = Self {
            id,
            name: config.name,
            max_players: config.max_players,
            topology: config.topology,
            owner: 0,
            members: Vec::new(),
            next_client_id: 1,
        };
        session.owner = session.push_member(host, events);
        session
    }

    fn push_member(&mut self, player_id: PlayerId, events: EventSink) -> ClientId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.members.push(Member {
            player_id,
            client_id,
            events,
        });
        client_id
    }

    pub fn player_count(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players as usize
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn client_id_of(&self, player_id: PlayerId) -> Option<ClientId> {
        self.members
            .iter()
            .find(|m| m.player_id == player_id)
            .map(|m| m.client_id)
    }

    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().map(|m| m.client_id)
    }

    fn remove_member(&mut self, player_id: PlayerId) -> Option<(ClientId, Option<ClientId>)> {
        let pos = self.members.iter().position(|m| m.player_id == player_id)?;
        let member = self.members.remove(pos);

        let promoted = if self.owner == member.client_id {
            self.members.first().map(|next| {
                self.owner = next.client_id;
                next.client_id
            })
        } else {
            None
        };

        Some((member.client_id, promoted))
    }

    fn notify_all(&self, event: NetworkEvent) {
        for member in &self.members {
            // A member without live receivers has gone away; leave() cleans it up.
            let _ = member.events.send(event);
        }
    }

    fn joined(&self, client_id: ClientId, created: bool) -> JoinedSession {
        JoinedSession {
            session_id: self.id,
            name: self.name.clone(),
            client_id,
            owner_client_id: self.owner,
            max_players: self.max_players,
            player_count: self.player_count(),
            topology: self.topology,
            created,
        }
    }

    pub fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            name: self.name.clone(),
            player_count: self.player_count(),
            max_players: self.max_players,
            owner: self.owner,
        }
    }
}

/// Authoritative record of sessions, their members and owners. Sessions are
/// keyed by exact name so create-or-join resolves to a single session.
#[derive(Debug)]
pub struct SessionService {
    sessions: HashMap<SessionId, Session>,
    session_names: HashMap<String, SessionId>,
    player_sessions: HashMap<PlayerId, SessionId>,
    directory: PlayerDirectory,
    next_session_id: SessionId,
}

impl Default for SessionService {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
            session_names: HashMap::new(),
            player_sessions: HashMap::new(),
            directory: PlayerDirectory::new(),
            next_session_id: 1,
        }
    }
}

impl SessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSessionService {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn sign_in_anonymously(
        &mut self,
        installation_id: u64,
        profile: &str,
    ) -> Result<PlayerId, SessionError> {
        self.directory.sign_in_anonymously(installation_id, profile)
    }

    pub fn create_or_join(
        &mut self,
        player_id: PlayerId,
        config: SessionConfig,
        events: EventSink,
    ) -> Result<JoinedSession, SessionError> {
        config.validate()?;

        if let Some(&current) = self.player_sessions.get(&player_id) {
            return self.rejoin(current, player_id, &config.name, events);
        }

        match self.session_names.get(&config.name).copied() {
            Some(session_id) => self.join(session_id, player_id, events),
            None => Ok(self.create(player_id, config, events)),
        }
    }

    fn create(
        &mut self,
        player_id: PlayerId,
        config: SessionConfig,
        events: EventSink,
    ) -> JoinedSession {
        let id = self.next_session_id;
        self.next_session_id += 1;

        let session = Session::new(id, config, player_id, events);
        let owner = session.owner;

        log::info!(
            "Created session {} '{}' ({}, max {} players) for player {}",
            id,
            session.name,
            session.topology.as_str(),
            session.max_players,
            player_id
        );

        session.notify_all(NetworkEvent::ClientConnected {
            session_id: id,
            client_id: owner,
        });
        session.notify_all(NetworkEvent::SessionOwnerPromoted {
            session_id: id,
            client_id: owner,
        });

        let joined = session.joined(owner, true);
        self.session_names.insert(session.name.clone(), id);
        self.sessions.insert(id, session);
        self.player_sessions.insert(player_id, id);

        joined
    }

    fn join(
        &mut self,
        session_id: SessionId,
        player_id: PlayerId,
        events: EventSink,
    ) -> Result<JoinedSession, SessionError> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::SessionNotFound(session_id))?;

        if session.is_full() {
            return Err(SessionError::SessionFull {
                name: session.name.clone(),
                max_players: session.max_players,
            });
        }

        let client_id = session.push_member(player_id, events);
        session.notify_all(NetworkEvent::ClientConnected {
            session_id,
            client_id,
        });

        log::info!(
            "Player {} joined session {} '{}' as client {} ({}/{})",
            player_id,
            session_id,
            session.name,
            client_id,
            session.player_count(),
            session.max_players
        );

        let joined = session.joined(client_id, false);
        self.player_sessions.insert(player_id, session_id);
        Ok(joined)
    }

    /// A player asking for the session it is already in gets its existing
    /// membership back, with events rerouted to the new sink.
    fn rejoin(
        &mut self,
        current: SessionId,
        player_id: PlayerId,
        name: &str,
        events: EventSink,
    ) -> Result<JoinedSession, SessionError> {
        let session = self
            .sessions
            .get_mut(&current)
            .ok_or(SessionError::SessionNotFound(current))?;

        if session.name != name {
            return Err(SessionError::AlreadyInSession(current));
        }

        let member = session
            .members
            .iter_mut()
            .find(|m| m.player_id == player_id)
            .ok_or(SessionError::NotAMember(current))?;
        let client_id = member.client_id;
        if !member.events.same_channel(&events) {
            log::warn!(
                "Player {} rejoined session {}; client {} notifications move to the new sink",
                player_id,
                current,
                client_id
            );
        }
        member.events = events;

        // Replay the arrival so the rejoining participant announces its client.
        let _ = member.events.send(NetworkEvent::ClientConnected {
            session_id: current,
            client_id,
        });
        if session.owner == client_id {
            let _ = member.events.send(NetworkEvent::SessionOwnerPromoted {
                session_id: current,
                client_id,
            });
        }

        log::debug!(
            "Player {} already in session {} as client {}",
            player_id,
            current,
            client_id
        );
        Ok(session.joined(client_id, false))
    }

    pub fn leave(
        &mut self,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Result<LeaveOutcome, SessionError> {
        if self.player_sessions.get(&player_id) != Some(&session_id) {
            return Err(SessionError::NotAMember(session_id));
        }

        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::SessionNotFound(session_id))?;
        let (client_id, promoted) = session
            .remove_member(player_id)
            .ok_or(SessionError::NotAMember(session_id))?;
        self.player_sessions.remove(&player_id);

        session.notify_all(NetworkEvent::ClientDisconnected {
            session_id,
            client_id,
        });
        if let Some(owner) = promoted {
            log::info!("Client {} promoted to owner of session {}", owner, session_id);
            session.notify_all(NetworkEvent::SessionOwnerPromoted {
                session_id,
                client_id: owner,
            });
        }

        log::info!(
            "Player {} (client {}) left session {}",
            player_id,
            client_id,
            session_id
        );

        let session_closed = session.is_empty();
        if session_closed {
            if let Some(session) = self.sessions.remove(&session_id) {
                self.session_names.remove(&session.name);
                log::info!("Closed empty session {} '{}'", session_id, session.name);
            }
        }

        Ok(LeaveOutcome {
            client_id,
            promoted,
            session_closed,
        })
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Session> {
        self.session_names
            .get(name)
            .and_then(|id| self.sessions.get(id))
    }

    pub fn player_session(&self, player_id: PlayerId) -> Option<SessionId> {
        self.player_sessions.get(&player_id).copied()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self.sessions.values().map(|s| s.to_summary()).collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> (EventSink, broadcast::Receiver<NetworkEvent>) {
        broadcast::channel(16)
    }

    fn drain(rx: &mut broadcast::Receiver<NetworkEvent>) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_create_or_join_resolves_to_one_session() {
        let mut service = SessionService::new();
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();

        let first = service
            .create_or_join(1, SessionConfig::new("arena"), tx1)
            .unwrap();
        let second = service
            .create_or_join(2, SessionConfig::new("arena"), tx2)
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.session_id, second.session_id);
        assert_ne!(first.client_id, second.client_id);
        assert_eq!(second.owner_client_id, first.client_id);
        assert_eq!(second.player_count, 2);
        assert_eq!(service.session_count(), 1);
    }

    #[test]
    fn test_creator_is_connected_and_promoted() {
        let mut service = SessionService::new();
        let (tx, mut rx) = sink();

        let joined = service
            .create_or_join(1, SessionConfig::new("arena"), tx)
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                NetworkEvent::ClientConnected {
                    session_id: joined.session_id,
                    client_id: joined.client_id,
                },
                NetworkEvent::SessionOwnerPromoted {
                    session_id: joined.session_id,
                    client_id: joined.client_id,
                },
            ]
        );
    }

    #[test]
    fn test_join_notifies_existing_members() {
        let mut service = SessionService::new();
        let (tx1, mut rx1) = sink();
        let (tx2, mut rx2) = sink();

        service
            .create_or_join(1, SessionConfig::new("arena"), tx1)
            .unwrap();
        drain(&mut rx1);

        let second = service
            .create_or_join(2, SessionConfig::new("arena"), tx2)
            .unwrap();
        let expected = NetworkEvent::ClientConnected {
            session_id: second.session_id,
            client_id: second.client_id,
        };

        assert_eq!(drain(&mut rx1), vec![expected]);
        assert_eq!(drain(&mut rx2), vec![expected]);
    }

    #[test]
    fn test_rejoin_same_session_is_idempotent() {
        let mut service = SessionService::new();
        let (tx, _rx) = sink();

        let first = service
            .create_or_join(1, SessionConfig::new("arena"), tx.clone())
            .unwrap();
        let again = service
            .create_or_join(1, SessionConfig::new("arena"), tx.clone())
            .unwrap();

        assert_eq!(first.client_id, again.client_id);
        assert_eq!(again.player_count, 1);

        let other = service.create_or_join(1, SessionConfig::new("lobby"), tx);
        assert!(matches!(other, Err(SessionError::AlreadyInSession(_))));
    }

    #[test]
    fn test_rejoin_replays_arrival_to_new_sink() {
        let mut service = SessionService::new();
        let (old_tx, mut old_rx) = sink();
        let (new_tx, mut new_rx) = sink();

        let first = service
            .create_or_join(1, SessionConfig::new("arena"), old_tx)
            .unwrap();
        drain(&mut old_rx);

        let again = service
            .create_or_join(1, SessionConfig::new("arena"), new_tx)
            .unwrap();

        assert_eq!(again.client_id, first.client_id);
        assert!(drain(&mut old_rx).is_empty());
        assert_eq!(
            drain(&mut new_rx),
            vec![
                NetworkEvent::ClientConnected {
                    session_id: first.session_id,
                    client_id: first.client_id,
                },
                NetworkEvent::SessionOwnerPromoted {
                    session_id: first.session_id,
                    client_id: first.client_id,
                },
            ]
        );
    }

    #[test]
    fn test_rejoin_by_non_owner_is_not_promoted() {
        let mut service = SessionService::new();
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();
        let (tx3, mut rx3) = sink();

        service
            .create_or_join(1, SessionConfig::new("arena"), tx1)
            .unwrap();
        let second = service
            .create_or_join(2, SessionConfig::new("arena"), tx2)
            .unwrap();
        service
            .create_or_join(2, SessionConfig::new("arena"), tx3)
            .unwrap();

        assert_eq!(
            drain(&mut rx3),
            vec![NetworkEvent::ClientConnected {
                session_id: second.session_id,
                client_id: second.client_id,
            }]
        );
    }

    #[test]
    fn test_session_full() {
        let mut service = SessionService::new();
        let config = SessionConfig::new("duel").with_max_players(2);

        for player in 1..=2 {
            let (tx, _rx) = sink();
            service.create_or_join(player, config.clone(), tx).unwrap();
        }

        let (tx, _rx) = sink();
        let result = service.create_or_join(3, config, tx);
        assert!(matches!(result, Err(SessionError::SessionFull { .. })));
    }

    #[test]
    fn test_owner_leave_promotes_next_member() {
        let mut service = SessionService::new();
        let (tx1, _rx1) = sink();
        let (tx2, mut rx2) = sink();
        let (tx3, _rx3) = sink();

        let first = service
            .create_or_join(1, SessionConfig::new("arena"), tx1)
            .unwrap();
        let second = service
            .create_or_join(2, SessionConfig::new("arena"), tx2)
            .unwrap();
        service
            .create_or_join(3, SessionConfig::new("arena"), tx3)
            .unwrap();
        drain(&mut rx2);

        let outcome = service.leave(first.session_id, 1).unwrap();
        assert_eq!(outcome.promoted, Some(second.client_id));
        assert!(!outcome.session_closed);

        let session = service.get(first.session_id).unwrap();
        assert_eq!(session.owner, second.client_id);
        assert!(drain(&mut rx2).contains(&NetworkEvent::SessionOwnerPromoted {
            session_id: first.session_id,
            client_id: second.client_id,
        }));
    }

    #[test]
    fn test_last_leave_closes_session() {
        let mut service = SessionService::new();
        let (tx, _rx) = sink();

        let joined = service
            .create_or_join(1, SessionConfig::new("arena"), tx)
            .unwrap();
        let outcome = service.leave(joined.session_id, 1).unwrap();

        assert!(outcome.session_closed);
        assert_eq!(service.session_count(), 0);
        assert!(service.find_by_name("arena").is_none());
        assert!(service.leave(joined.session_id, 1).is_err());
    }
}
