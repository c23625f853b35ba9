use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;

use cubesync::{
    ConnectionError, ConnectionEvent, ConnectionManager, ConnectionState, RemoteBackend,
    ServerConfig, SessionError, SessionServer, SharedSessionService,
};

async fn start_server() -> (SocketAddr, SharedSessionService) {
    let server = SessionServer::bind("127.0.0.1:0", ServerConfig::default())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let service = server.service();
    tokio::spawn(server.run());
    (addr, service)
}

async fn wait_for(
    manager: &mut ConnectionManager<RemoteBackend>,
    events: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    expected: ConnectionEvent,
) -> bool {
    for _ in 0..200 {
        manager.poll_network_events();
        while let Ok(event) = events.try_recv() {
            if event == expected {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_create_or_join_over_tcp() {
    let (addr, service) = start_server().await;

    let mut alice = ConnectionManager::new(RemoteBackend::new(addr));
    let mut bob = ConnectionManager::new(RemoteBackend::new(addr));
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    let a = alice.connect("alice", "arena").await.unwrap();
    let b = bob.connect("bob", "arena").await.unwrap();

    assert_eq!(a.session_id(), b.session_id());
    assert!(a.is_session_owner());
    assert_eq!(service.lock().await.session_count(), 1);

    assert!(
        wait_for(
            &mut alice,
            &mut alice_events,
            ConnectionEvent::LocalOwnerPromoted {
                client_id: a.local_client_id()
            }
        )
        .await
    );
    assert!(
        wait_for(
            &mut bob,
            &mut bob_events,
            ConnectionEvent::LocalClientConnected {
                client_id: b.local_client_id()
            }
        )
        .await
    );

    alice.leave().unwrap().await.unwrap();

    assert!(
        wait_for(
            &mut bob,
            &mut bob_events,
            ConnectionEvent::LocalOwnerPromoted {
                client_id: b.local_client_id()
            }
        )
        .await
    );
}

#[tokio::test]
async fn test_disconnect_releases_membership() {
    let (addr, service) = start_server().await;

    let mut alice = ConnectionManager::new(RemoteBackend::new(addr));
    alice.connect("alice", "arena").await.unwrap();
    assert_eq!(service.lock().await.session_count(), 1);

    // Dropping the manager and backend closes the TCP connection; the server
    // removes the member even if the leave request never lands.
    drop(alice);

    let mut remaining = 1;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining = service.lock().await.session_count();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_unreachable_server_fails_to_disconnected() {
    // Bind and release a port so nothing is listening on it.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut manager = ConnectionManager::new(RemoteBackend::new(addr));
    let mut events = manager.subscribe();

    let result = manager.connect("alice", "arena").await;

    assert!(result.is_err());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.session().is_none());

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ConnectionEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
}

#[tokio::test]
async fn test_server_rejection_surfaces_as_error() {
    let (addr, _service) = start_server().await;

    let mut alice = ConnectionManager::new(RemoteBackend::new(addr)).with_max_players(1);
    let mut bob = ConnectionManager::new(RemoteBackend::new(addr));

    alice.connect("alice", "duel").await.unwrap();
    let result = bob.connect("bob", "duel").await;

    assert!(matches!(
        result,
        Err(ConnectionError::Session(SessionError::Rejected(_)))
    ));
    assert_eq!(bob.state(), ConnectionState::Disconnected);
    assert!(bob.session().is_none());
}
