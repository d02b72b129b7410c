//! Workspace-level lifecycle checks that run without a browser: profile
//! persistence round trips, teardown idempotence, and the stability of the
//! event wire shape consumers parse.

use std::sync::Arc;

use tempfile::tempdir;

use chatpilot::{
    AuthStrategy, ChatId, Client, ClientConfig, ClientError, ClientEvent, ClientId,
    ConnectionState, DisconnectReason, LocalAuth, NoAuth, SessionConfig, SessionStore,
};

/// A fresh (non-existent) profile directory means the next launch must go
/// through interactive auth; a persisted one means it must not. This pins
/// the filesystem half of that contract.
#[tokio::test]
async fn profile_persistence_round_trip() {
    let base = tempdir().unwrap();
    let store = SessionStore::new(base.path(), Some(ClientId("acct".to_string()))).unwrap();
    assert!(!store.exists(), "fresh directory: interactive auth ahead");

    let auth = LocalAuth::new(store.clone());
    let mut config = SessionConfig::default();
    auth.before_launch(&mut config).await.unwrap();
    assert!(store.exists(), "persisted profile survives for relaunch");
    assert_eq!(config.data_dir.as_deref(), Some(store.profile_dir().as_path()));

    auth.on_logout().await.unwrap();
    assert!(!store.exists(), "logout clears the persisted session");
}

#[tokio::test]
async fn destroy_and_logout_are_repeatable() {
    let client = Client::new(
        ClientConfig::new("https://chat.example.net/"),
        Arc::new(NoAuth),
    );
    client.destroy().await;
    client.destroy().await;
    client.logout().await.unwrap();

    let err = client
        .send_message(&ChatId("c1@c".to_string()), "hi", &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotReady));
}

#[test]
fn event_wire_shape_is_stable() {
    let event = ClientEvent::Disconnected(DisconnectReason::State(ConnectionState::Conflict));
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("Disconnected"));
    assert!(json.contains("Conflict"));

    let back: ClientEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
    assert_eq!(back.kind(), "disconnected");
}
