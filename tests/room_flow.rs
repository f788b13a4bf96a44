//! Integration tests for room membership and message fan-out.

mod common;

use common::TestServer;
use common::server::mint_token;
use roomcast_proto::{ClientEvent, MessageRead, ServerEvent};
use serde_json::json;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(300);

#[tokio::test]
async fn message_reaches_every_member_including_sender() {
    let server = TestServer::spawn(18110).await.expect("spawn");
    server
        .seed_users(&[("u1", "alice"), ("u2", "bob"), ("u3", "carol")])
        .await
        .unwrap();

    let mut alice = server.connect("u1").await.unwrap();
    let mut bob = server.connect("u2").await.unwrap();
    let mut carol = server.connect("u3").await.unwrap();

    alice.join("lobby").await.unwrap();
    bob.join("lobby").await.unwrap();
    alice
        .recv_until(|e| matches!(e, ServerEvent::UserJoined(u) if u.user_id == "u2"))
        .await
        .unwrap();

    alice.say("lobby", "hello there").await.unwrap();

    for client in [&mut alice, &mut bob] {
        match client.recv().await.unwrap() {
            ServerEvent::NewMessage(m) => {
                assert_eq!(m.room_id.as_str(), "lobby");
                assert_eq!(m.message.content, "hello there");
                assert_eq!(m.message.sender.id, "u1");
                assert_eq!(m.message.sender.username, "alice");
            }
            other => panic!("expected new-message, got {other:?}"),
        }
    }

    // Not a member: hears nothing.
    carol.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn joining_twice_announces_once() {
    let server = TestServer::spawn(18112).await.expect("spawn");
    server
        .seed_users(&[("u1", "alice"), ("u2", "bob")])
        .await
        .unwrap();

    let mut alice = server.connect("u1").await.unwrap();
    let mut bob = server.connect("u2").await.unwrap();
    alice.join("r1").await.unwrap();
    // Round trip through the room so alice's join is applied first.
    alice.say("r1", "ping").await.unwrap();
    alice.recv().await.unwrap();

    bob.join("r1").await.unwrap();
    bob.join("r1").await.unwrap();

    match alice.recv().await.unwrap() {
        ServerEvent::UserJoined(u) => {
            assert_eq!(u.user_id, "u2");
            assert_eq!(u.username, "bob");
        }
        other => panic!("expected user-joined, got {other:?}"),
    }
    alice.expect_silence(QUIET).await.unwrap();

    // One membership means one copy of each message.
    alice.say("r1", "once").await.unwrap();
    assert!(matches!(bob.recv().await.unwrap(), ServerEvent::NewMessage(_)));
    bob.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn leaving_stops_delivery_and_notifies_room() {
    let server = TestServer::spawn(18114).await.expect("spawn");
    server
        .seed_users(&[("u1", "alice"), ("u2", "bob")])
        .await
        .unwrap();

    let mut alice = server.connect("u1").await.unwrap();
    let mut bob = server.connect("u2").await.unwrap();
    alice.join("r1").await.unwrap();
    bob.join("r1").await.unwrap();
    alice
        .recv_until(|e| matches!(e, ServerEvent::UserJoined(_)))
        .await
        .unwrap();

    bob.send(ClientEvent::LeaveRoom(common::client::room("r1")))
        .await
        .unwrap();
    match alice.recv().await.unwrap() {
        ServerEvent::UserLeft(u) => assert_eq!(u.user_id, "u2"),
        other => panic!("expected user-left, got {other:?}"),
    }

    alice.say("r1", "anyone?").await.unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::NewMessage(_)));
    bob.expect_silence(QUIET).await.unwrap();
}

#[tokio::test]
async fn read_receipts_are_broadcast() {
    let server = TestServer::spawn(18116).await.expect("spawn");
    server
        .seed_users(&[("u1", "alice"), ("u2", "bob")])
        .await
        .unwrap();

    let mut alice = server.connect("u1").await.unwrap();
    let mut bob = server.connect("u2").await.unwrap();
    alice.join("r1").await.unwrap();
    bob.join("r1").await.unwrap();
    alice
        .recv_until(|e| matches!(e, ServerEvent::UserJoined(_)))
        .await
        .unwrap();

    bob.send(ClientEvent::MessageRead(MessageRead {
        room_id: common::client::room("r1"),
        message_id: "m-42".into(),
    }))
    .await
    .unwrap();

    match alice.recv().await.unwrap() {
        ServerEvent::MessageReadUpdate(r) => {
            assert_eq!(r.message_id, "m-42");
            assert_eq!(r.user_id, "u2");
        }
        other => panic!("expected message-read-update, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_input_gets_error_and_connection_survives() {
    let server = TestServer::spawn(18118).await.expect("spawn");
    server.seed_users(&[("u1", "alice")]).await.unwrap();

    let mut alice = server.connect("u1").await.unwrap();

    alice.send_raw("this is not json").await.unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::Error(e) if e.code == "malformed_payload"));

    alice
        .send_raw(r#"{"event":"join-room","data":""}"#)
        .await
        .unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::Error(e) if e.code == "invalid_room_id"));

    alice.say("nowhere", "hi").await.unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::Error(e) if e.code == "not_in_room"));

    alice
        .send_raw(r#"{"event":"dance","data":null}"#)
        .await
        .unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::Error(e) if e.code == "unknown_event"));

    // Still active.
    alice.join("r1").await.unwrap();
    alice.say("r1", "still here").await.unwrap();
    assert!(matches!(alice.recv().await.unwrap(), ServerEvent::NewMessage(_)));
}

#[tokio::test]
async fn messages_are_persisted_for_history() {
    let server = TestServer::spawn(18120).await.expect("spawn");
    server.seed_users(&[("u1", "alice")]).await.unwrap();

    let mut alice = server.connect("u1").await.unwrap();
    alice.join("r1").await.unwrap();
    for text in ["first", "second"] {
        alice.say("r1", text).await.unwrap();
        alice.recv().await.unwrap();
    }

    let token = mint_token("u1", 300);
    // Writes are asynchronous; poll briefly.
    let mut history = json!([]);
    for _ in 0..20 {
        let (status, body) = server
            .http("GET", "/rooms/r1/messages", Some(&token), None)
            .await
            .unwrap();
        assert_eq!(status, 200);
        history = body;
        if history.as_array().is_some_and(|a| a.len() == 2) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let contents: Vec<_> = history
        .as_array()
        .expect("array")
        .iter()
        .map(|m| m["content"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(contents, ["first", "second"]);
}

#[tokio::test]
async fn created_room_is_pushed_to_connected_participants() {
    let server = TestServer::spawn(18122).await.expect("spawn");
    server
        .seed_users(&[("u1", "alice"), ("u2", "bob"), ("u3", "carol")])
        .await
        .unwrap();

    let mut bob = server.connect("u2").await.unwrap();
    let mut carol = server.connect("u3").await.unwrap();

    let (status, room) = server
        .http(
            "POST",
            "/rooms",
            Some(&mint_token("u1", 300)),
            Some(json!({"name": "plans", "type": "private", "participants": ["u2"]})),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(room["name"], "plans");
    assert_eq!(room["type"], "private");

    match bob.recv().await.unwrap() {
        ServerEvent::RoomCreated(info) => {
            assert_eq!(info.id.as_str(), room["id"].as_str().unwrap());
            assert_eq!(info.participants.len(), 2);
        }
        other => panic!("expected room-created, got {other:?}"),
    }
    carol.expect_silence(QUIET).await.unwrap();

    let (status, _) = server.http("GET", "/rooms", None, None).await.unwrap();
    assert_eq!(status, 401);
}
