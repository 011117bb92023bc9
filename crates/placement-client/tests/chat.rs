mod common;

use std::time::Duration;

use chrono::Utc;
use placement_client::chat::{
    ChatSession, DeliveryPath, LiveUpdate, ReceiveOutcome, SessionPhase,
};
use placement_client::events::ClientEvent;
use placement_client::transport::{LiveConnection, LiveEvent};
use placement_client::ClientError;
use placement_shared::constants::TEMP_ID_PREFIX;
use placement_shared::{ConnectionState, ConversationId, Message, SenderRole};

use common::{client_for, eventually, start_backend, TestBackend};

async fn seed_history(server: &TestBackend, conversation: &ConversationId) {
    let start = Utc::now() - chrono::Duration::minutes(10);
    for (i, body) in ["first", "second", "third"].into_iter().enumerate() {
        server
            .backend
            .seed_message(Message {
                id: format!("h{i}"),
                conversation_id: conversation.clone(),
                sender_role: if i % 2 == 0 {
                    SenderRole::Subject
                } else {
                    SenderRole::Counterparty
                },
                body: body.to_string(),
                created_at: start + chrono::Duration::minutes(i as i64),
                correlation_id: None,
            })
            .await;
    }
}

/// Open the conversation and wait until the server side of the socket is
/// subscribed.
async fn open_live(server: &TestBackend, chat: &mut ChatSession, conversation: &ConversationId) {
    chat.open_conversation(conversation.clone()).await.unwrap();
    assert_eq!(chat.phase(), SessionPhase::Live);
    assert!(eventually(|| server.backend.live_sockets() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn next_update(chat: &mut ChatSession) -> LiveUpdate {
    tokio::time::timeout(Duration::from_secs(2), chat.next_live_event())
        .await
        .expect("live event in time")
        .expect("live connection present")
}

/// Apply live events until the session reports the channel lost. Echoes
/// still queued ahead of the loss are applied on the way.
async fn until_disconnected(chat: &mut ChatSession) {
    for _ in 0..16 {
        if next_update(chat).await == LiveUpdate::Disconnected {
            return;
        }
    }
    panic!("live channel never reported a disconnect");
}

#[tokio::test]
async fn test_history_send_receive_and_echo_dedup() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C1");
    seed_history(&server, &conversation).await;

    let state = client_for(&server);
    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;

    let bodies: Vec<_> = chat.messages().iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["first", "second", "third"]);
    assert_eq!(chat.connection_state(), ConnectionState::Connected);

    let receipt = chat.send_message("  hola ").await.unwrap();
    assert_eq!(receipt.path, DeliveryPath::Live);
    assert!(receipt.delivered);
    assert_eq!(chat.messages().len(), 4);
    let local = chat.transcript().last().unwrap();
    assert!(local.id.starts_with(TEMP_ID_PREFIX));
    assert_eq!(local.body, "hola");

    // The server echoes our own frame back; it must not duplicate the entry.
    assert_eq!(
        next_update(&mut chat).await,
        LiveUpdate::Received(ReceiveOutcome::Duplicate)
    );
    assert_eq!(chat.messages().len(), 4);

    server
        .backend
        .append_message(
            conversation.clone(),
            SenderRole::Counterparty,
            "hi there".into(),
            None,
        )
        .await;
    assert_eq!(
        next_update(&mut chat).await,
        LiveUpdate::Received(ReceiveOutcome::Appended {
            unread_incremented: true
        })
    );
    assert_eq!(chat.messages().len(), 5);
    assert_eq!(chat.unread(), 1);

    chat.set_focused(true);
    assert_eq!(chat.unread(), 0);

    chat.close_conversation().await;
}

#[tokio::test]
async fn test_close_releases_the_socket() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C2");
    let state = client_for(&server);

    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;
    assert!(chat.has_live_connection());

    chat.close_conversation().await;
    assert_eq!(chat.phase(), SessionPhase::Closed);
    assert!(!chat.has_live_connection());
    assert!(chat.messages().is_empty());
    assert!(eventually(|| server.backend.live_sockets() == 0).await);
}

#[tokio::test]
async fn test_dropping_the_session_releases_the_socket() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C3");
    let state = client_for(&server);

    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;
    drop(chat);

    assert!(eventually(|| server.backend.live_sockets() == 0).await);
}

#[tokio::test]
async fn test_disconnect_falls_back_to_durable_send() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C4");
    seed_history(&server, &conversation).await;
    let state = client_for(&server);

    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;

    server.backend.disconnect(&conversation).await;
    assert_eq!(next_update(&mut chat).await, LiveUpdate::Disconnected);
    assert_eq!(chat.phase(), SessionPhase::Disconnected);
    assert_eq!(chat.connection_state(), ConnectionState::Disconnected);
    assert!(!chat.has_live_connection());
    assert_eq!(chat.messages().len(), 3);

    let receipt = chat.send_message("are you there?").await.unwrap();
    assert_eq!(receipt.path, DeliveryPath::Durable);
    assert!(receipt.delivered);
    assert_eq!(chat.messages().len(), 4);

    let stored = server.backend.history(&conversation).await;
    assert_eq!(stored.len(), 4);
    let last = stored.last().unwrap();
    assert_eq!(last.body, "are you there?");
    assert_eq!(last.sender_role, SenderRole::Subject);
}

#[tokio::test]
async fn test_unreachable_backend_leaves_session_disconnected() {
    let server = start_backend().await;
    let state = client_for(&server);
    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut chat = state.chat_session();
    chat.open_conversation(ConversationId::from("C5")).await.unwrap();
    assert_eq!(chat.phase(), SessionPhase::Disconnected);
    assert!(chat.messages().is_empty());

    let receipt = chat.send_message("offline").await.unwrap();
    assert_eq!(receipt.path, DeliveryPath::Durable);
    assert!(!receipt.delivered);
    assert_eq!(chat.messages().len(), 1);
}

#[tokio::test]
async fn test_open_announces_connecting_then_connected() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C6");
    let state = client_for(&server);
    let mut events = state.events.subscribe();

    let mut chat = state.chat_session();
    chat.open_conversation(conversation).await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::ConnectionChanged { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        [ConnectionState::Connecting, ConnectionState::Connected]
    );
    chat.close_conversation().await;
}

#[tokio::test]
async fn test_each_send_appends_exactly_one_entry_in_call_order() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C7");
    seed_history(&server, &conversation).await;
    let state = client_for(&server);

    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;

    let mut sent = Vec::new();
    let mut expected_len = chat.messages().len();
    for (i, text) in ["one", "   ", "two", "", "three"].into_iter().enumerate() {
        match chat.send_message(text).await {
            Ok(receipt) => {
                assert_eq!(receipt.path, DeliveryPath::Live, "send #{i}");
                expected_len += 1;
                sent.push(text);
            }
            Err(ClientError::Validation(_)) => assert!(text.trim().is_empty()),
            Err(e) => panic!("unexpected send error: {e}"),
        }
        assert_eq!(chat.messages().len(), expected_len);
    }

    server.backend.disconnect(&conversation).await;
    until_disconnected(&mut chat).await;
    assert_eq!(chat.messages().len(), expected_len);

    for text in ["four", "five"] {
        let receipt = chat.send_message(text).await.unwrap();
        assert_eq!(receipt.path, DeliveryPath::Durable);
        assert!(receipt.delivered);
        expected_len += 1;
        sent.push(text);
        assert_eq!(chat.messages().len(), expected_len);
    }

    let tail: Vec<_> = chat.messages()[3..].iter().map(|m| m.body.as_str()).collect();
    assert_eq!(tail, sent);
    assert_eq!(tail, ["one", "two", "three", "four", "five"]);
    assert!(chat.messages()[3..].iter().all(|m| m.is_local()));
}

#[tokio::test]
async fn test_socket_failure_reports_a_transport_error() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C8");
    let state = client_for(&server);
    let url = state
        .config
        .live_url(&conversation, SenderRole::Subject)
        .unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let connection = LiveConnection::connect(&url, conversation.clone(), tx, 8)
        .await
        .unwrap();
    assert!(eventually(|| server.backend.live_sockets() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.backend.sever(&conversation).await;
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, LiveEvent::Error(_)), "got {event:?}");
    assert!(eventually(|| !connection.is_open()).await);
}

#[tokio::test]
async fn test_socket_failure_keeps_history_and_falls_back_to_http() {
    let server = start_backend().await;
    let conversation = ConversationId::from("C9");
    seed_history(&server, &conversation).await;
    let state = client_for(&server);

    let mut chat = state.chat_session();
    open_live(&server, &mut chat, &conversation).await;

    server.backend.sever(&conversation).await;
    until_disconnected(&mut chat).await;
    assert_eq!(chat.phase(), SessionPhase::Disconnected);
    assert_eq!(chat.connection_state(), ConnectionState::Disconnected);
    let bodies: Vec<_> = chat.messages().iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["first", "second", "third"]);

    let receipt = chat.send_message("still here").await.unwrap();
    assert_eq!(receipt.path, DeliveryPath::Durable);
    assert!(receipt.delivered);
    assert_eq!(server.backend.history(&conversation).await.len(), 4);
}
