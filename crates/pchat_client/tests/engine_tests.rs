mod support;

use std::sync::Arc;

use pchat_client::engine::{ChatEngine, EngineParts, Intent, Notice, Presenter};
use pchat_client::settings::ClientSettings;
use pchat_client::{ClientError, Visibility};
use pchat_proto::{ClassificationStatus, MessageId, MessageRecord, MessageStatus, ServerEvent};
use serde_json::json;

use support::{
    manual_tick_settings, private_record, record, FakeApi, FakeCameras, FakeChatServer,
    FakeValidationServer, Log,
};

struct Client {
    engine: ChatEngine,
    chat: FakeChatServer,
    video: FakeValidationServer,
    api: FakeApi,
}

async fn client_with(name: &str, settings: ClientSettings, users: &[&str]) -> Client {
    let log = Log::default();
    let chat = FakeChatServer::default();
    let video = FakeValidationServer::new(log.clone());
    let api = FakeApi::default();
    *api.users.lock().unwrap() = users.iter().map(|u| u.to_string()).collect();
    let parts = EngineParts {
        primary: Arc::new(chat.clone()),
        validation: Arc::new(video.clone()),
        devices: Arc::new(FakeCameras::new(log)),
        api: Arc::new(api.clone()),
    };
    let mut engine = ChatEngine::new(name, settings, parts);
    engine.connect().await.unwrap();
    Client {
        engine,
        chat,
        video,
        api,
    }
}

async fn client(name: &str) -> Client {
    client_with(name, manual_tick_settings(), &["alice", "bob", "carol"]).await
}

/// Apply everything already queued. Returns the notices produced.
async fn pump(client: &mut Client) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Some(event) = client.engine.try_next_event() {
        if let Some(notice) = client.engine.handle_event(event).await {
            notices.push(notice);
        }
    }
    notices
}

/// The server echoing `record` back to everyone.
async fn broadcast(clients: &mut [&mut Client], event: ServerEvent) {
    for c in clients.iter_mut() {
        c.chat.push(event.clone());
        pump(c).await;
    }
}

fn visibility(client: &Client, id: &str) -> Visibility {
    let record = client
        .engine
        .store()
        .get(&MessageId::from(id))
        .expect("message in store");
    client.engine.visibility_of(record)
}

/// What a server would store for the last message `client` sent.
fn confirm_last(client: &Client, id: &str) -> MessageRecord {
    let sent = client.chat.sent();
    let mut last = sent.last().expect("something sent").clone();
    last["_id"] = json!(id);
    serde_json::from_value(last).unwrap()
}

#[tokio::test]
async fn connect_registers_identity_and_loads_state() {
    let c = client("alice").await;
    assert_eq!(c.chat.sent(), [json!({"type": "register", "username": "alice"})]);
    assert_eq!(c.engine.presence().users(), ["alice", "bob", "carol"]);
    assert!(c.engine.is_connected());
}

#[tokio::test]
async fn alice_bob_carol_scenario() {
    let mut alice = client("alice").await;
    let mut bob = client("bob").await;
    let mut carol = client("carol").await;

    // Public message.
    alice.engine.send_text("hi", false, None).await.unwrap();
    assert_eq!(
        alice.chat.sent()[1],
        json!({"type": "message", "sender": "alice", "text": "hi", "private": false, "status": "valid"})
    );
    let hi = confirm_last(&alice, "m-hi");
    assert_eq!(hi.status, MessageStatus::Valid);
    broadcast(&mut [&mut alice, &mut bob, &mut carol], ServerEvent::Message(hi)).await;
    for c in [&alice, &bob, &carol] {
        assert_eq!(visibility(c, "m-hi"), Visibility::Reveal);
    }

    // Private message to bob.
    alice
        .engine
        .send_text("secret", true, Some("bob".into()))
        .await
        .unwrap();
    assert_eq!(
        alice.chat.sent()[2],
        json!({"type": "message", "sender": "alice", "text": "secret", "private": true, "receiver": "bob", "status": "invalid"})
    );
    let secret = confirm_last(&alice, "m-secret");
    broadcast(&mut [&mut alice, &mut bob, &mut carol], ServerEvent::Message(secret)).await;
    assert_eq!(visibility(&alice, "m-secret"), Visibility::Reveal);
    assert_eq!(visibility(&bob, "m-secret"), Visibility::Obscure);
    assert_eq!(visibility(&carol, "m-secret"), Visibility::Obscure);

    // Bob validates.
    let m = MessageId::from("m-secret");
    bob.engine.handle_intent(Intent::View(m.clone())).await.unwrap();
    let generation = bob.engine.session().generation();
    bob.video.classify(generation, "m-secret", ClassificationStatus::Valid);
    assert_eq!(pump(&mut bob).await, [Notice::Changed]);
    assert_eq!(visibility(&bob, "m-secret"), Visibility::Reveal);
    assert_eq!(visibility(&carol, "m-secret"), Visibility::Obscure);

    bob.video.classify(generation, "m-secret", ClassificationStatus::Invalid);
    pump(&mut bob).await;
    assert_eq!(visibility(&bob, "m-secret"), Visibility::Obscure);

    bob.video.classify(generation, "m-secret", ClassificationStatus::Valid);
    pump(&mut bob).await;
    assert_eq!(visibility(&bob, "m-secret"), Visibility::Reveal);

    let rendered = bob.engine.rendered();
    let row = rendered.iter().find(|r| r.record.id == m).unwrap();
    assert!(row.being_validated && !row.can_validate && row.addressed_to_me);

    // Bob stops; the message is obscured again.
    bob.engine.handle_intent(Intent::StopView).await.unwrap();
    assert!(bob.engine.session().unlocks().is_empty());
    assert_eq!(visibility(&bob, "m-secret"), Visibility::Obscure);
    assert_eq!(visibility(&alice, "m-secret"), Visibility::Reveal);

    // Carol may not validate someone else's message.
    let err = carol.engine.start_validation(&m).await.unwrap_err();
    assert!(matches!(err, ClientError::NotPermitted { .. }));
}

#[tokio::test]
async fn toggle_sends_request_without_local_flip() {
    let mut alice = client("alice").await;
    alice.chat.push(ServerEvent::Message(record("m1", "alice", "hello")));
    pump(&mut alice).await;

    let id = MessageId::from("m1");
    alice.engine.toggle(&id).await.unwrap();
    alice.engine.toggle(&id).await.unwrap();

    let toggles = alice.api.toggles.lock().unwrap().clone();
    assert_eq!(toggles.len(), 2);
    assert_eq!(toggles[0], toggles[1]);
    assert_eq!(toggles[0].status, MessageStatus::Invalid);
    assert_eq!(toggles[0].viewer, None);
    assert_eq!(
        alice.engine.store().get(&id).unwrap().status,
        MessageStatus::Valid
    );

    // One authoritative push decides.
    let mut updated = record("m1", "alice", "hello");
    updated.status = MessageStatus::Invalid;
    alice.chat.push(ServerEvent::StatusUpdate(updated));
    pump(&mut alice).await;
    assert_eq!(
        alice.engine.store().get(&id).unwrap().status,
        MessageStatus::Invalid
    );
    assert_eq!(alice.engine.store().len(), 1);
}

#[tokio::test]
async fn receiver_toggle_is_viewer_scoped_and_others_refused() {
    let mut bob = client("bob").await;
    let mut carol = client("carol").await;
    let event = ServerEvent::Message(private_record("p1", "alice", "bob", "psst"));
    broadcast(&mut [&mut bob, &mut carol], event).await;

    let id = MessageId::from("p1");
    bob.engine.toggle(&id).await.unwrap();
    let toggles = bob.api.toggles.lock().unwrap().clone();
    assert_eq!(toggles[0].viewer.as_deref(), Some("bob"));
    assert_eq!(toggles[0].status, MessageStatus::Valid);

    let err = carol.engine.toggle(&id).await.unwrap_err();
    assert!(matches!(err, ClientError::NotPermitted { .. }));
    assert!(carol.api.toggles.lock().unwrap().is_empty());

    let err = carol.engine.toggle(&MessageId::from("nope")).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownMessage(_)));
}

#[tokio::test]
async fn receiver_named_on_public_message_cannot_toggle() {
    let mut bob = client("bob").await;
    let mut public = record("m5", "alice", "for everyone");
    public.receiver = Some("bob".into());
    bob.chat.push(ServerEvent::Message(public));
    pump(&mut bob).await;

    let rendered = bob.engine.rendered();
    assert!(rendered[0].addressed_to_me);
    assert!(!rendered[0].can_toggle);

    let err = bob.engine.toggle(&MessageId::from("m5")).await.unwrap_err();
    assert!(matches!(err, ClientError::NotPermitted { .. }));
}

#[tokio::test]
async fn status_push_for_unknown_message_is_ignored() {
    let mut alice = client("alice").await;
    alice.chat.push(ServerEvent::Message(record("m1", "alice", "one")));
    alice.chat.push(ServerEvent::StatusUpdate(record("ghost", "bob", "?")));
    let notices = pump(&mut alice).await;
    assert_eq!(notices, [Notice::Changed]);
    assert_eq!(alice.engine.store().len(), 1);
}

#[tokio::test]
async fn history_then_pushes_keep_order_and_ids_unique() {
    let log = Log::default();
    let chat = FakeChatServer::default();
    let api = FakeApi::default();
    *api.history.lock().unwrap() = vec![record("h1", "bob", "old"), record("h2", "carol", "older")];
    let parts = EngineParts {
        primary: Arc::new(chat.clone()),
        validation: Arc::new(FakeValidationServer::new(log.clone())),
        devices: Arc::new(FakeCameras::new(log)),
        api: Arc::new(api),
    };
    let mut engine = ChatEngine::new("alice", manual_tick_settings(), parts);
    engine.connect().await.unwrap();

    chat.push(ServerEvent::Message(record("h2", "carol", "older")));
    chat.push(ServerEvent::Message(record("m3", "bob", "new")));
    while let Some(event) = engine.try_next_event() {
        engine.handle_event(event).await;
    }
    let ids: Vec<_> = engine.store().iter().map(|r| r.id.as_str().to_string()).collect();
    assert_eq!(ids, ["h1", "h2", "m3"]);
}

#[tokio::test]
async fn private_send_resolves_or_requires_receiver() {
    let mut alice = client_with("alice", manual_tick_settings(), &["alice", "bob"]).await;
    alice.engine.send_text("auto", true, None).await.unwrap();
    assert_eq!(alice.chat.sent()[1]["receiver"], "bob");

    let mut crowded = client("alice").await;
    let err = crowded.engine.send_text("who?", true, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));

    let err = crowded
        .engine
        .send_text("me", true, Some("alice".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));

    let err = crowded.engine.send_text("   ", false, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
    assert_eq!(crowded.chat.sent().len(), 1);
}

#[tokio::test]
async fn optimistic_echo_is_confirmed_in_place() {
    let mut settings = manual_tick_settings();
    settings.optimistic_echo = true;
    let mut alice = client_with("alice", settings, &["alice"]).await;

    alice.engine.send_text("fast", false, None).await.unwrap();
    assert_eq!(alice.engine.store().len(), 1);
    let rendered = alice.engine.rendered();
    assert!(rendered[0].pending && !rendered[0].can_toggle);

    let token = alice.chat.sent()[1]["client_ref"].as_str().unwrap().to_string();
    let mut confirmed = record("m1", "alice", "fast");
    confirmed.client_ref = Some(token);
    alice.chat.push(ServerEvent::Message(confirmed));
    pump(&mut alice).await;

    assert_eq!(alice.engine.store().len(), 1);
    assert_eq!(alice.engine.store().records()[0].id.as_str(), "m1");
    assert!(!alice.engine.rendered()[0].pending);
}

#[tokio::test]
async fn primary_close_surfaces_disconnect_and_stops_sends() {
    let mut alice = client("alice").await;
    alice.chat.close();
    assert_eq!(pump(&mut alice).await, [Notice::Disconnected(None)]);
    assert!(!alice.engine.is_connected());

    let err = alice.engine.send_text("anyone?", false, None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[tokio::test]
async fn failed_write_surfaces_disconnect() {
    let mut alice = client("alice").await;
    alice.chat.break_writes();

    let err = alice.engine.send_text("hello?", false, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(!alice.engine.is_connected());
    assert_eq!(
        pump(&mut alice).await,
        [Notice::Disconnected(Some(
            "Channel transport error: connection reset".into()
        ))]
    );

    let err = alice.engine.send_text("again", false, None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[tokio::test]
async fn validation_channel_loss_is_reported() {
    let mut bob = client("bob").await;
    bob.chat
        .push(ServerEvent::Message(private_record("p1", "alice", "bob", "psst")));
    pump(&mut bob).await;

    bob.engine.start_validation(&MessageId::from("p1")).await.unwrap();
    let generation = bob.engine.session().generation();
    bob.video.hang_up(generation);
    let notices = pump(&mut bob).await;
    assert!(matches!(&notices[..], [Notice::Failure(_)]));
    assert_eq!(bob.engine.session().active_target(), None);
    assert_eq!(visibility(&bob, "p1"), Visibility::Obscure);
}

#[tokio::test]
async fn upload_sends_form_with_guessed_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, b"\x89PNG").unwrap();

    let mut alice = client("alice").await;
    let id = alice
        .engine
        .upload(&path, " look ", true, Some("bob".into()))
        .await
        .unwrap();
    assert_eq!(id.as_str(), "up-1");

    let uploads = alice.api.uploads.lock().unwrap().clone();
    let (form, bytes) = &uploads[0];
    assert_eq!(form.sender, "alice");
    assert_eq!(form.text, "look");
    assert_eq!(form.filename, "photo.png");
    assert_eq!(form.content_type, "image/png");
    assert!(form.private);
    assert_eq!(form.receiver.as_deref(), Some("bob"));
    assert_eq!(form.status, MessageStatus::Invalid);
    assert_eq!(bytes, b"\x89PNG");
}

#[tokio::test]
async fn fetch_writes_attachment_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bin");
    let alice = client("alice").await;
    alice.api.files.lock().unwrap().insert(
        "f1".into(),
        pchat_client::api::Attachment {
            content_type: "text/plain".into(),
            bytes: b"payload".to_vec(),
        },
    );

    let written = alice.engine.fetch_attachment("f1", &out).await.unwrap();
    assert_eq!(written, 7);
    assert_eq!(std::fs::read(&out).unwrap(), b"payload");
}

#[derive(Default)]
struct Recorder {
    refreshes: usize,
    notices: Vec<Notice>,
    last_len: usize,
}

impl Presenter for Recorder {
    fn refresh(&mut self, engine: &ChatEngine) {
        self.refreshes += 1;
        self.last_len = engine.rendered().len();
    }

    fn notice(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }
}

#[tokio::test]
async fn run_loop_applies_intents_until_quit() {
    let mut alice = client("alice").await;
    alice.chat.push(ServerEvent::Message(record("m1", "bob", "yo")));

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(Intent::Say {
        text: "hello".into(),
        private: false,
        receiver: None,
    })
    .await
    .unwrap();
    tx.send(Intent::Toggle(MessageId::from("missing"))).await.unwrap();
    tx.send(Intent::Quit).await.unwrap();

    let mut presenter = Recorder::default();
    alice.engine.run(rx, &mut presenter).await;

    assert!(presenter.refreshes >= 2);
    assert_eq!(presenter.last_len, 1);
    assert!(presenter
        .notices
        .iter()
        .any(|n| matches!(n, Notice::Failure(msg) if msg.contains("missing"))));
    assert_eq!(alice.chat.sent()[1]["text"], "hello");
    assert!(!alice.engine.is_connected());
}
