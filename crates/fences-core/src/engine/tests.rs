use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};

use crate::{
    broadcast::BroadcastDispatcher,
    config::DEFAULT_DATETIME_PATTERN,
    directory::DirectoryService,
    domain::{ChatId, Directory, Member},
    engine::Engine,
    messaging::{
        port::DeliveryPort,
        types::{Chunk, Event, EventKind, Outgoing},
    },
    monitor::ExpirationMonitor,
    session::SessionStore,
    store::MemoryStore,
    texts, Result,
};

#[derive(Default)]
struct FakeDelivery {
    sent: StdMutex<Vec<(i64, Chunk)>>,
}

#[async_trait]
impl DeliveryPort for FakeDelivery {
    async fn deliver(&self, chat: ChatId, chunk: &Chunk) -> Result<()> {
        self.sent.lock().unwrap().push((chat.0, chunk.clone()));
        Ok(())
    }
}

struct Harness {
    engine: Engine,
    service: Arc<DirectoryService>,
    monitor: ExpirationMonitor,
    delivery: Arc<FakeDelivery>,
}

fn harness(members: Vec<Member>) -> Harness {
    let store = MemoryStore::with_settings(Directory {
        members,
        expires_at: None,
    });
    let service = Arc::new(DirectoryService::new(
        Arc::new(store),
        DEFAULT_DATETIME_PATTERN,
    ));
    let monitor = ExpirationMonitor::new(service.clone());
    let delivery = Arc::new(FakeDelivery::default());
    let dispatcher = BroadcastDispatcher::new(service.clone(), delivery.clone());
    let engine = Engine::new(
        service.clone(),
        Arc::new(SessionStore::new()),
        dispatcher,
        monitor.expired_flag(),
        64,
    );
    Harness {
        engine,
        service,
        monitor,
        delivery,
    }
}

/// Ana and Boris are plain members, Root is the admin. Carol never talked
/// to the bot, so she has no delivery address.
fn crew() -> Vec<Member> {
    let mut ana = Member::new("ana", "Ana", false);
    ana.chat_id = Some(11);
    let mut boris = Member::new("boris", "Boris", false);
    boris.chat_id = Some(22);
    let carol = Member::new("carol", "Carol", false);
    let mut root = Member::new("root", "Root", true);
    root.chat_id = Some(99);
    vec![ana, boris, carol, root]
}

fn action(username: &str, data: &str) -> Event {
    Event {
        conversation: chat_of(username),
        username: Some(username.to_string()),
        kind: EventKind::Action(data.to_string()),
    }
}

fn text(username: &str, t: &str) -> Event {
    Event {
        conversation: chat_of(username),
        username: Some(username.to_string()),
        kind: EventKind::Text(t.to_string()),
    }
}

fn chat_of(username: &str) -> ChatId {
    // Stable distinct conversation per user.
    ChatId(username.bytes().map(i64::from).sum())
}

fn first_text(out: &[Outgoing]) -> &str {
    match out.first().expect("no output") {
        Outgoing::Message { text, .. } => text,
        Outgoing::Document { name, .. } => name,
    }
}

fn mentions(out: &[Outgoing], needle: &str) -> bool {
    out.iter().any(|o| match o {
        Outgoing::Message { text, .. } => text.contains(needle),
        Outgoing::Document { name, content, .. } => {
            name.contains(needle) || content.contains(needle)
        }
    })
}

fn choice_actions(out: &[Outgoing]) -> Vec<String> {
    out.iter()
        .flat_map(|o| match o {
            Outgoing::Message { choices, .. } => {
                choices.iter().map(|c| c.action.clone()).collect::<Vec<_>>()
            }
            _ => Vec::new(),
        })
        .collect()
}

async fn walk_to_typing(h: &Harness, writer: &str, recipient: &str, alias: &str) {
    h.engine.handle(&action(writer, "write")).await;
    h.engine.handle(&action(writer, recipient)).await;
    let out = h.engine.handle(&text(writer, alias)).await;
    assert_eq!(first_text(&out), texts::ENTER_MESSAGE);
}

#[tokio::test]
async fn strangers_are_denied() {
    let h = harness(crew());
    let out = h.engine.handle(&text("mallory", "let me in")).await;
    assert_eq!(first_text(&out), texts::ACCESS_DENIED);
}

#[tokio::test]
async fn start_menu_reflects_role_and_expiry() {
    let h = harness(crew());

    let ev = Event {
        conversation: chat_of("ana"),
        username: Some("ana".to_string()),
        kind: EventKind::Command("start".to_string()),
    };
    let out = h.engine.handle(&ev).await;
    let actions = choice_actions(&out);
    assert!(actions.contains(&"write".to_string()));
    assert!(!actions.contains(&"admin".to_string()));

    let ev = Event {
        conversation: chat_of("root"),
        username: Some("root".to_string()),
        kind: EventKind::Command("start".to_string()),
    };
    let out = h.engine.handle(&ev).await;
    assert!(choice_actions(&out).contains(&"admin".to_string()));

    // Expired: the write button disappears.
    h.engine
        .expired
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let out = h.engine.handle(&ev).await;
    assert!(!choice_actions(&out).contains(&"write".to_string()));
}

#[tokio::test]
async fn compose_happy_path_saves_multi_part_entry() {
    let h = harness(crew());

    let out = h.engine.handle(&action("boris", "write")).await;
    assert_eq!(first_text(&out), texts::SELECT_RECIPIENT);
    assert!(choice_actions(&out).contains(&"Ana".to_string()));

    let out = h.engine.handle(&action("boris", "Ana")).await;
    assert_eq!(first_text(&out), texts::WRITE_ALIAS);

    let out = h.engine.handle(&text("boris", "ghost")).await;
    assert_eq!(first_text(&out), texts::ENTER_MESSAGE);

    h.engine.handle(&text("boris", "part one")).await;
    let out = h.engine.handle(&text("boris", "part two")).await;
    assert_eq!(first_text(&out), texts::ADDED_CHUNK);

    let out = h.engine.handle(&action("boris", "save")).await;
    assert_eq!(first_text(&out), texts::MESSAGE_SAVED);

    let board = h.service.board_of("ana").await.unwrap();
    assert_eq!(board.entries.len(), 1);
    let entry = &board.entries[0];
    assert_eq!(entry.alias, "ghost");
    assert_eq!(entry.sender.as_deref(), Some("boris"));
    assert_eq!(entry.parts, ["part one", "part two"]);
}

#[tokio::test]
async fn alias_must_be_free_on_the_chosen_board_only() {
    let h = harness(crew());
    h.service
        .save_entry("Ana", "ghost", vec!["old".into()], None)
        .await
        .unwrap();

    // Same alias toward another recipient is fine.
    walk_to_typing(&h, "boris", "Boris", "ghost").await;

    // Toward Ana it re-prompts the alias step inline.
    h.engine.handle(&action("root", "write")).await;
    h.engine.handle(&action("root", "Ana")).await;
    let out = h.engine.handle(&text("root", "ghost")).await;
    assert!(mentions(&out, "already used"));
    assert!(mentions(&out, texts::WRITE_ALIAS));

    // Still in the alias state: a fresh alias goes through.
    let out = h.engine.handle(&text("root", "phantom")).await;
    assert_eq!(first_text(&out), texts::ENTER_MESSAGE);
}

#[tokio::test]
async fn own_label_shortcut_signs_with_directory_label() {
    let h = harness(crew());

    h.engine.handle(&action("boris", "write")).await;
    h.engine.handle(&action("boris", "Ana")).await;
    let out = h.engine.handle(&action("boris", "use_label")).await;
    assert_eq!(first_text(&out), texts::ENTER_MESSAGE);

    h.engine.handle(&text("boris", "signed as myself")).await;
    h.engine.handle(&action("boris", "save")).await;

    let board = h.service.board_of("ana").await.unwrap();
    assert_eq!(board.entries[0].alias, "Boris");
}

#[tokio::test]
async fn saving_nothing_is_rejected() {
    let h = harness(crew());
    walk_to_typing(&h, "boris", "Ana", "ghost").await;

    let out = h.engine.handle(&action("boris", "save")).await;
    assert_eq!(first_text(&out), texts::EMPTY_MESSAGE);

    // Still composing: text keeps accumulating.
    let out = h.engine.handle(&text("boris", "now with content")).await;
    assert_eq!(first_text(&out), texts::ADDED_CHUNK);
}

#[tokio::test]
async fn cancel_overlay_resume_keeps_chunks() {
    let h = harness(crew());
    walk_to_typing(&h, "boris", "Ana", "ghost").await;
    h.engine.handle(&text("boris", "a")).await;
    h.engine.handle(&text("boris", "b")).await;

    let out = h.engine.handle(&action("boris", "cancel")).await;
    assert_eq!(first_text(&out), texts::CONFIRM_CANCEL);

    let out = h.engine.handle(&action("boris", "collect_msg")).await;
    assert_eq!(first_text(&out), texts::ENTER_MESSAGE);

    h.engine.handle(&action("boris", "save")).await;
    let board = h.service.board_of("ana").await.unwrap();
    assert_eq!(board.entries[0].parts, ["a", "b"]);
}

#[tokio::test]
async fn cancel_overlay_discard_clears_everything() {
    let h = harness(crew());
    walk_to_typing(&h, "boris", "Ana", "ghost").await;
    h.engine.handle(&text("boris", "a")).await;

    h.engine.handle(&action("boris", "cancel")).await;
    let out = h.engine.handle(&action("boris", "try_cancel")).await;
    assert_eq!(first_text(&out), texts::MAIN_MENU);

    // A fresh flow starts with zero chunks.
    walk_to_typing(&h, "boris", "Ana", "phantom").await;
    let out = h.engine.handle(&action("boris", "save")).await;
    assert_eq!(first_text(&out), texts::EMPTY_MESSAGE);
}

#[tokio::test]
async fn expiration_gates_compose_until_extended() {
    let h = harness(crew());
    let fmt = |dt: chrono::NaiveDateTime| dt.format(DEFAULT_DATETIME_PATTERN).to_string();

    // Admin pushes the closing time one second into the past.
    h.engine.handle(&action("root", "admin")).await;
    h.engine.handle(&action("root", "set_datetime")).await;
    let past = Local::now().naive_local() - ChronoDuration::seconds(1);
    let out = h.engine.handle(&text("root", &fmt(past))).await;
    assert!(mentions(&out, "closes at"));

    h.monitor.tick().await;
    let out = h.engine.handle(&action("ana", "write")).await;
    assert_eq!(first_text(&out), texts::EXPIRED_NOTICE);

    // Extending into the future reopens the fence after the next tick.
    h.engine.handle(&action("root", "set_datetime")).await;
    let future = Local::now().naive_local() + ChronoDuration::hours(1);
    h.engine.handle(&text("root", &fmt(future))).await;

    h.monitor.tick().await;
    let out = h.engine.handle(&action("ana", "write")).await;
    assert_eq!(first_text(&out), texts::SELECT_RECIPIENT);
}

#[tokio::test]
async fn bad_expiration_format_reprompts_in_place() {
    let h = harness(crew());
    h.engine.handle(&action("root", "admin")).await;
    h.engine.handle(&action("root", "set_datetime")).await;

    let out = h.engine.handle(&text("root", "tomorrow at noon")).await;
    assert!(mentions(&out, "does not match"));
    assert!(mentions(&out, texts::ENTER_EXPIRATION));

    // Still in the same state: a well-formed timestamp is accepted.
    let out = h.engine.handle(&text("root", "01.01.2031 10:00:00")).await;
    assert!(mentions(&out, "closes at"));
}

#[tokio::test]
async fn non_admins_cannot_open_the_panel() {
    let h = harness(crew());
    let out = h.engine.handle(&action("ana", "admin")).await;
    assert_eq!(first_text(&out), texts::NOT_ADMIN);

    // No state change happened: Ana is still idle.
    let out = h.engine.handle(&action("ana", "write")).await;
    assert_eq!(first_text(&out), texts::SELECT_RECIPIENT);
}

#[tokio::test]
async fn add_member_flow_reprompts_label_on_conflict() {
    let h = harness(crew());
    h.engine.handle(&action("root", "admin")).await;
    h.engine.handle(&action("root", "admin_add")).await;
    h.engine.handle(&text("root", "@dave")).await;

    // Label collision: back to the label step, username kept.
    let out = h.engine.handle(&text("root", "Ana")).await;
    assert!(mentions(&out, "label already taken"));
    assert!(mentions(&out, texts::ENTER_NEW_LABEL));

    let out = h.engine.handle(&text("root", "Dave")).await;
    assert!(mentions(&out, "@dave added"));
    assert!(h.service.is_member("dave").await);
    assert!(h
        .service
        .board_of("dave")
        .await
        .unwrap()
        .entries
        .is_empty());
}

#[tokio::test]
async fn remove_promote_demote_round_trip() {
    let h = harness(crew());
    h.engine.handle(&action("root", "admin")).await;

    h.engine.handle(&action("root", "add_root")).await;
    let out = h.engine.handle(&action("root", "root_user:Ana")).await;
    assert!(mentions(&out, "now an admin"));
    assert!(h.service.is_admin("ana").await);

    h.engine.handle(&action("root", "delete_root")).await;
    let out = h.engine.handle(&action("root", "unroot_user:Ana")).await;
    assert!(mentions(&out, "no longer an admin"));
    assert!(!h.service.is_admin("ana").await);

    h.engine.handle(&action("root", "admin_remove_member")).await;
    let out = h.engine.handle(&action("root", "rm_user:Boris")).await;
    assert!(mentions(&out, "Boris removed"));
    assert!(!h.service.is_member("boris").await);
}

#[tokio::test]
async fn broadcast_to_all_reports_unreachable_members() {
    let h = harness(crew());
    h.engine.handle(&action("root", "admin")).await;
    h.engine.handle(&action("root", "send_bot_message")).await;
    h.engine.handle(&action("root", "bot_message_all")).await;
    h.engine.handle(&text("root", "fence closes friday")).await;

    let out = h.engine.handle(&action("root", "save")).await;
    assert!(mentions(&out, "Could not reach: Carol"));

    let sent = h.delivery.sent.lock().unwrap();
    let chats: Vec<i64> = sent.iter().map(|(c, _)| *c).collect();
    assert!(chats.contains(&11) && chats.contains(&22) && chats.contains(&99));
}

#[tokio::test]
async fn broadcast_to_one_member_with_attachment() {
    let h = harness(crew());
    h.engine.handle(&action("root", "admin")).await;
    h.engine.handle(&action("root", "send_bot_message")).await;
    h.engine.handle(&action("root", "bot_message_single")).await;
    h.engine.handle(&action("root", "bot_recipient:Ana")).await;

    h.engine.handle(&text("root", "see attached")).await;
    let ev = Event {
        conversation: chat_of("root"),
        username: Some("root".to_string()),
        kind: EventKind::Attachment {
            file_id: "file-1".to_string(),
            caption: Some("poster".to_string()),
        },
    };
    h.engine.handle(&ev).await;

    let out = h.engine.handle(&action("root", "save")).await;
    assert!(mentions(&out, texts::BROADCAST_SENT));

    let sent = h.delivery.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(chat, _)| *chat == 11));
    assert!(matches!(&sent[1].1, Chunk::Attachment { file_id, .. } if file_id == "file-1"));
}

#[tokio::test]
async fn view_lists_opens_and_exports_the_board() {
    let h = harness(crew());
    h.service
        .save_entry("Ana", "ghost", vec!["boo".into(), "bye".into()], None)
        .await
        .unwrap();

    let out = h.engine.handle(&action("ana", "view")).await;
    assert_eq!(first_text(&out), texts::BOARD_HEADER);
    assert!(choice_actions(&out).contains(&"view:ghost".to_string()));

    let out = h.engine.handle(&action("ana", "view:ghost")).await;
    assert!(mentions(&out, "boo"));
    assert!(mentions(&out, "bye"));
    assert!(mentions(&out, texts::BOARD_EOL));

    let out = h.engine.handle(&action("ana", "download_messages")).await;
    assert!(matches!(&out[0], Outgoing::Document { content, .. } if content.contains("ghost:")));

    // An empty board says so.
    let out = h.engine.handle(&action("boris", "view")).await;
    assert_eq!(first_text(&out), texts::EMPTY_BOARD);
}

#[tokio::test]
async fn non_text_input_is_rejected_in_text_states() {
    let h = harness(crew());
    h.engine.handle(&action("boris", "write")).await;
    h.engine.handle(&action("boris", "Ana")).await;

    let ev = Event {
        conversation: chat_of("boris"),
        username: Some("boris".to_string()),
        kind: EventKind::NonText,
    };
    let out = h.engine.handle(&ev).await;
    assert_eq!(first_text(&out), texts::NON_TEXT_INPUT);
    assert!(mentions(&out, texts::WRITE_ALIAS));
}

#[tokio::test]
async fn oversized_alias_reprompts_with_reason() {
    let h = harness(crew());
    h.engine.handle(&action("boris", "write")).await;
    h.engine.handle(&action("boris", "Ana")).await;

    let long = "x".repeat(65);
    let out = h.engine.handle(&text("boris", &long)).await;
    assert!(mentions(&out, "65 bytes"));
    assert!(mentions(&out, texts::WRITE_ALIAS));
}
