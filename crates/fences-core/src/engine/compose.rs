//! The "write a note" flow: recipient → alias → chunks → commit.

use crate::{
    engine::Engine,
    errors::{Error, ErrorClass},
    messaging::types::{Choice, Event, EventKind, Outgoing},
    session::{Session, State},
    texts, Result,
};

pub(crate) async fn handle(
    engine: &Engine,
    event: &Event,
    mut session: Session,
) -> Result<Vec<Outgoing>> {
    match (session.state, &event.kind) {
        (State::Idle, EventKind::Action(d)) if d == "write" => enter(engine, event).await,
        (State::Idle, EventKind::Action(d)) if d == "back" => {
            Ok(vec![engine.main_menu(event.sender()).await])
        }

        (State::ChoosingRecipient, EventKind::Action(d)) => {
            if d == "back" {
                engine.sessions.clear(event.conversation).await;
                return Ok(vec![engine.main_menu(event.sender()).await]);
            }
            if engine.service.load().await.find_by_label(d).is_none() {
                // Stale keyboard: the member is gone, back to the menu.
                engine.sessions.clear(event.conversation).await;
                return Ok(vec![
                    Outgoing::text(texts::UNKNOWN_RECIPIENT),
                    engine.main_menu(event.sender()).await,
                ]);
            }
            session.scratch.recipient = Some(d.clone());
            session.state = State::EnteringAlias;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::WRITE_ALIAS,
                alias_choices(),
            )])
        }

        (State::EnteringAlias, EventKind::Action(d)) if d == "back" => {
            session.state = State::ChoosingRecipient;
            session.scratch.recipient = None;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![recipient_prompt(engine).await])
        }
        (State::EnteringAlias, EventKind::Action(d)) if d == "use_label" => {
            // Shortcut: sign with your own directory label.
            let Some(label) = engine.service.label_of(event.sender()).await else {
                engine.sessions.clear(event.conversation).await;
                return Ok(vec![
                    Outgoing::text(texts::GENERIC_FAILURE),
                    engine.main_menu(event.sender()).await,
                ]);
            };
            accept_alias(engine, event, session, &label).await
        }
        (State::EnteringAlias, EventKind::Text(t)) => {
            accept_alias(engine, event, session, t).await
        }
        (State::EnteringAlias, _) => Ok(vec![
            Outgoing::text(texts::NON_TEXT_INPUT),
            Outgoing::with_choices(texts::WRITE_ALIAS, alias_choices()),
        ]),

        (State::TypingMessage, EventKind::Text(t)) => {
            session.scratch.chunks.push(t.clone());
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::ADDED_CHUNK,
                message_choices(),
            )])
        }
        (State::TypingMessage, EventKind::Action(d)) if d == "save" => {
            commit(engine, event, session).await
        }
        (State::TypingMessage, EventKind::Action(d)) if d == "cancel" => {
            // Transient confirmation overlay; the state stays TypingMessage
            // and the accumulated chunks stay in scratch.
            Ok(vec![Outgoing::with_choices(
                texts::CONFIRM_CANCEL,
                confirm_cancel_choices(),
            )])
        }
        (State::TypingMessage, EventKind::Action(d)) if d == "try_cancel" => {
            engine.sessions.clear(event.conversation).await;
            Ok(vec![engine.main_menu(event.sender()).await])
        }
        (State::TypingMessage, EventKind::Action(d)) if d == "collect_msg" => {
            Ok(vec![Outgoing::with_choices(
                texts::ENTER_MESSAGE,
                message_choices(),
            )])
        }
        (State::TypingMessage, EventKind::Action(d)) if d == "back" => {
            session.state = State::EnteringAlias;
            session.scratch.alias = None;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::WRITE_ALIAS,
                alias_choices(),
            )])
        }
        (State::TypingMessage, _) => Ok(vec![
            Outgoing::text(texts::NON_TEXT_INPUT),
            Outgoing::with_choices(texts::ENTER_MESSAGE, message_choices()),
        ]),

        _ => Ok(vec![
            Outgoing::text(texts::FALLBACK),
            engine.main_menu(event.sender()).await,
        ]),
    }
}

/// Entry guard: a set expired flag refuses the flow before any state change.
async fn enter(engine: &Engine, event: &Event) -> Result<Vec<Outgoing>> {
    if engine.expired.load(std::sync::atomic::Ordering::SeqCst) {
        return Ok(vec![
            Outgoing::text(texts::EXPIRED_NOTICE),
            engine.main_menu(event.sender()).await,
        ]);
    }

    let session = Session {
        state: State::ChoosingRecipient,
        ..Session::default()
    };
    engine.sessions.put(event.conversation, session).await;
    Ok(vec![recipient_prompt(engine).await])
}

async fn recipient_prompt(engine: &Engine) -> Outgoing {
    let labels = engine
        .service
        .labels(crate::directory::RoleFilter::All)
        .await;
    let mut choices: Vec<Choice> = labels
        .into_iter()
        .map(|l| Choice::new(l.clone(), l))
        .collect();
    choices.push(Choice::new("🔙 Back", "back"));
    Outgoing::with_choices(texts::SELECT_RECIPIENT, choices)
}

async fn accept_alias(
    engine: &Engine,
    event: &Event,
    mut session: Session,
    raw: &str,
) -> Result<Vec<Outgoing>> {
    let alias = match validate_alias(raw, engine.alias_byte_limit) {
        Ok(alias) => alias,
        Err(e) => {
            return Ok(vec![
                Outgoing::text(format!("⚠️ {e}")),
                Outgoing::with_choices(texts::WRITE_ALIAS, alias_choices()),
            ]);
        }
    };

    // Per-recipient uniqueness: the alias must be free on the chosen board.
    let recipient = session.scratch.recipient.clone().unwrap_or_default();
    let directory = engine.service.load().await;
    let Some(username) = directory.find_by_label(&recipient).map(|m| m.username.clone()) else {
        engine.sessions.clear(event.conversation).await;
        return Ok(vec![
            Outgoing::text(texts::UNKNOWN_RECIPIENT),
            engine.main_menu(event.sender()).await,
        ]);
    };
    if engine.service.board_of(&username).await?.has_alias(&alias) {
        let e = Error::DuplicateAlias(alias);
        return Ok(vec![
            Outgoing::text(format!("⚠️ {e}")),
            Outgoing::with_choices(texts::WRITE_ALIAS, alias_choices()),
        ]);
    }

    session.scratch.alias = Some(alias);
    session.state = State::TypingMessage;
    engine.sessions.put(event.conversation, session).await;
    Ok(vec![Outgoing::with_choices(
        texts::ENTER_MESSAGE,
        message_choices(),
    )])
}

async fn commit(engine: &Engine, event: &Event, session: Session) -> Result<Vec<Outgoing>> {
    if session.scratch.chunks.is_empty() {
        return Ok(vec![
            Outgoing::text(texts::EMPTY_MESSAGE),
            Outgoing::with_choices(texts::ENTER_MESSAGE, message_choices()),
        ]);
    }

    let recipient = session.scratch.recipient.clone().unwrap_or_default();
    let alias = session.scratch.alias.clone().unwrap_or_default();
    let saved = engine
        .service
        .save_entry(
            &recipient,
            &alias,
            session.scratch.chunks.clone(),
            Some(event.sender()),
        )
        .await;

    match saved {
        Ok(()) => {
            engine.sessions.clear(event.conversation).await;
            Ok(vec![
                Outgoing::text(texts::MESSAGE_SAVED),
                engine.main_menu(event.sender()).await,
            ])
        }
        // Someone took the alias while this note was being typed.
        Err(e) if e.class() == ErrorClass::Conflict => {
            let mut session = session;
            session.state = State::EnteringAlias;
            session.scratch.alias = None;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![
                Outgoing::text(format!("⚠️ {e}")),
                Outgoing::with_choices(texts::WRITE_ALIAS, alias_choices()),
            ])
        }
        Err(e) if e.class() == ErrorClass::NotFound => {
            engine.sessions.clear(event.conversation).await;
            Ok(vec![
                Outgoing::text(texts::UNKNOWN_RECIPIENT),
                engine.main_menu(event.sender()).await,
            ])
        }
        Err(e) => Err(e),
    }
}

/// Trims and validates an alias against the UTF-8 byte budget.
pub(crate) fn validate_alias(raw: &str, limit: usize) -> Result<String> {
    let alias = raw.trim();
    if alias.is_empty() {
        return Err(Error::NonTextInput);
    }
    if alias.chars().any(|c| c.is_control()) {
        return Err(Error::InvalidCharacters);
    }
    let got = alias.len();
    if got > limit {
        return Err(Error::AliasTooLong { got, limit });
    }
    Ok(alias.to_string())
}

fn alias_choices() -> Vec<Choice> {
    vec![
        Choice::new("👤 As in the list", "use_label"),
        Choice::new("🔙 Back", "back"),
    ]
}

fn message_choices() -> Vec<Choice> {
    vec![
        Choice::new("💾 Save", "save"),
        Choice::new("🔙 Cancel everything", "cancel"),
    ]
}

fn confirm_cancel_choices() -> Vec<Choice> {
    vec![
        Choice::new("Save and leave", "save"),
        Choice::new("Leave without saving", "try_cancel"),
        Choice::new("Go back and add more", "collect_msg"),
    ]
}
