//! Admin flow: membership, roles, expiration, bot broadcasts.

use crate::{
    broadcast::BroadcastTarget,
    directory::RoleFilter,
    engine::{compose::validate_alias, Engine},
    errors::ErrorClass,
    messaging::types::{Choice, Chunk, Event, EventKind, Outgoing},
    session::{Session, State},
    texts, Result,
};

pub(crate) async fn handle(
    engine: &Engine,
    event: &Event,
    mut session: Session,
) -> Result<Vec<Outgoing>> {
    // Every admin action re-checks the role; a demoted admin's stale
    // keyboard must not mutate anything.
    if !engine.service.is_admin(event.sender()).await {
        return Ok(vec![Outgoing::text(texts::NOT_ADMIN)]);
    }

    // "admin" returns to the panel from anywhere in the flow, discarding
    // whatever scratch the abandoned sub-flow left behind.
    if matches!(&event.kind, EventKind::Action(d) if d == "admin") {
        return Ok(vec![panel(engine, event).await]);
    }

    match (session.state, &event.kind) {
        (State::ChoosingAction, EventKind::Action(d)) => match d.as_str() {
            "admin_add" => {
                session.state = State::AddingUsername;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::text(texts::ENTER_NEW_USERNAME)])
            }
            "admin_remove_member" => {
                session.state = State::RemovingUser;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::with_choices(
                    texts::CHOOSE_REMOVAL,
                    candidates(engine, RoleFilter::All, "rm_user:").await,
                )])
            }
            "add_root" => {
                session.state = State::SettingAdminOn;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::with_choices(
                    texts::CHOOSE_PROMOTION,
                    candidates(engine, RoleFilter::Member, "root_user:").await,
                )])
            }
            "delete_root" => {
                session.state = State::SettingAdminOff;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::with_choices(
                    texts::CHOOSE_DEMOTION,
                    candidates(engine, RoleFilter::Admin, "unroot_user:").await,
                )])
            }
            "set_datetime" => {
                session.state = State::SettingExpiration;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::text(texts::ENTER_EXPIRATION)])
            }
            "send_bot_message" => {
                session.state = State::ChoosingBroadcastScope;
                engine.sessions.put(event.conversation, session).await;
                Ok(vec![Outgoing::with_choices(
                    texts::BROADCAST_SCOPE,
                    vec![
                        Choice::new("Everyone", "bot_message_all"),
                        Choice::new("One member", "bot_message_single"),
                        Choice::new("🔙 Back", "admin"),
                    ],
                )])
            }
            "back" => {
                engine.sessions.clear(event.conversation).await;
                Ok(vec![engine.main_menu(event.sender()).await])
            }
            _ => Ok(vec![panel(engine, event).await]),
        },

        (State::AddingUsername, EventKind::Text(t)) => {
            let username = t.trim().trim_start_matches('@').to_string();
            if username.is_empty() {
                return Ok(vec![Outgoing::text(texts::ENTER_NEW_USERNAME)]);
            }
            session.scratch.new_username = Some(username);
            session.state = State::AddingLabel;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::text(texts::ENTER_NEW_LABEL)])
        }
        (State::AddingUsername, _) => Ok(vec![
            Outgoing::text(texts::NON_TEXT_INPUT),
            Outgoing::text(texts::ENTER_NEW_USERNAME),
        ]),

        (State::AddingLabel, EventKind::Text(t)) => add_member(engine, event, session, t).await,
        (State::AddingLabel, _) => Ok(vec![
            Outgoing::text(texts::NON_TEXT_INPUT),
            Outgoing::text(texts::ENTER_NEW_LABEL),
        ]),

        (State::RemovingUser, EventKind::Action(d)) if d.starts_with("rm_user:") => {
            let label = &d["rm_user:".len()..];
            engine.service.remove_member(label).await?;
            Ok(vec![
                Outgoing::text(format!("✅ {label} removed.")),
                panel(engine, event).await,
            ])
        }

        (State::SettingAdminOn, EventKind::Action(d)) if d.starts_with("root_user:") => {
            set_admin_flag(engine, event, &d["root_user:".len()..], true).await
        }
        (State::SettingAdminOff, EventKind::Action(d)) if d.starts_with("unroot_user:") => {
            set_admin_flag(engine, event, &d["unroot_user:".len()..], false).await
        }

        (State::SettingExpiration, EventKind::Text(t)) => {
            match engine.service.set_expiration(t).await {
                Ok(parsed) => {
                    Ok(vec![
                        Outgoing::text(format!("⏱ The fence now closes at {parsed}.")),
                        panel(engine, event).await,
                    ])
                }
                Err(e) if e.class() == ErrorClass::Validation => Ok(vec![
                    Outgoing::text(format!("⚠️ {e}")),
                    Outgoing::text(texts::ENTER_EXPIRATION),
                ]),
                Err(e) => Err(e),
            }
        }
        (State::SettingExpiration, _) => Ok(vec![
            Outgoing::text(texts::NON_TEXT_INPUT),
            Outgoing::text(texts::ENTER_EXPIRATION),
        ]),

        (State::ChoosingBroadcastScope, EventKind::Action(d)) if d == "bot_message_all" => {
            session.scratch.broadcast_target = Some(BroadcastTarget::All);
            session.state = State::ComposingBroadcast;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::text(texts::ENTER_BROADCAST)])
        }
        (State::ChoosingBroadcastScope, EventKind::Action(d)) if d == "bot_message_single" => {
            session.state = State::ChoosingBroadcastRecipient;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::CHOOSE_BROADCAST_RECIPIENT,
                candidates(engine, RoleFilter::All, "bot_recipient:").await,
            )])
        }

        (State::ChoosingBroadcastRecipient, EventKind::Action(d))
            if d.starts_with("bot_recipient:") =>
        {
            let label = d["bot_recipient:".len()..].to_string();
            session.scratch.broadcast_target = Some(BroadcastTarget::Label(label));
            session.state = State::ComposingBroadcast;
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::text(texts::ENTER_BROADCAST)])
        }

        (State::ComposingBroadcast, EventKind::Text(t)) => {
            session.scratch.broadcast_chunks.push(Chunk::Text(t.clone()));
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::ADDED_CHUNK,
                broadcast_choices(),
            )])
        }
        (State::ComposingBroadcast, EventKind::Attachment { file_id, caption }) => {
            session.scratch.broadcast_chunks.push(Chunk::Attachment {
                file_id: file_id.clone(),
                caption: caption.clone(),
            });
            engine.sessions.put(event.conversation, session).await;
            Ok(vec![Outgoing::with_choices(
                texts::ADDED_CHUNK,
                broadcast_choices(),
            )])
        }
        (State::ComposingBroadcast, EventKind::Action(d)) if d == "save" => {
            send_broadcast(engine, event, session).await
        }
        (State::ComposingBroadcast, EventKind::Action(d)) if d == "cancel" => {
            Ok(vec![panel(engine, event).await])
        }

        _ => Ok(vec![panel(engine, event).await]),
    }
}

/// Fresh panel; entering it discards any sub-flow scratch.
async fn panel(engine: &Engine, event: &Event) -> Outgoing {
    engine
        .sessions
        .put(event.conversation, admin_menu_session())
        .await;
    Outgoing::with_choices(texts::ADMIN_PANEL, panel_choices())
}

fn admin_menu_session() -> Session {
    Session {
        state: State::ChoosingAction,
        ..Session::default()
    }
}

fn panel_choices() -> Vec<Choice> {
    vec![
        Choice::new("➕ Add member", "admin_add"),
        Choice::new("➖ Remove member", "admin_remove_member"),
        Choice::new("👨‍🚀 Grant admin rights", "add_root"),
        Choice::new("🤐 Revoke admin rights", "delete_root"),
        Choice::new("⏱ Change closing time", "set_datetime"),
        Choice::new("📢 Send a bot message", "send_bot_message"),
        Choice::new("🔙 Back", "back"),
    ]
}

fn broadcast_choices() -> Vec<Choice> {
    vec![
        Choice::new("💾 Save", "save"),
        Choice::new("🔙 Cancel everything", "cancel"),
    ]
}

async fn candidates(engine: &Engine, role: RoleFilter, prefix: &str) -> Vec<Choice> {
    let mut choices: Vec<Choice> = engine
        .service
        .labels(role)
        .await
        .into_iter()
        .map(|label| {
            let action = format!("{prefix}{label}");
            Choice::new(label, action)
        })
        .collect();
    choices.push(Choice::new("🔙 Back", "admin"));
    choices
}

async fn add_member(
    engine: &Engine,
    event: &Event,
    session: Session,
    raw_label: &str,
) -> Result<Vec<Outgoing>> {
    // Labels obey the same byte budget as aliases.
    let label = match validate_alias(raw_label, engine.alias_byte_limit) {
        Ok(label) => label,
        Err(e) => {
            return Ok(vec![
                Outgoing::text(format!("⚠️ {e}")),
                Outgoing::text(texts::ENTER_NEW_LABEL),
            ]);
        }
    };

    let username = session.scratch.new_username.clone().unwrap_or_default();
    match engine.service.add_member(&username, &label, false).await {
        Ok(()) => Ok(vec![
            Outgoing::text(format!("✅ @{username} added as {label}.")),
            panel(engine, event).await,
        ]),
        // Collisions re-prompt the label step, keeping the username.
        Err(e) if e.class() == ErrorClass::Conflict => Ok(vec![
            Outgoing::text(format!("⚠️ {e}")),
            Outgoing::text(texts::ENTER_NEW_LABEL),
        ]),
        Err(e) => Err(e),
    }
}

async fn set_admin_flag(
    engine: &Engine,
    event: &Event,
    label: &str,
    is_admin: bool,
) -> Result<Vec<Outgoing>> {
    match engine.service.set_admin_flag(label, is_admin).await {
        Ok(()) => {
            let verb = if is_admin { "now an admin" } else { "no longer an admin" };
            Ok(vec![
                Outgoing::text(format!("✅ {label} is {verb}.")),
                panel(engine, event).await,
            ])
        }
        Err(e) if e.class() == ErrorClass::NotFound => Ok(vec![
            Outgoing::text(format!("⚠️ {e}")),
            panel(engine, event).await,
        ]),
        Err(e) => Err(e),
    }
}

async fn send_broadcast(
    engine: &Engine,
    event: &Event,
    session: Session,
) -> Result<Vec<Outgoing>> {
    if session.scratch.broadcast_chunks.is_empty() {
        return Ok(vec![
            Outgoing::text(texts::EMPTY_MESSAGE),
            Outgoing::with_choices(texts::ENTER_BROADCAST, broadcast_choices()),
        ]);
    }

    let target = session
        .scratch
        .broadcast_target
        .clone()
        .unwrap_or(BroadcastTarget::All);
    let report = engine
        .dispatcher
        .dispatch(&target, &session.scratch.broadcast_chunks)
        .await;

    let summary = if report.overall_success() {
        texts::BROADCAST_SENT.to_string()
    } else {
        format!("⚠️ Could not reach: {}", report.failed.join(", "))
    };

    Ok(vec![Outgoing::text(summary), panel(engine, event).await])
}
