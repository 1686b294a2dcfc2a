//! Telegram update handlers.
//!
//! Each handler flattens a teloxide update into a core `Event`, runs it
//! through the engine, and renders the resulting `Outgoing` list back to the
//! chat. Delivery addresses are refreshed on every inbound update so
//! broadcasts can reach anyone who ever talked to the bot.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message},
};

use fences_core::{
    domain::ChatId,
    messaging::types::{Event, EventKind, Outgoing},
};

use crate::router::AppState;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let username = user.username.clone();

    // Events within one conversation are strictly sequential.
    let _guard = state.chat_locks.lock_chat(chat_id).await;

    note_delivery_address(&state, username.as_deref(), chat_id).await;

    let kind = if let Some(text) = msg.text() {
        match text.strip_prefix('/') {
            Some(cmd) => EventKind::Command(
                cmd.split_whitespace().next().unwrap_or_default().to_string(),
            ),
            None => EventKind::Text(text.to_string()),
        }
    } else if let Some(doc) = msg.document() {
        EventKind::Attachment {
            file_id: doc.file.id.clone(),
            caption: msg.caption().map(|c| c.to_string()),
        }
    } else if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        EventKind::Attachment {
            file_id: photo.file.id.clone(),
            caption: msg.caption().map(|c| c.to_string()),
        }
    } else {
        EventKind::NonText
    };

    let event = Event {
        conversation: ChatId(chat_id),
        username,
        kind,
    };
    let replies = state.engine.handle(&event).await;
    send_outgoings(&bot, msg.chat.id, replies).await
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    // Always answer the callback so the client stops its spinner.
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = &q.message else {
        return Ok(());
    };
    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    let chat_id = message.chat.id.0;
    let username = q.from.username.clone();

    let _guard = state.chat_locks.lock_chat(chat_id).await;

    note_delivery_address(&state, username.as_deref(), chat_id).await;

    let event = Event {
        conversation: ChatId(chat_id),
        username,
        kind: EventKind::Action(data),
    };
    let replies = state.engine.handle(&event).await;
    send_outgoings(&bot, message.chat.id, replies).await
}

async fn note_delivery_address(state: &AppState, username: Option<&str>, chat_id: i64) {
    let Some(username) = username else {
        return;
    };
    // Strangers produce MemberNotFound here; the gate deals with them next.
    let _ = state
        .service
        .update_delivery_address(username, ChatId(chat_id))
        .await;
}

async fn send_outgoings(
    bot: &Bot,
    chat: teloxide::types::ChatId,
    replies: Vec<Outgoing>,
) -> ResponseResult<()> {
    for reply in replies {
        match reply {
            Outgoing::Message { text, choices } if choices.is_empty() => {
                bot.send_message(chat, text).await?;
            }
            Outgoing::Message { text, choices } => {
                let rows: Vec<Vec<InlineKeyboardButton>> = choices
                    .into_iter()
                    .map(|c| vec![InlineKeyboardButton::callback(c.label, c.action)])
                    .collect();
                bot.send_message(chat, text)
                    .reply_markup(InlineKeyboardMarkup::new(rows))
                    .await?;
            }
            Outgoing::Document {
                name,
                content,
                caption,
            } => {
                let file = InputFile::memory(content.into_bytes()).file_name(name);
                let mut req = bot.send_document(chat, file);
                if let Some(caption) = caption {
                    req = req.caption(caption);
                }
                req.await?;
            }
        }
    }
    Ok(())
}
