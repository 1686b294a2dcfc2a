//! Reading your own fence: list senders, open one note, export everything.
//!
//! Pure reads; available even after expiration, which gates composing only.

use crate::{
    domain::Board,
    engine::Engine,
    messaging::types::{Choice, Event, Outgoing},
    texts, Result,
};

pub(crate) async fn handle(engine: &Engine, event: &Event, data: &str) -> Result<Vec<Outgoing>> {
    let username = event.sender();
    let board = engine.service.board_of(username).await?;

    if data == "view" {
        if board.entries.is_empty() {
            return Ok(vec![
                Outgoing::text(texts::EMPTY_BOARD),
                engine.main_menu(username).await,
            ]);
        }

        let mut choices: Vec<Choice> = board
            .entries
            .iter()
            .map(|e| Choice::new(e.alias.clone(), format!("view:{}", e.alias)))
            .collect();
        choices.push(Choice::new("📄 Get as a file", "download_messages"));
        choices.push(Choice::new("🔙 Main menu", "back"));
        return Ok(vec![Outgoing::with_choices(texts::BOARD_HEADER, choices)]);
    }

    if data == "download_messages" {
        return Ok(vec![Outgoing::Document {
            name: format!("fence-{username}.txt"),
            content: render_board(&board),
            caption: None,
        }]);
    }

    let alias = data.strip_prefix("view:").unwrap_or_default();
    let Some(entry) = board.entry(alias) else {
        return Ok(vec![
            Outgoing::text(texts::ENTRY_NOT_FOUND),
            engine.main_menu(username).await,
        ]);
    };

    let mut out: Vec<Outgoing> = entry
        .parts
        .iter()
        .map(|p| Outgoing::text(p.clone()))
        .collect();
    out.push(Outgoing::with_choices(
        format!("{} {}", texts::BOARD_EOL, alias),
        vec![Choice::new("🔙 Back to the list", "view")],
    ));
    Ok(out)
}

/// Plain-text export of a whole board, one block per sender alias.
fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for entry in &board.entries {
        out.push_str(&entry.alias);
        out.push_str(":\n");
        for part in &entry.parts {
            out.push(' ');
            out.push_str(part);
            out.push_str("\n\n");
        }
        out.push_str("____________\n");
    }
    out
}
