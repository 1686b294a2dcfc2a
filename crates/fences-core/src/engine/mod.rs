//! Finite-state dialogue orchestration.
//!
//! One `Engine` instance serves every conversation; per-conversation state
//! lives in the `SessionStore`. Transitions are synchronous between store
//! suspensions, and the transport serializes events per conversation, so a
//! step never races with itself.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::warn;

use crate::{
    broadcast::BroadcastDispatcher,
    directory::DirectoryService,
    gate::AccessGate,
    messaging::types::{Choice, Event, EventKind, Outgoing},
    session::{Session, SessionStore},
    texts, Result,
};

mod admin;
mod compose;
mod view;

pub struct Engine {
    pub(crate) service: Arc<DirectoryService>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) dispatcher: BroadcastDispatcher,
    pub(crate) expired: Arc<AtomicBool>,
    pub(crate) alias_byte_limit: usize,
    gate: AccessGate,
}

impl Engine {
    pub fn new(
        service: Arc<DirectoryService>,
        sessions: Arc<SessionStore>,
        dispatcher: BroadcastDispatcher,
        expired: Arc<AtomicBool>,
        alias_byte_limit: usize,
    ) -> Self {
        let gate = AccessGate::new(service.clone());
        Self {
            service,
            sessions,
            dispatcher,
            expired,
            alias_byte_limit,
            gate,
        }
    }

    /// Runs one inbound event through the gate and the state machines and
    /// returns everything to send back.
    pub async fn handle(&self, event: &Event) -> Vec<Outgoing> {
        if !self.gate.allows(event).await {
            return vec![Outgoing::text(texts::ACCESS_DENIED)];
        }

        let session = self.sessions.snapshot(event.conversation).await;
        match self.route(event, session).await {
            Ok(out) => out,
            Err(e) => {
                // Store-class failures are not recoverable in-flow: drop the
                // session and restart from the top-level menu.
                warn!(sender = %event.sender(), "dialogue step failed: {e}");
                self.sessions.clear(event.conversation).await;
                vec![
                    Outgoing::text(texts::GENERIC_FAILURE),
                    self.main_menu(event.sender()).await,
                ]
            }
        }
    }

    async fn route(&self, event: &Event, session: Session) -> Result<Vec<Outgoing>> {
        if let EventKind::Command(name) = &event.kind {
            self.sessions.clear(event.conversation).await;
            if name != "start" {
                return Ok(vec![
                    Outgoing::text(texts::FALLBACK),
                    self.main_menu(event.sender()).await,
                ]);
            }
            return Ok(vec![self.main_menu(event.sender()).await]);
        }

        let to_admin = matches!(&event.kind, EventKind::Action(d) if d == "admin");
        if to_admin || session.state.is_admin_flow() {
            return admin::handle(self, event, session).await;
        }

        if let EventKind::Action(data) = &event.kind {
            if data == "view" || data == "download_messages" || data.starts_with("view:") {
                return view::handle(self, event, data).await;
            }
        }

        compose::handle(self, event, session).await
    }

    /// Top-level menu: writing is hidden while expired, management is shown
    /// to admins only.
    pub(crate) async fn main_menu(&self, username: &str) -> Outgoing {
        let mut choices = Vec::new();
        if !self.expired.load(Ordering::SeqCst) {
            choices.push(Choice::new("✏️ Write on a fence", "write"));
        }
        choices.push(Choice::new("📬 View your fence", "view"));
        if self.service.is_admin(username).await {
            choices.push(Choice::new("⚙ Manage", "admin"));
        }
        Outgoing::with_choices(texts::MAIN_MENU, choices)
    }
}

#[cfg(test)]
mod tests;
