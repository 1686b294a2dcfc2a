use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::{broadcast::BroadcastTarget, domain::ChatId, messaging::types::Chunk};

/// How long an untouched session survives before the sweeper evicts it.
/// Abandoned conversations never signal completion, they just go quiet.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Dialogue position of one conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,

    // Compose flow
    ChoosingRecipient,
    EnteringAlias,
    TypingMessage,

    // Admin flow
    ChoosingAction,
    AddingUsername,
    AddingLabel,
    RemovingUser,
    SettingAdminOn,
    SettingAdminOff,
    SettingExpiration,
    ChoosingBroadcastScope,
    ChoosingBroadcastRecipient,
    ComposingBroadcast,
}

impl State {
    pub fn is_admin_flow(self) -> bool {
        !matches!(
            self,
            State::Idle | State::ChoosingRecipient | State::EnteringAlias | State::TypingMessage
        )
    }
}

/// Step-to-step scratch data; cleared with the session.
#[derive(Clone, Debug, Default)]
pub struct Scratch {
    pub recipient: Option<String>,
    pub alias: Option<String>,
    pub chunks: Vec<String>,

    pub new_username: Option<String>,
    pub broadcast_target: Option<BroadcastTarget>,
    pub broadcast_chunks: Vec<Chunk>,
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    pub state: State,
    pub scratch: Scratch,
}

struct Slot {
    session: Session,
    touched: Instant,
}

/// Explicit in-process session store, keyed by conversation id.
///
/// The transport serializes events per conversation, so snapshot-mutate-put
/// never races with itself; distinct conversations are independent.
pub struct SessionStore {
    inner: Mutex<HashMap<i64, Slot>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Current session for the conversation, or a fresh idle one.
    pub async fn snapshot(&self, conversation: ChatId) -> Session {
        self.inner
            .lock()
            .await
            .get(&conversation.0)
            .map(|slot| slot.session.clone())
            .unwrap_or_default()
    }

    pub async fn put(&self, conversation: ChatId, session: Session) {
        self.inner.lock().await.insert(
            conversation.0,
            Slot {
                session,
                touched: Instant::now(),
            },
        );
    }

    pub async fn clear(&self, conversation: ChatId) {
        self.inner.lock().await.remove(&conversation.0);
    }

    /// Drops sessions idle beyond the TTL; returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        let now = Instant::now();
        map.retain(|_, slot| now.duration_since(slot.touched) < self.ttl);
        before - map.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
