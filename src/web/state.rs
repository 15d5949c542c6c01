use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::assessment::conversation::{Conversation, ConversationDriver};
use crate::shared::config::Config;
use crate::web::error::{ApiError, ApiResult};

pub type SharedConversation = Arc<Mutex<Conversation>>;

pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

struct SessionEntry {
    conversation: SharedConversation,
    last_active: Instant,
}

impl SessionEntry {
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.conversation) > 1
    }
}

/// One conversation per browser session. The map lock is held only for
/// lookups; a turn locks just its own conversation.
///
/// Sessions untouched for longer than the idle timeout are dropped on the
/// next `open` or `get`, unless a request is still holding them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub driver: ConversationDriver,
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(config: Arc<Config>, driver: ConversationDriver) -> Self {
        Self {
            config,
            driver,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub async fn open(&self) -> (Uuid, SharedConversation) {
        let conversation = Conversation::new();
        let id = conversation.id();
        let shared = Arc::new(Mutex::new(conversation));

        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        sessions.insert(
            id,
            SessionEntry {
                conversation: shared.clone(),
                last_active: Instant::now(),
            },
        );
        (id, shared)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<SharedConversation> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
        entry.last_active = Instant::now();
        Ok(entry.conversation.clone())
    }

    pub async fn close(&self, id: Uuid) -> ApiResult<()> {
        self.sessions
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionEntry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.in_use() || entry.last_active.elapsed() < self.idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
    }
}
