//! Session management on top of the key-value cache
//!
//! A [`Session`] is the typed view of one request's session. Flows receive it
//! by `&mut` and the [`SessionManager`] persists whatever they do to it; the
//! HTTP layer then mirrors its [`SessionState`] onto the cookie.

use std::sync::Arc;

use common::cache::KeyValueCache;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::StoreError, models::SessionRecord};

const SESSION_PREFIX: &str = "sess:";

/// What happened to a session while handling the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing to tell the client
    #[default]
    Unchanged,
    /// A new session id was issued and must be sent to the client
    Established,
    /// The session is gone and the client's cookie must be cleared
    Destroyed,
}

/// Session bound to the current request
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    user_id: Option<i32>,
    state: SessionState,
}

impl Session {
    /// A session with no id and no authenticated user
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session named by a cookie value, not yet checked against the store
    ///
    /// Carries no user; only good for destroying the record it names.
    pub fn unverified(cookie: Option<&str>) -> Self {
        Self {
            id: cookie.map(str::to_owned),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Authenticated user, if any
    pub fn user_id(&self) -> Option<i32> {
        self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

fn session_key(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

/// Session manager for handling user sessions in the cache
#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn KeyValueCache>,
    ttl_seconds: u64,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Resolve the session named by a cookie value
    ///
    /// Unknown, expired or unreadable ids yield an anonymous session.
    pub async fn load(&self, cookie: Option<&str>) -> Result<Session, StoreError> {
        let Some(id) = cookie else {
            return Ok(Session::anonymous());
        };

        let Some(raw) = self.cache.get(&session_key(id)).await? else {
            return Ok(Session::anonymous());
        };

        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Ok(Session {
                id: Some(id.to_string()),
                user_id: Some(record.user_id),
                state: SessionState::Unchanged,
            }),
            Err(e) => {
                warn!("Discarding unreadable session record: {}", e);
                Ok(Session::anonymous())
            }
        }
    }

    /// Bind `session` to `user_id` under a freshly issued id
    ///
    /// Any record held under the previous id is dropped.
    pub async fn establish(&self, session: &mut Session, user_id: i32) -> Result<(), StoreError> {
        info!("Creating session for user: {}", user_id);

        if let Some(old) = session.id.take() {
            self.cache.delete(&session_key(&old)).await?;
        }

        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&SessionRecord { user_id })?;
        self.cache
            .set(&session_key(&id), &payload, Some(self.ttl_seconds))
            .await?;

        session.id = Some(id);
        session.user_id = Some(user_id);
        session.state = SessionState::Established;
        Ok(())
    }

    /// Delete the session record
    ///
    /// The session counts as destroyed even when the delete fails, so the
    /// client's cookie is always cleared.
    pub async fn destroy(&self, session: &mut Session) -> Result<(), StoreError> {
        let id = session.id.take();
        session.user_id = None;
        session.state = SessionState::Destroyed;

        if let Some(id) = id {
            info!("Deleting session {}", id);
            self.cache.delete(&session_key(&id)).await?;
        }

        Ok(())
    }
}
