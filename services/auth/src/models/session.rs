//! Session record stored in the cache

use serde::{Deserialize, Serialize};

/// Server-side state bound to a session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: i32,
}
