//! Password-reset tokens
//!
//! Each token maps to one user id, lives for [`RESET_TOKEN_TTL_SECONDS`] and
//! can be consumed once.

use std::sync::Arc;

use common::cache::KeyValueCache;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::RESET_TOKEN_TTL_SECONDS, error::StoreError};

const FORGET_PASSWORD_PREFIX: &str = "forget-password:";

fn token_key(token: &str) -> String {
    format!("{}{}", FORGET_PASSWORD_PREFIX, token)
}

#[derive(Clone)]
pub struct ResetTokens {
    cache: Arc<dyn KeyValueCache>,
}

impl ResetTokens {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Issue a fresh token for `user_id`
    pub async fn issue(&self, user_id: i32) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        self.cache
            .set(
                &token_key(&token),
                &user_id.to_string(),
                Some(RESET_TOKEN_TTL_SECONDS),
            )
            .await?;

        info!("Issued password reset token for user: {}", user_id);
        Ok(token)
    }

    /// Redeem a token, returning the user it was issued to
    ///
    /// The token is gone afterwards whether or not the caller goes on to use it.
    pub async fn consume(&self, token: &str) -> Result<Option<i32>, StoreError> {
        let Some(raw) = self.cache.take(&token_key(token)).await? else {
            return Ok(None);
        };

        match raw.parse() {
            Ok(user_id) => Ok(Some(user_id)),
            Err(e) => {
                warn!("Reset token held a non-numeric user id: {}", e);
                Ok(None)
            }
        }
    }
}
