//! Authentication flows
//!
//! [`AuthService`] owns no request state. Every flow that reads or changes
//! the caller's login state takes the request's [`Session`] by reference.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    error::{AuthError, AuthResult},
    mailer::Mailer,
    models::{NewUser, RegisterInput, User},
    password::{hash_password, verify_password},
    repositories::{CreateUserError, UserStore},
    session::{Session, SessionManager},
    tokens::ResetTokens,
    validation::{validate_password, validate_register},
};

/// Registration, login and password recovery
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use auth::{
///     mailer::LogMailer, models::RegisterInput, repositories::MemoryUserStore,
///     service::AuthService, session::{Session, SessionManager}, tokens::ResetTokens,
/// };
/// use common::cache::MemoryCache;
///
/// let cache = Arc::new(MemoryCache::new());
/// let svc = AuthService::new(
///     Arc::new(MemoryUserStore::new()),
///     SessionManager::new(cache.clone(), 3600),
///     ResetTokens::new(cache),
///     Arc::new(LogMailer),
///     "http://localhost:3000",
/// );
///
/// let mut session = Session::anonymous();
/// let input = RegisterInput::new("alice", "a@x.com", "secret1");
/// let user = tokio_test::block_on(svc.register(&mut session, input)).unwrap();
/// assert_eq!(session.user_id(), Some(user.id));
/// ```
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
    tokens: ResetTokens,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: SessionManager,
        tokens: ResetTokens,
        mailer: Arc<dyn Mailer>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Create an account and log the caller into it
    #[instrument(skip(self, session, input), fields(username = %input.username))]
    pub async fn register(&self, session: &mut Session, input: RegisterInput) -> AuthResult<User> {
        if let Some(errors) = validate_register(&input) {
            return Err(AuthError::Invalid(errors));
        }

        let password_hash = hash_password(&input.password).await?;
        let new_user = NewUser {
            username: input.username,
            email: input.email,
            password_hash,
        };

        // duplicates are detected by the insert, not by a lookup beforehand
        let user = match self.users.create(&new_user).await {
            Ok(user) => user,
            Err(CreateUserError::Conflict) => {
                return Err(AuthError::field_error(
                    "username",
                    "username is already taken",
                ));
            }
            Err(CreateUserError::Store(e)) => return Err(e.into()),
        };

        self.sessions.establish(session, user.id).await?;
        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Log in by username, or by email when the identifier contains "@"
    #[instrument(skip(self, session, password))]
    pub async fn login(
        &self,
        session: &mut Session,
        username_or_email: &str,
        password: &str,
    ) -> AuthResult<User> {
        let user = if username_or_email.contains('@') {
            self.users.find_by_email(username_or_email).await?
        } else {
            self.users.find_by_username(username_or_email).await?
        };

        let Some(user) = user else {
            return Err(AuthError::field_error(
                "usernameOrEmail",
                "username does not exist",
            ));
        };

        if !verify_password(&user.password, password).await? {
            return Err(AuthError::field_error("password", "incorrect password"));
        }

        self.sessions.establish(session, user.id).await?;
        info!(user_id = user.id, "User logged in");
        Ok(user)
    }

    /// End the session; `false` only when the stored record could not be removed
    #[instrument(skip(self, session))]
    pub async fn logout(&self, session: &mut Session) -> bool {
        match self.sessions.destroy(session).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to destroy session: {}", e);
                false
            }
        }
    }

    /// The logged-in user, or `None` for anonymous sessions and deleted users
    pub async fn me(&self, session: &Session) -> AuthResult<Option<User>> {
        let Some(user_id) = session.user_id() else {
            return Ok(None);
        };

        Ok(self.users.find_by_id(user_id).await?)
    }

    /// Email a recovery link if the address belongs to a user
    ///
    /// Answers `true` either way so the endpoint cannot be used to probe for
    /// accounts. Delivery is best-effort.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> AuthResult<bool> {
        let Some(user) = self.users.find_by_email(email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(true);
        };

        let token = self.tokens.issue(user.id).await?;
        let link = format!(
            "{}/change-password/{}",
            self.frontend_url.trim_end_matches('/'),
            token
        );
        let html = format!(r#"<a href="{}">reset password</a>"#, link);

        if let Err(e) = self.mailer.send(&user.email, "Change password", &html).await {
            warn!(user_id = user.id, "Failed to send password reset email: {}", e);
        }

        Ok(true)
    }

    /// Set a new password using a reset token, then log the user in
    #[instrument(skip(self, session, token, new_password))]
    pub async fn change_password(
        &self,
        session: &mut Session,
        token: &str,
        new_password: &str,
    ) -> AuthResult<User> {
        if let Err(error) = validate_password(new_password, "newPassword") {
            return Err(AuthError::Invalid(vec![error]));
        }

        // taking the token is what makes it single-use
        let Some(user_id) = self.tokens.consume(token).await? else {
            return Err(AuthError::field_error("token", "token expired"));
        };

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::field_error("token", "user no longer exists"));
        }

        let password_hash = hash_password(new_password).await?;
        let Some(user) = self.users.update_password(user_id, &password_hash).await? else {
            return Err(AuthError::field_error("token", "user no longer exists"));
        };

        self.sessions.establish(session, user.id).await?;
        info!(user_id = user.id, "Password changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        mailer::RecordingMailer,
        repositories::MemoryUserStore,
        session::SessionState,
    };
    use async_trait::async_trait;
    use common::{
        cache::{KeyValueCache, MemoryCache},
        error::{CacheError, CacheResult},
    };

    struct Fixture {
        service: AuthService,
        users: MemoryUserStore,
        mailer: RecordingMailer,
        cache: MemoryCache,
    }

    fn fixture_with(mailer: RecordingMailer) -> Fixture {
        let cache = MemoryCache::new();
        let users = MemoryUserStore::new();
        let service = AuthService::new(
            Arc::new(users.clone()),
            SessionManager::new(Arc::new(cache.clone()), 3600),
            ResetTokens::new(Arc::new(cache.clone())),
            Arc::new(mailer.clone()),
            "http://localhost:3000",
        );
        Fixture {
            service,
            users,
            mailer,
            cache,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingMailer::new())
    }

    impl Fixture {
        async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<User> {
            let mut session = Session::anonymous();
            self.service
                .register(&mut session, RegisterInput::new(username, email, password))
                .await
        }

        /// Simulate the next request carrying the same cookie
        async fn reload(&self, session: &Session) -> Session {
            self.service.sessions().load(session.id()).await.unwrap()
        }

        async fn last_token(&self) -> String {
            let sent = self.mailer.sent().await;
            let html = &sent.last().expect("no mail sent").html;
            let start = html.find("/change-password/").unwrap() + "/change-password/".len();
            let end = html[start..].find('"').unwrap() + start;
            html[start..end].to_string()
        }
    }

    /// Cache that is always unreachable
    struct DownCache;

    fn down() -> CacheError {
        CacheError::Connection(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    #[async_trait]
    impl KeyValueCache for DownCache {
        async fn set(&self, _: &str, _: &str, _: Option<u64>) -> CacheResult<()> {
            Err(down())
        }
        async fn get(&self, _: &str) -> CacheResult<Option<String>> {
            Err(down())
        }
        async fn delete(&self, _: &str) -> CacheResult<()> {
            Err(down())
        }
        async fn take(&self, _: &str) -> CacheResult<Option<String>> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn test_register_establishes_session() {
        let fx = fixture();
        let mut session = Session::anonymous();
        let user = fx
            .service
            .register(&mut session, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Established);
        assert_eq!(session.user_id(), Some(user.id));
        assert_ne!(user.password, "secret1");

        let next = fx.reload(&session).await;
        assert_eq!(fx.service.me(&next).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_register_validation_leaves_storage_untouched() {
        let fx = fixture();
        let mut session = Session::anonymous();
        let err = fx
            .service
            .register(&mut session, RegisterInput::new("al", "a@x.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("username"));
        assert_eq!(session.state(), SessionState::Unchanged);
        assert!(fx.users.find_by_username("al").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_passwords_rejected_on_register() {
        let fx = fixture();
        for password in ["", "abc"] {
            let err = fx.register("alice", "a@x.com", password).await.unwrap_err();
            assert_eq!(err.field(), Some("password"));
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_keeps_first_session() {
        let fx = fixture();
        let mut first = Session::anonymous();
        let alice = fx
            .service
            .register(&mut first, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap();

        let mut second = Session::anonymous();
        let err = fx
            .service
            .register(&mut second, RegisterInput::new("alice", "other@x.com", "secret2"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("username"));
        assert_eq!(second.state(), SessionState::Unchanged);

        let next = fx.reload(&first).await;
        assert_eq!(fx.service.me(&next).await.unwrap().map(|u| u.id), Some(alice.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_reported_on_username() {
        let fx = fixture();
        fx.register("alice", "a@x.com", "secret1").await.unwrap();
        let err = fx.register("alicia", "a@x.com", "secret1").await.unwrap_err();
        assert_eq!(err.field(), Some("username"));
    }

    #[tokio::test]
    async fn test_login_by_username_then_me() {
        let fx = fixture();
        let alice = fx.register("alice", "a@x.com", "secret1").await.unwrap();

        let mut session = Session::anonymous();
        let user = fx.service.login(&mut session, "alice", "secret1").await.unwrap();
        assert_eq!(user.id, alice.id);

        let next = fx.reload(&session).await;
        assert_eq!(fx.service.me(&next).await.unwrap().map(|u| u.id), Some(alice.id));
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let fx = fixture();
        let alice = fx.register("alice", "a@x.com", "secret1").await.unwrap();

        let mut session = Session::anonymous();
        let user = fx.service.login(&mut session, "a@x.com", "secret1").await.unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_field_scoped() {
        let fx = fixture();
        fx.register("alice", "a@x.com", "secret1").await.unwrap();

        let mut session = Session::anonymous();
        let err = fx.service.login(&mut session, "bob", "secret1").await.unwrap_err();
        assert_eq!(err.field(), Some("usernameOrEmail"));

        let err = fx.service.login(&mut session, "b@x.com", "secret1").await.unwrap_err();
        assert_eq!(err.field(), Some("usernameOrEmail"));

        let err = fx.service.login(&mut session, "alice", "wrong").await.unwrap_err();
        assert_eq!(err.field(), Some("password"));
        assert_eq!(session.state(), SessionState::Unchanged);
    }

    #[tokio::test]
    async fn test_logout_then_me_is_none() {
        let fx = fixture();
        let mut session = Session::anonymous();
        fx.service
            .register(&mut session, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let cookie = session.id().map(str::to_owned);

        let mut current = fx.reload(&session).await;
        assert!(fx.service.logout(&mut current).await);
        assert_eq!(current.state(), SessionState::Destroyed);
        assert_eq!(fx.service.me(&current).await.unwrap(), None);

        // the old cookie no longer resolves either
        let stale = fx.service.sessions().load(cookie.as_deref()).await.unwrap();
        assert_eq!(fx.service.me(&stale).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_without_session_succeeds() {
        let fx = fixture();
        let mut session = Session::anonymous();
        assert!(fx.service.logout(&mut session).await);
        assert_eq!(session.state(), SessionState::Destroyed);
    }

    #[tokio::test]
    async fn test_logout_reports_destroy_failure_but_clears_session() {
        let cache: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());
        let sessions = SessionManager::new(cache.clone(), 3600);
        let mut session = Session::anonymous();
        sessions.establish(&mut session, 1).await.unwrap();

        let service = AuthService::new(
            Arc::new(MemoryUserStore::new()),
            SessionManager::new(Arc::new(DownCache), 3600),
            ResetTokens::new(cache),
            Arc::new(RecordingMailer::new()),
            "http://localhost:3000",
        );

        assert!(!service.logout(&mut session).await);
        assert_eq!(session.state(), SessionState::Destroyed);
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn test_me_for_deleted_user_is_none() {
        let fx = fixture();
        let mut session = Session::anonymous();
        let user = fx
            .service
            .register(&mut session, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        fx.users.remove(user.id).await;

        assert_eq!(fx.service.me(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_silent() {
        let fx = fixture();
        assert!(fx.service.forgot_password("nobody@x.com").await.unwrap());
        assert!(fx.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_forgot_password_mails_recovery_link() {
        let fx = fixture();
        fx.register("alice", "a@x.com", "secret1").await.unwrap();

        assert!(fx.service.forgot_password("a@x.com").await.unwrap());

        let sent = fx.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert!(sent[0]
            .html
            .contains("http://localhost:3000/change-password/"));
    }

    #[tokio::test]
    async fn test_forgot_password_survives_mail_failure() {
        let fx = fixture_with(RecordingMailer::rejecting());
        fx.register("alice", "a@x.com", "secret1").await.unwrap();
        assert!(fx.service.forgot_password("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_change_password_token_is_single_use() {
        let fx = fixture();
        fx.register("alice", "a@x.com", "secret1").await.unwrap();
        fx.service.forgot_password("a@x.com").await.unwrap();
        let token = fx.last_token().await;

        let mut session = Session::anonymous();
        let user = fx
            .service
            .change_password(&mut session, &token, "newpass1")
            .await
            .unwrap();
        assert_eq!(session.user_id(), Some(user.id));
        assert_eq!(session.state(), SessionState::Established);

        let mut again = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut again, &token, "newpass2")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));
        assert_eq!(again.state(), SessionState::Unchanged);
    }

    #[tokio::test]
    async fn test_change_password_with_unissued_token() {
        let fx = fixture();
        let mut session = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut session, "made-up", "newpass1")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));
    }

    #[tokio::test]
    async fn test_change_password_with_expired_token() {
        let fx = fixture();
        let user = fx.register("alice", "a@x.com", "secret1").await.unwrap();
        fx.cache
            .set("forget-password:stale", &user.id.to_string(), Some(0))
            .await
            .unwrap();

        let mut session = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut session, "stale", "newpass1")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));
        assert_eq!(session.state(), SessionState::Unchanged);
    }

    #[tokio::test]
    async fn test_change_password_short_password_keeps_token() {
        let fx = fixture();
        fx.register("alice", "a@x.com", "secret1").await.unwrap();
        fx.service.forgot_password("a@x.com").await.unwrap();
        let token = fx.last_token().await;

        let mut session = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut session, &token, "abc")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("newPassword"));

        // the rejected attempt did not burn the token
        fx.service
            .change_password(&mut session, &token, "abcd")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_password_for_deleted_user() {
        let fx = fixture();
        let user = fx.register("alice", "a@x.com", "secret1").await.unwrap();
        fx.service.forgot_password("a@x.com").await.unwrap();
        let token = fx.last_token().await;
        fx.users.remove(user.id).await;

        let mut session = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut session, &token, "newpass1")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));
        assert_eq!(session.state(), SessionState::Unchanged);
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let service = AuthService::new(
            Arc::new(MemoryUserStore::new()),
            SessionManager::new(Arc::new(DownCache), 3600),
            ResetTokens::new(Arc::new(DownCache)),
            Arc::new(RecordingMailer::new()),
            "http://localhost:3000",
        );

        let mut session = Session::anonymous();
        let err = service
            .register(&mut session, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::Cache(_))));
        assert_eq!(err.field(), None);

        let err = service
            .change_password(&mut session, "any", "newpass1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn test_alice_scenario() {
        let fx = fixture();

        let mut session = Session::anonymous();
        let alice = fx
            .service
            .register(&mut session, RegisterInput::new("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(session.user_id(), Some(alice.id));

        let mut other = Session::anonymous();
        let err = fx.service.login(&mut other, "alice", "wrong").await.unwrap_err();
        assert_eq!(err.field(), Some("password"));

        assert!(fx.service.forgot_password("a@x.com").await.unwrap());
        let token = fx.last_token().await;

        let updated = fx
            .service
            .change_password(&mut other, &token, "newpass1")
            .await
            .unwrap();
        assert_eq!(updated.id, alice.id);
        assert_ne!(updated.password, alice.password);

        let mut fresh = Session::anonymous();
        let err = fx
            .service
            .change_password(&mut fresh, &token, "newpass2")
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));

        assert!(fx.service.login(&mut fresh, "alice", "secret1").await.is_err());
        fx.service.login(&mut fresh, "alice", "newpass1").await.unwrap();
    }
}
