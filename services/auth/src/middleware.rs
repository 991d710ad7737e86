//! Session cookie extraction and write-back

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    AppState,
    config::AuthConfig,
    error::ApiError,
    session::{Session, SessionState},
};

/// The request's session, resolved from its cookie
///
/// Handlers mutate `session` and return [`CurrentSession::into_jar`] so the
/// response carries the matching `Set-Cookie` header.
pub struct CurrentSession {
    pub session: Session,
    jar: CookieJar,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = cookie_value(&jar, &state.config);

        let session = state.auth.sessions().load(cookie.as_deref()).await?;

        Ok(Self { session, jar })
    }
}

fn cookie_value(jar: &CookieJar, config: &AuthConfig) -> Option<String> {
    jar.get(&config.cookie_name).map(|c| c.value().to_owned())
}

impl CurrentSession {
    /// The session named by the cookie, without a store lookup
    ///
    /// For handlers that must answer even when the session store is down.
    pub fn unverified(jar: CookieJar, config: &AuthConfig) -> Self {
        let session = Session::unverified(cookie_value(&jar, config).as_deref());
        Self { session, jar }
    }

    /// Cookie jar reflecting what the handler did to the session
    pub fn into_jar(self, config: &AuthConfig) -> CookieJar {
        match (self.session.state(), self.session.id()) {
            (SessionState::Established, Some(id)) => self.jar.add(session_cookie(config, id)),
            (SessionState::Destroyed, _) => self.jar.add(removal_cookie(config)),
            _ => self.jar,
        }
    }
}

fn session_cookie(config: &AuthConfig, id: &str) -> Cookie<'static> {
    let max_age = i64::try_from(config.session_ttl_seconds).unwrap_or(i64::MAX);

    Cookie::build((config.cookie_name.clone(), id.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Expired cookie; sent even when the request carried none
fn removal_cookie(config: &AuthConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), "")).path("/").build();
    cookie.make_removal();
    cookie
}
