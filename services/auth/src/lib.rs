//! Authentication service for the forum backend
//!
//! Cookie-backed sessions, registration and login, and password recovery
//! through single-use reset tokens.

use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod session;
pub mod tokens;
pub mod validation;

use crate::{config::AuthConfig, service::AuthService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(auth: AuthService, config: AuthConfig) -> Self {
        Self {
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}
