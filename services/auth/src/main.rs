use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use auth::{
    AppState,
    config::{AuthConfig, SmtpConfig},
    database,
    mailer::{LogMailer, Mailer, SmtpMailer},
    repositories::PgUserStore,
    routes,
    service::AuthService,
    session::SessionManager,
    tokens::ResetTokens,
};
use common::{
    cache::{KeyValueCache, RedisConfig, RedisPool},
    database::DatabaseConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::connect(&db_config).await?;

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    if redis_pool.health_check().await? {
        info!("Redis connection successful");
    } else {
        anyhow::bail!("Failed to connect to Redis");
    }
    let cache: Arc<dyn KeyValueCache> = Arc::new(redis_pool);

    let mailer: Arc<dyn Mailer> = match SmtpConfig::from_env() {
        Some(smtp) => {
            info!("Sending mail through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(&smtp)?)
        }
        None => {
            info!("SMTP_HOST not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let auth_service = AuthService::new(
        Arc::new(PgUserStore::new(pool)),
        SessionManager::new(cache.clone(), config.session_ttl_seconds),
        ResetTokens::new(cache),
        mailer,
        config.frontend_url.clone(),
    );

    info!("Authentication service initialized successfully");

    let listen_addr = config.listen_addr.clone();
    let app = routes::create_router(AppState::new(auth_service, config));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Authentication service listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
