//! Database bootstrap for the authentication service

use common::{
    database::{self, DatabaseConfig},
    error::{DatabaseError, DatabaseResult},
};
use sqlx::PgPool;
use tracing::{error, info};

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    info!("Database migrations applied");
    Ok(())
}

/// Open the pool, verify connectivity and bring the schema up to date
pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    let pool = database::init_pool(config).await?;

    match database::health_check(&pool).await {
        Ok(_) => info!("Database connection successful"),
        Err(e) => {
            error!("Database health check failed: {}", e);
            return Err(e);
        }
    }

    run_migrations(&pool).await?;
    Ok(pool)
}
