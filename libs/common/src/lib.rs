//! Common library for the forum backend
//!
//! This crate provides shared infrastructure used across the services:
//! PostgreSQL connectivity, the key-value cache contract with its Redis and
//! in-memory backings, and the matching error types.
//!
//! ```rust,no_run
//! use common::cache::{KeyValueCache, RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!
//!     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
//!     redis.set("greeting", "hello", Some(60)).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
