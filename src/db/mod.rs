use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use postgres::PgStore;
pub use store::{Store, UnitOfWork};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}
