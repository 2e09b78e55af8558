//! Shared test database helper

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Fresh in-memory database with migrations applied
///
/// A single connection keeps every query on the same in-memory database.
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}
