//! Test database setup and management
#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// A fresh in-memory SQLite database with the full schema.
///
/// The pool is pinned to a single connection: every connection to
/// `sqlite::memory:` opens its own empty database. Code under test must
/// therefore run its queries on the open transaction while it holds one.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    codelore::db::create_schema(&db).await?;
    Ok(db)
}
