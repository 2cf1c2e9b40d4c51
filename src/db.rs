//! Database connection and schema bootstrap.

use crate::app_config::DatabaseConfig;
use crate::orm::{
    comment_votes, comments, karma_logs, notifications, post_edits, post_votes, posts, users,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};

/// Indexes the entity definitions can't express. One vote per user and target.
const UNIQUE_INDEXES: [&str; 2] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS post_votes_post_user ON post_votes (post_id, user_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS comment_votes_comment_user ON comment_votes (comment_id, user_id)",
];

const INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS karma_logs_user_created ON karma_logs (user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS comments_post_parent ON comments (post_id, parent_id)",
    "CREATE INDEX IF NOT EXISTS posts_review_queue ON posts (status, approval_status)",
    "CREATE INDEX IF NOT EXISTS post_edits_review_queue ON post_edits (status, approval_status)",
];

pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    log::info!("Connected to {:?} database", db.get_database_backend());
    Ok(db)
}

/// Creates every table and index that doesn't exist yet.
///
/// Tables are created parents first so foreign keys resolve on Postgres.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, posts::Entity).await?;
    create_table(db, post_edits::Entity).await?;
    create_table(db, comments::Entity).await?;
    create_table(db, post_votes::Entity).await?;
    create_table(db, comment_votes::Entity).await?;
    create_table(db, karma_logs::Entity).await?;
    create_table(db, notifications::Entity).await?;

    let backend = db.get_database_backend();
    for sql in UNIQUE_INDEXES.iter().chain(INDEXES.iter()) {
        db.execute(Statement::from_string(backend, sql.to_string()))
            .await?;
    }

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    db.execute(backend.build(stmt.if_not_exists())).await?;
    Ok(())
}
