//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::{Duration, NaiveDateTime, Utc};
use codelore::approval::ApprovalState;
use codelore::orm::sea_orm_active_enums::{PostType, Role};
use codelore::orm::{comments, karma_logs, posts, users};
use sea_orm::{
    entity::*, query::*, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
};

/// Create a user with a given role and karma total
pub async fn create_test_user(
    db: &DatabaseConnection,
    name: &str,
    role: Role,
    karma_points: i32,
) -> Result<users::Model, DbErr> {
    let user = users::ActiveModel {
        name: Set(name.to_string()),
        role: Set(role),
        karma_points: Set(karma_points),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    user.insert(db).await
}

/// Create a post directly in the given state
pub async fn create_test_post(
    db: &DatabaseConnection,
    author_id: i32,
    title: &str,
    post_type: PostType,
    state: ApprovalState,
) -> Result<posts::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let (status, approval_status) = state.columns();
    let post = posts::ActiveModel {
        author_id: Set(author_id),
        title: Set(title.to_string()),
        content: Set(format!("Content of {}", title)),
        category: Set("algorithms".to_string()),
        sub_category: Set(None),
        post_type: Set(post_type),
        status: Set(status),
        approval_status: Set(approval_status),
        difficulty: Set(None),
        companies: Set("[]".to_string()),
        topics: Set("[]".to_string()),
        completion_duration: Set(None),
        slug: Set(codelore::slug::unique_slug(title)),
        created_at: Set(now),
        updated_at: Set(now),
        approved_at: Set(None),
        approved_by: Set(None),
        ..Default::default()
    };
    post.insert(db).await
}

/// Create a comment with a fixed score, `minutes_ago` minutes in the past
pub async fn create_test_comment(
    db: &DatabaseConnection,
    post_id: i32,
    parent_id: Option<i32>,
    author_id: i32,
    score: i32,
    minutes_ago: i64,
) -> Result<comments::Model, DbErr> {
    let created_at: NaiveDateTime = Utc::now().naive_utc() - Duration::minutes(minutes_ago);
    let comment = comments::ActiveModel {
        post_id: Set(post_id),
        parent_id: Set(parent_id),
        author_id: Set(author_id),
        content: Set(format!("comment by {} ({})", author_id, score)),
        score: Set(score),
        created_at: Set(created_at),
        ..Default::default()
    };
    comment.insert(db).await
}

pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> users::Model {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .expect("Failed to load user")
        .expect("User missing")
}

/// Ledger entries of a user, oldest first
pub async fn ledger_for(db: &DatabaseConnection, user_id: i32) -> Vec<karma_logs::Model> {
    karma_logs::Entity::find()
        .filter(karma_logs::Column::UserId.eq(user_id))
        .order_by_asc(karma_logs::Column::Id)
        .all(db)
        .await
        .expect("Failed to load ledger")
}
