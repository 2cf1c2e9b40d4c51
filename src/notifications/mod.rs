//! In-app notifications about karma changes

pub mod dispatcher;
pub mod types;

use crate::orm::notifications;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};

pub use types::NotificationType;

/// Stores a notification and returns its id.
pub async fn create_notification<C>(
    conn: &C,
    user_id: i32,
    notification_type: NotificationType,
    title: String,
    message: String,
    url: Option<String>,
    source_user_id: Option<i32>,
) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let notification = notifications::ActiveModel {
        user_id: Set(user_id),
        type_: Set(notification_type.as_str().to_string()),
        title: Set(title),
        message: Set(message),
        url: Set(url),
        source_user_id: Set(source_user_id),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };

    let result = notification.insert(conn).await?;
    Ok(result.id)
}

pub async fn count_unread_notifications<C>(conn: &C, user_id: i32) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let count = notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .count(conn)
        .await?;

    Ok(count as u64)
}

/// Newest first.
pub async fn get_user_notifications<C>(
    conn: &C,
    user_id: i32,
    limit: u64,
) -> Result<Vec<notifications::Model>, DbErr>
where
    C: ConnectionTrait,
{
    notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .limit(limit)
        .all(conn)
        .await
}
