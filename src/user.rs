use crate::orm::users;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use std::collections::HashMap;

/// Maps user ids to display names for the users that exist.
pub async fn get_display_names<C>(conn: &C, ids: &[i32]) -> Result<HashMap<i32, String>, DbErr>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    Ok(users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|user| (user.id, user.name))
        .collect())
}
