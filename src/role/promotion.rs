//! Persisting role changes.

use super::{can_modify_role, has_admin_access, should_promote_user, Role};
use crate::orm::users;
use crate::AppError;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};

/// Applies the promotion the user's current karma has earned, if any.
///
/// The update is conditional on the role read, so two racing awards can't
/// both promote. Returns the new role when a promotion happened.
pub async fn promote_if_due<C>(conn: &C, user_id: i32) -> Result<Option<Role>, DbErr>
where
    C: ConnectionTrait,
{
    let user = match users::Entity::find_by_id(user_id).one(conn).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let new_role = match should_promote_user(user.karma_points, user.role) {
        Some(role) => role,
        None => return Ok(None),
    };

    let result = users::Entity::update_many()
        .col_expr(users::Column::Role, Expr::value(new_role))
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::Role.eq(user.role))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    log::info!(
        "Promoted user {} from {:?} to {:?} at {} karma",
        user_id,
        user.role,
        new_role,
        user.karma_points
    );
    Ok(Some(new_role))
}

/// Administrative role assignment. Not karma-gated.
///
/// The actor needs admin access and must outrank the target. Only a super
/// admin may hand out a rank equal to their own.
pub async fn assign_role(
    db: &DatabaseConnection,
    actor: &users::Model,
    target_id: i32,
    new_role: Role,
) -> Result<users::Model, AppError> {
    if !has_admin_access(actor.role) {
        return Err(AppError::forbidden("Administrator access required"));
    }

    let target = users::Entity::find_by_id(target_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if target.id == actor.id || !can_modify_role(actor.role, target.role) {
        return Err(AppError::forbidden("You cannot modify this user's role"));
    }

    if actor.role != Role::SuperAdmin && new_role.level() >= actor.role.level() {
        return Err(AppError::forbidden(
            "You cannot assign a role equal to or above your own",
        ));
    }

    let result = users::Entity::update_many()
        .col_expr(users::Column::Role, Expr::value(new_role))
        .filter(users::Column::Id.eq(target.id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("User not found"));
    }

    log::info!(
        "User {} changed role of user {} from {:?} to {:?}",
        actor.id,
        target.id,
        target.role,
        new_role
    );

    Ok(users::Model {
        role: new_role,
        ..target
    })
}
