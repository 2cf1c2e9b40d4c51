//! Administrative endpoints

use crate::middleware::ClientCtx;
use crate::role::promotion::assign_role;
use crate::role::Role;
use crate::AppError;
use actix_web::{post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(update_user_role);
}

#[derive(Deserialize)]
struct RoleForm {
    role: Role,
}

#[derive(Serialize)]
struct RoleResponse {
    id: i32,
    name: String,
    role: Role,
    karma_points: i32,
}

#[post("/admin/users/{id:\\d+}/role")]
async fn update_user_role(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<RoleForm>,
) -> Result<HttpResponse, AppError> {
    let actor = client.require_user()?;
    let user = assign_role(db.get_ref(), actor, path.into_inner(), form.role).await?;

    Ok(HttpResponse::Ok().json(RoleResponse {
        id: user.id,
        name: user.name,
        role: user.role,
        karma_points: user.karma_points,
    }))
}
