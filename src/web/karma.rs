//! Karma ledger endpoints

use crate::app_config::AppConfig;
use crate::karma::list_karma_history;
use crate::middleware::ClientCtx;
use crate::role::{get_next_role_milestone, should_promote_user, Role, RoleMilestone};
use crate::AppError;
use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_karma_summary).service(view_karma);
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Serialize)]
struct KarmaSummary {
    karma_points: i32,
    role: Role,
    milestone: RoleMilestone,
    /// Rank the user has earned but not been moved to yet.
    promotion_due: Option<Role>,
}

/// The signed-in user's ledger, newest first.
#[get("/karma")]
async fn view_karma(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;

    let limit = query
        .limit
        .unwrap_or(config.karma.history_limit)
        .clamp(1, config.karma.max_history_limit.max(1));
    let history =
        list_karma_history(db.get_ref(), user_id, limit, query.offset.unwrap_or(0)).await?;

    Ok(HttpResponse::Ok().json(history))
}

#[get("/karma/summary")]
async fn view_karma_summary(client: ClientCtx) -> Result<HttpResponse, AppError> {
    let user = client.require_user()?;

    Ok(HttpResponse::Ok().json(KarmaSummary {
        karma_points: user.karma_points,
        role: user.role,
        milestone: get_next_role_milestone(user.karma_points, user.role),
        promotion_due: should_promote_user(user.karma_points, user.role),
    }))
}
