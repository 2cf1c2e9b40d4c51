//! Review queue endpoints

use crate::app_config::AppConfig;
use crate::approval::queue::{pending_edits, pending_posts, QueueQuery};
use crate::middleware::ClientCtx;
use crate::AppError;
use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_post_queue).service(view_edit_queue);
}

/// Posts of other users waiting for approval.
#[get("/post/draft/approval")]
async fn view_post_queue(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = client.require_user()?;
    let page = pending_posts(db.get_ref(), viewer, &query, &config.approval).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Edits by other users waiting for approval.
#[get("/post/edit/approval")]
async fn view_edit_queue(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = client.require_user()?;
    let page = pending_edits(db.get_ref(), viewer, &query, &config.approval).await?;
    Ok(HttpResponse::Ok().json(page))
}
