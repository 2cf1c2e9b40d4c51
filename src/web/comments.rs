//! Comment thread endpoints

use crate::app_config::AppConfig;
use crate::approval::posts::fetch_post;
use crate::cache::CommentCache;
use crate::comments::{create_comment, CommentNode, CommentQuery, NewComment};
use crate::middleware::ClientCtx;
use crate::AppError;
use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_comments).service(create_comment_post);
}

/// One page of a post's comment thread. The opening page is served from the
/// in-process cache when possible.
#[get("/comments/{post_id:\\d+}")]
async fn view_comments(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
    query: web::Query<CommentQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    let post_id = path.into_inner();

    // Unapproved posts have no public thread.
    fetch_post(db.get_ref(), client.get_id(), post_id).await?;

    let request = query.normalize(&config.comments);
    let (page, hit) = cache.get_or_fetch(db.get_ref(), post_id, &request).await?;

    let cache_control = if request.is_first_page() {
        format!("public, max-age={}", config.comments.cache_ttl_seconds)
    } else {
        "no-cache".to_owned()
    };

    Ok(HttpResponse::Ok()
        .insert_header(("X-Cache", if hit { "HIT" } else { "MISS" }))
        .insert_header((header::CACHE_CONTROL, cache_control))
        .json(page.as_ref()))
}

#[post("/comments/{post_id:\\d+}")]
async fn create_comment_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
    form: web::Json<NewComment>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_user()?;

    let comment = create_comment(
        db.get_ref(),
        cache.get_ref(),
        user.id,
        path.into_inner(),
        form.into_inner(),
    )
    .await?;

    let mut node = CommentNode::from(comment);
    node.author_name = Some(user.name.clone());
    Ok(HttpResponse::Created().json(node))
}
