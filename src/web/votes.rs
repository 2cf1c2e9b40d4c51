//! Vote endpoints for posts and comments

use crate::approval::posts::fetch_post;
use crate::cache::CommentCache;
use crate::middleware::ClientCtx;
use crate::notifications::dispatcher::KarmaEvents;
use crate::votes::{cast_vote, fetch_vote_counts, retract_vote, VoteForm, VoteTarget};
use crate::AppError;
use actix_web::{delete, get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_post_votes)
        .service(vote_post)
        .service(unvote_post)
        .service(vote_comment)
        .service(unvote_comment);
}

#[get("/votes/{post_id:\\d+}")]
async fn view_post_votes(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let post = fetch_post(db.get_ref(), client.get_id(), path.into_inner()).await?;
    let counts = fetch_vote_counts(db.get_ref(), VoteTarget::Post(post.id), client.get_id()).await?;
    Ok(HttpResponse::Ok().json(counts))
}

async fn vote(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    events: web::Data<KarmaEvents>,
    cache: web::Data<CommentCache>,
    target: VoteTarget,
    form: Option<VoteForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;

    let outcome = match form {
        Some(form) => {
            cast_vote(
                db.get_ref(),
                events.get_ref(),
                cache.get_ref(),
                user_id,
                target,
                form.vote_type,
            )
            .await?
        }
        None => {
            retract_vote(
                db.get_ref(),
                events.get_ref(),
                cache.get_ref(),
                user_id,
                target,
            )
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(outcome.counts))
}

#[post("/votes/{post_id:\\d+}")]
async fn vote_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    events: web::Data<KarmaEvents>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
    form: web::Json<VoteForm>,
) -> Result<HttpResponse, AppError> {
    let target = VoteTarget::Post(path.into_inner());
    vote(client, db, events, cache, target, Some(form.into_inner())).await
}

#[delete("/votes/{post_id:\\d+}")]
async fn unvote_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    events: web::Data<KarmaEvents>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let target = VoteTarget::Post(path.into_inner());
    vote(client, db, events, cache, target, None).await
}

#[post("/comments/vote/{comment_id:\\d+}")]
async fn vote_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    events: web::Data<KarmaEvents>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
    form: web::Json<VoteForm>,
) -> Result<HttpResponse, AppError> {
    let target = VoteTarget::Comment(path.into_inner());
    vote(client, db, events, cache, target, Some(form.into_inner())).await
}

#[delete("/comments/vote/{comment_id:\\d+}")]
async fn unvote_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    events: web::Data<KarmaEvents>,
    cache: web::Data<CommentCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let target = VoteTarget::Comment(path.into_inner());
    vote(client, db, events, cache, target, None).await
}
