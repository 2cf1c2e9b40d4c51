//! Post and post edit endpoints: authoring, review transitions and guarded reads.

use crate::app_config::AppConfig;
use crate::approval::edits::{self, EditInput, PostEditView};
use crate::approval::posts::{self, PostInput, PostView};
use crate::approval::Approved;
use crate::karma::KarmaReceipt;
use crate::middleware::ClientCtx;
use crate::notifications::dispatcher::KarmaEvents;
use crate::AppError;
use actix_web::{get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Serialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_post)
        .service(view_post)
        .service(update_post)
        .service(submit_post)
        .service(withdraw_post)
        .service(approve_post)
        .service(propose_edit)
        .service(view_edit)
        .service(update_edit)
        .service(submit_edit)
        .service(withdraw_edit)
        .service(approve_edit);
}

#[derive(Serialize)]
struct ApprovalResponse<T> {
    item: T,
    /// Points credited to the author.
    karma_awarded: i32,
    /// Points credited to the approver, when approvers are rewarded.
    approver_karma_awarded: Option<i32>,
}

impl<M, T: From<M>> From<Approved<M>> for ApprovalResponse<T> {
    fn from(approved: Approved<M>) -> Self {
        let change = |r: Option<&KarmaReceipt>| r.map(|r| r.karma_change);
        Self {
            karma_awarded: change(approved.receipts.first()).unwrap_or(0),
            approver_karma_awarded: change(approved.receipts.get(1)),
            item: T::from(approved.item),
        }
    }
}

#[post("/post")]
async fn create_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<PostInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let post = posts::create_draft(db.get_ref(), user_id, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(PostView::from(post)))
}

#[get("/post/{id:\\d+}")]
async fn view_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let post = posts::fetch_post(db.get_ref(), client.get_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

#[patch("/post/{id:\\d+}")]
async fn update_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<PostInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let post =
        posts::update_post(db.get_ref(), user_id, path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

#[post("/post/{id:\\d+}/submit")]
async fn submit_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let post = posts::submit_post(db.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

#[post("/post/{id:\\d+}/withdraw")]
async fn withdraw_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let post = posts::withdraw_post(db.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostView::from(post)))
}

#[post("/post/{id:\\d+}/approve")]
async fn approve_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    events: web::Data<KarmaEvents>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let approver = client.require_user()?;
    let approved = posts::approve_post(
        db.get_ref(),
        events.get_ref(),
        config.karma.reward_approvers,
        approver,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ApprovalResponse::<PostView>::from(approved)))
}

#[post("/post/{id:\\d+}/edit")]
async fn propose_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<EditInput>,
) -> Result<HttpResponse, AppError> {
    let proposer = client.require_user()?;
    let edit =
        edits::propose_edit(db.get_ref(), proposer, path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(PostEditView::from(edit)))
}

#[get("/post/edit/{id:\\d+}")]
async fn view_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let edit = edits::fetch_edit(db.get_ref(), client.get_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostEditView::from(edit)))
}

#[patch("/post/edit/{id:\\d+}")]
async fn update_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<EditInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let edit =
        edits::update_edit(db.get_ref(), user_id, path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostEditView::from(edit)))
}

#[post("/post/edit/{id:\\d+}/submit")]
async fn submit_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let edit = edits::submit_edit(db.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostEditView::from(edit)))
}

#[post("/post/edit/{id:\\d+}/withdraw")]
async fn withdraw_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = client.require_login()?;
    let edit = edits::withdraw_edit(db.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostEditView::from(edit)))
}

#[post("/post/edit/{id:\\d+}/approve")]
async fn approve_edit(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    events: web::Data<KarmaEvents>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let approver = client.require_user()?;
    let approved = edits::approve_edit(
        db.get_ref(),
        events.get_ref(),
        config.karma.reward_approvers,
        approver,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ApprovalResponse::<PostEditView>::from(approved)))
}
