//! Revisions proposed against approved posts.
//!
//! An edit is its own row with its own lifecycle. The live post is untouched
//! until the edit is approved, at which point its fields are copied over in
//! the same transaction that flips the edit's state and awards karma.

use super::posts::find_post;
use super::{
    can_view, decode_list, encode_list, ensure_can_approve, transition, ApprovalEvent,
    ApprovalState, Approved,
};
use crate::karma::{self, apply_karma, KarmaAward, KarmaMetadata};
use crate::notifications::dispatcher::KarmaEvents;
use crate::orm::sea_orm_active_enums::{Difficulty, KarmaAction};
use crate::orm::{post_edits, posts, users};
use crate::role::has_editor_access;
use crate::AppError;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DatabaseConnection, DbErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The editable fields of a post. The post type is fixed once approved.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct EditInput {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100000))]
    pub content: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(length(min = 1, max = 64))]
    pub sub_category: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub companies: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub topics: Vec<String>,
    #[validate(range(min = 1, max = 1440))]
    pub completion_duration: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostEditView {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub state: ApprovalState,
    pub difficulty: Option<Difficulty>,
    pub companies: Vec<String>,
    pub topics: Vec<String>,
    pub completion_duration: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<i32>,
}

impl From<post_edits::Model> for PostEditView {
    fn from(edit: post_edits::Model) -> Self {
        Self {
            id: edit.id,
            post_id: edit.post_id,
            author_id: edit.author_id,
            state: ApprovalState::of_edit(&edit),
            companies: decode_list(&edit.companies),
            topics: decode_list(&edit.topics),
            title: edit.title,
            content: edit.content,
            category: edit.category,
            sub_category: edit.sub_category,
            difficulty: edit.difficulty,
            completion_duration: edit.completion_duration,
            created_at: edit.created_at,
            updated_at: edit.updated_at,
            approved_at: edit.approved_at,
            approved_by: edit.approved_by,
        }
    }
}

async fn find_edit<C>(conn: &C, edit_id: i32) -> Result<post_edits::Model, AppError>
where
    C: ConnectionTrait,
{
    post_edits::Entity::find_by_id(edit_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Edit not found"))
}

async fn move_edit<C>(
    conn: &C,
    edit_id: i32,
    from: ApprovalState,
    to: ApprovalState,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let (from_status, from_approval) = from.columns();
    let (to_status, to_approval) = to.columns();

    let result = post_edits::Entity::update_many()
        .col_expr(post_edits::Column::Status, Expr::value(to_status))
        .col_expr(post_edits::Column::ApprovalStatus, Expr::value(to_approval))
        .col_expr(
            post_edits::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(post_edits::Column::Id.eq(edit_id))
        .filter(post_edits::Column::Status.eq(from_status))
        .filter(post_edits::Column::ApprovalStatus.eq(from_approval))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

fn require_author(edit: &post_edits::Model, user_id: i32) -> Result<(), AppError> {
    if edit.author_id != user_id {
        return Err(AppError::forbidden("Only the proposer can change this edit"));
    }
    Ok(())
}

/// Opens a draft edit against an approved post. The proposer must be the
/// post's author or an editor.
pub async fn propose_edit(
    db: &DatabaseConnection,
    proposer: &users::Model,
    post_id: i32,
    input: EditInput,
) -> Result<post_edits::Model, AppError> {
    input.validate()?;

    let post = find_post(db, post_id).await?;
    if post.author_id != proposer.id && !has_editor_access(proposer.role) {
        return Err(AppError::forbidden(
            "Only the author or an editor can propose changes to this post",
        ));
    }
    if ApprovalState::of_post(&post) != ApprovalState::Approved {
        return Err(AppError::invariant(
            "Edits can only be proposed for approved posts",
        ));
    }

    let now = Utc::now().naive_utc();
    let (status, approval_status) = ApprovalState::Draft.columns();
    let edit = post_edits::ActiveModel {
        post_id: Set(post.id),
        author_id: Set(proposer.id),
        title: Set(input.title.trim().to_owned()),
        content: Set(input.content),
        category: Set(input.category),
        sub_category: Set(input.sub_category),
        difficulty: Set(input.difficulty),
        companies: Set(encode_list(&input.companies)),
        topics: Set(encode_list(&input.topics)),
        completion_duration: Set(input.completion_duration),
        status: Set(status),
        approval_status: Set(approval_status),
        created_at: Set(now),
        updated_at: Set(now),
        approved_at: Set(None),
        approved_by: Set(None),
        ..Default::default()
    };
    let edit = edit.insert(db).await?;

    log::info!(
        "User {} proposed edit {} to post {}",
        proposer.id,
        edit.id,
        post.id
    );
    Ok(edit)
}

pub async fn update_edit(
    db: &DatabaseConnection,
    author_id: i32,
    edit_id: i32,
    input: EditInput,
) -> Result<post_edits::Model, AppError> {
    input.validate()?;

    let edit = find_edit(db, edit_id).await?;
    require_author(&edit, author_id)?;
    if !ApprovalState::of_edit(&edit).is_editable() {
        return Err(AppError::invariant("Approved edits cannot be changed"));
    }

    let mut edit: post_edits::ActiveModel = edit.into();
    edit.title = Set(input.title.trim().to_owned());
    edit.content = Set(input.content);
    edit.category = Set(input.category);
    edit.sub_category = Set(input.sub_category);
    edit.difficulty = Set(input.difficulty);
    edit.companies = Set(encode_list(&input.companies));
    edit.topics = Set(encode_list(&input.topics));
    edit.completion_duration = Set(input.completion_duration);
    edit.updated_at = Set(Utc::now().naive_utc());

    Ok(edit.update(db).await?)
}

async fn author_transition(
    db: &DatabaseConnection,
    author_id: i32,
    edit_id: i32,
    event: ApprovalEvent,
) -> Result<post_edits::Model, AppError> {
    let edit = find_edit(db, edit_id).await?;
    require_author(&edit, author_id)?;

    let from = ApprovalState::of_edit(&edit);
    let to = transition(from, event)?;
    if !move_edit(db, edit_id, from, to).await? {
        return Err(AppError::invariant("The edit changed state, please retry"));
    }

    log::info!("User {} moved edit {} from {:?} to {:?}", author_id, edit_id, from, to);
    find_edit(db, edit_id).await
}

pub async fn submit_edit(
    db: &DatabaseConnection,
    author_id: i32,
    edit_id: i32,
) -> Result<post_edits::Model, AppError> {
    author_transition(db, author_id, edit_id, ApprovalEvent::Submit).await
}

pub async fn withdraw_edit(
    db: &DatabaseConnection,
    author_id: i32,
    edit_id: i32,
) -> Result<post_edits::Model, AppError> {
    author_transition(db, author_id, edit_id, ApprovalEvent::Withdraw).await
}

/// Approves a pending edit: flips its state, copies it onto the live post
/// and awards the proposer, all in one transaction.
pub async fn approve_edit(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    reward_approvers: bool,
    approver: &users::Model,
    edit_id: i32,
) -> Result<Approved<post_edits::Model>, AppError> {
    let edit = find_edit(db, edit_id).await?;
    ensure_can_approve(approver, edit.author_id)?;

    let from = ApprovalState::of_edit(&edit);
    let to = transition(from, ApprovalEvent::Approve)?;

    let txn = db.begin().await?;

    let post = find_post(&txn, edit.post_id).await?;
    if !move_edit(&txn, edit.id, from, to).await? {
        return Err(AppError::invariant("This edit is no longer pending approval"));
    }

    let now = Utc::now().naive_utc();
    post_edits::Entity::update_many()
        .col_expr(post_edits::Column::ApprovedAt, Expr::value(now))
        .col_expr(post_edits::Column::ApprovedBy, Expr::value(approver.id))
        .filter(post_edits::Column::Id.eq(edit.id))
        .exec(&txn)
        .await?;

    let post_type = post.post_type;
    let mut live: posts::ActiveModel = post.into();
    live.title = Set(edit.title.clone());
    live.content = Set(edit.content.clone());
    live.category = Set(edit.category.clone());
    live.sub_category = Set(edit.sub_category.clone());
    live.difficulty = Set(edit.difficulty);
    live.companies = Set(edit.companies.clone());
    live.topics = Set(edit.topics.clone());
    live.completion_duration = Set(edit.completion_duration);
    live.updated_at = Set(now);
    live.update(&txn).await?;

    let award = |beneficiary: i32, is_approver: bool| {
        KarmaAward::computed(
            beneficiary,
            KarmaAction::PostEditApproval,
            KarmaMetadata::PostApproval {
                post_type: Some(post_type),
                post_title: Some(edit.title.clone()),
                is_approver,
            },
        )
        .on_post(edit.post_id)
    };

    let mut receipts = Vec::with_capacity(2);
    receipts.push(apply_karma(&txn, approver.id, award(edit.author_id, false)).await?);
    if reward_approvers {
        receipts.push(apply_karma(&txn, approver.id, award(approver.id, true)).await?);
    }

    txn.commit().await?;

    log::info!(
        "User {} approved edit {} to post {} by user {}",
        approver.id,
        edit.id,
        edit.post_id,
        edit.author_id
    );
    karma::after_commit(db, events, &receipts).await;

    Ok(Approved {
        item: find_edit(db, edit_id).await?,
        receipts,
    })
}

/// Loads an edit for `requester`, with the same visibility rule as posts.
pub async fn fetch_edit(
    db: &DatabaseConnection,
    requester: Option<i32>,
    edit_id: i32,
) -> Result<post_edits::Model, AppError> {
    let edit = find_edit(db, edit_id).await?;

    if !can_view(ApprovalState::of_edit(&edit), edit.author_id, requester) {
        return Err(AppError::forbidden(
            "You do not have permission to view this edit",
        ));
    }

    Ok(edit)
}
