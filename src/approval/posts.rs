use super::{
    can_view, decode_list, encode_list, ensure_can_approve, transition, ApprovalEvent,
    ApprovalState, Approved,
};
use crate::karma::{self, apply_karma, KarmaAward, KarmaMetadata};
use crate::notifications::dispatcher::KarmaEvents;
use crate::orm::sea_orm_active_enums::{Difficulty, KarmaAction, PostType};
use crate::orm::{posts, users};
use crate::AppError;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DatabaseConnection, DbErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Author-editable fields of a post.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100000))]
    pub content: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(length(min = 1, max = 64))]
    pub sub_category: Option<String>,
    pub post_type: PostType,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub companies: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub topics: Vec<String>,
    /// Minutes.
    #[validate(range(min = 1, max = 1440))]
    pub completion_duration: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostView {
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub post_type: PostType,
    pub state: ApprovalState,
    pub difficulty: Option<Difficulty>,
    pub companies: Vec<String>,
    pub topics: Vec<String>,
    pub completion_duration: Option<i32>,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<i32>,
}

impl From<posts::Model> for PostView {
    fn from(post: posts::Model) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            state: ApprovalState::of_post(&post),
            companies: decode_list(&post.companies),
            topics: decode_list(&post.topics),
            title: post.title,
            content: post.content,
            category: post.category,
            sub_category: post.sub_category,
            post_type: post.post_type,
            difficulty: post.difficulty,
            completion_duration: post.completion_duration,
            slug: post.slug,
            created_at: post.created_at,
            updated_at: post.updated_at,
            approved_at: post.approved_at,
            approved_by: post.approved_by,
        }
    }
}

pub(crate) async fn find_post<C>(conn: &C, post_id: i32) -> Result<posts::Model, AppError>
where
    C: ConnectionTrait,
{
    posts::Entity::find_by_id(post_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))
}

/// Moves a post between states, guarded on the state it was read in so a
/// concurrent transition can't be overwritten.
async fn move_post<C>(
    conn: &C,
    post_id: i32,
    from: ApprovalState,
    to: ApprovalState,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let (from_status, from_approval) = from.columns();
    let (to_status, to_approval) = to.columns();

    let result = posts::Entity::update_many()
        .col_expr(posts::Column::Status, Expr::value(to_status))
        .col_expr(posts::Column::ApprovalStatus, Expr::value(to_approval))
        .col_expr(posts::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(posts::Column::Id.eq(post_id))
        .filter(posts::Column::Status.eq(from_status))
        .filter(posts::Column::ApprovalStatus.eq(from_approval))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

fn require_author(post: &posts::Model, user_id: i32) -> Result<(), AppError> {
    if post.author_id != user_id {
        return Err(AppError::forbidden("Only the author can change this post"));
    }
    Ok(())
}

/// Creates a post as a draft. Drafts are invisible to everyone but the author.
pub async fn create_draft(
    db: &DatabaseConnection,
    author_id: i32,
    input: PostInput,
) -> Result<posts::Model, AppError> {
    input.validate()?;

    let now = Utc::now().naive_utc();
    let (status, approval_status) = ApprovalState::Draft.columns();
    let post = posts::ActiveModel {
        author_id: Set(author_id),
        slug: Set(crate::slug::unique_slug(&input.title)),
        title: Set(input.title.trim().to_owned()),
        content: Set(input.content),
        category: Set(input.category),
        sub_category: Set(input.sub_category),
        post_type: Set(input.post_type),
        status: Set(status),
        approval_status: Set(approval_status),
        difficulty: Set(input.difficulty),
        companies: Set(encode_list(&input.companies)),
        topics: Set(encode_list(&input.topics)),
        completion_duration: Set(input.completion_duration),
        created_at: Set(now),
        updated_at: Set(now),
        approved_at: Set(None),
        approved_by: Set(None),
        ..Default::default()
    };
    let post = post.insert(db).await?;

    log::info!("User {} created draft post {}", author_id, post.id);
    Ok(post)
}

/// Rewrites a draft or pending post in place. Approved posts only change
/// through an edit proposal.
pub async fn update_post(
    db: &DatabaseConnection,
    author_id: i32,
    post_id: i32,
    input: PostInput,
) -> Result<posts::Model, AppError> {
    input.validate()?;

    let post = find_post(db, post_id).await?;
    require_author(&post, author_id)?;
    if !ApprovalState::of_post(&post).is_editable() {
        return Err(AppError::invariant(
            "Approved posts can only be changed by proposing an edit",
        ));
    }

    let mut post: posts::ActiveModel = post.into();
    post.title = Set(input.title.trim().to_owned());
    post.content = Set(input.content);
    post.category = Set(input.category);
    post.sub_category = Set(input.sub_category);
    post.post_type = Set(input.post_type);
    post.difficulty = Set(input.difficulty);
    post.companies = Set(encode_list(&input.companies));
    post.topics = Set(encode_list(&input.topics));
    post.completion_duration = Set(input.completion_duration);
    post.updated_at = Set(Utc::now().naive_utc());

    Ok(post.update(db).await?)
}

async fn author_transition(
    db: &DatabaseConnection,
    author_id: i32,
    post_id: i32,
    event: ApprovalEvent,
) -> Result<posts::Model, AppError> {
    let post = find_post(db, post_id).await?;
    require_author(&post, author_id)?;

    let from = ApprovalState::of_post(&post);
    let to = transition(from, event)?;
    if !move_post(db, post_id, from, to).await? {
        return Err(AppError::invariant("The post changed state, please retry"));
    }

    log::info!("User {} moved post {} from {:?} to {:?}", author_id, post_id, from, to);
    find_post(db, post_id).await
}

/// Sends a draft to the review queue.
pub async fn submit_post(
    db: &DatabaseConnection,
    author_id: i32,
    post_id: i32,
) -> Result<posts::Model, AppError> {
    author_transition(db, author_id, post_id, ApprovalEvent::Submit).await
}

/// Pulls a pending post back to draft.
pub async fn withdraw_post(
    db: &DatabaseConnection,
    author_id: i32,
    post_id: i32,
) -> Result<posts::Model, AppError> {
    author_transition(db, author_id, post_id, ApprovalEvent::Withdraw).await
}

/// Approves a pending post and awards the author, all in one transaction.
///
/// With `reward_approvers` the approver gets a second ledger entry worth the
/// same points, marked `is_approver`.
pub async fn approve_post(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    reward_approvers: bool,
    approver: &users::Model,
    post_id: i32,
) -> Result<Approved<posts::Model>, AppError> {
    let post = find_post(db, post_id).await?;
    ensure_can_approve(approver, post.author_id)?;

    let from = ApprovalState::of_post(&post);
    let to = transition(from, ApprovalEvent::Approve)?;

    let txn = db.begin().await?;

    if !move_post(&txn, post.id, from, to).await? {
        return Err(AppError::invariant("This post is no longer pending approval"));
    }
    posts::Entity::update_many()
        .col_expr(
            posts::Column::ApprovedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .col_expr(posts::Column::ApprovedBy, Expr::value(approver.id))
        .filter(posts::Column::Id.eq(post.id))
        .exec(&txn)
        .await?;

    let mut receipts = Vec::with_capacity(2);
    receipts.push(
        apply_karma(
            &txn,
            approver.id,
            approval_award(&post, post.author_id, false),
        )
        .await?,
    );
    if reward_approvers {
        receipts.push(
            apply_karma(&txn, approver.id, approval_award(&post, approver.id, true)).await?,
        );
    }

    txn.commit().await?;

    log::info!(
        "User {} approved post {} by user {}",
        approver.id,
        post.id,
        post.author_id
    );
    karma::after_commit(db, events, &receipts).await;

    Ok(Approved {
        item: find_post(db, post_id).await?,
        receipts,
    })
}

fn approval_award(post: &posts::Model, beneficiary: i32, is_approver: bool) -> KarmaAward {
    KarmaAward::computed(
        beneficiary,
        KarmaAction::PostApproval,
        KarmaMetadata::PostApproval {
            post_type: Some(post.post_type),
            post_title: Some(post.title.clone()),
            is_approver,
        },
    )
    .on_post(post.id)
}

/// Loads a post for `requester`. Unapproved posts are only shown to their
/// author; anyone else gets an authorization error rather than not-found.
pub async fn fetch_post(
    db: &DatabaseConnection,
    requester: Option<i32>,
    post_id: i32,
) -> Result<posts::Model, AppError> {
    let post = find_post(db, post_id).await?;

    if !can_view(ApprovalState::of_post(&post), post.author_id, requester) {
        return Err(AppError::forbidden(
            "You do not have permission to view this post",
        ));
    }

    Ok(post)
}
