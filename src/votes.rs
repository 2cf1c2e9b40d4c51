//! Up/down votes on posts and comments.
//!
//! A user holds at most one vote per target. Every vote write runs in one
//! transaction with the karma it moves for the target's author and, for
//! comments, with the denormalized comment score.

use crate::approval::ApprovalState;
use crate::cache::CommentCache;
use crate::karma::{self, apply_karma, KarmaAward, KarmaMetadata, KarmaReceipt};
use crate::notifications::dispatcher::KarmaEvents;
use crate::orm::sea_orm_active_enums::{KarmaAction, VoteType};
use crate::orm::{comment_votes, comments, post_votes, posts};
use crate::AppError;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteTarget {
    Post(i32),
    Comment(i32),
}

impl VoteTarget {
    fn vote_action(self) -> KarmaAction {
        match self {
            VoteTarget::Post(_) => KarmaAction::PostVote,
            VoteTarget::Comment(_) => KarmaAction::CommentVote,
        }
    }

    fn removal_action(self) -> KarmaAction {
        match self {
            VoteTarget::Post(_) => KarmaAction::PostVoteRemoval,
            VoteTarget::Comment(_) => KarmaAction::CommentVoteRemoval,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VoteCounts {
    pub up_votes: u64,
    pub down_votes: u64,
    /// The requesting user's own vote, if signed in and voted.
    pub user_vote_type: Option<VoteType>,
}

/// Request body of the vote endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct VoteForm {
    pub vote_type: VoteType,
}

#[derive(Clone, Debug)]
pub struct VoteOutcome {
    pub counts: VoteCounts,
    pub receipts: Vec<KarmaReceipt>,
}

/// What a vote needs to know about the thing being voted on.
struct TargetInfo {
    author_id: i32,
    post_id: i32,
    post_title: String,
}

async fn load_target<C>(conn: &C, target: VoteTarget) -> Result<TargetInfo, AppError>
where
    C: ConnectionTrait,
{
    let (post_id, author_id) = match target {
        VoteTarget::Post(post_id) => (post_id, None),
        VoteTarget::Comment(comment_id) => {
            let comment = comments::Entity::find_by_id(comment_id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::not_found("Comment not found"))?;
            (comment.post_id, Some(comment.author_id))
        }
    };

    let post = posts::Entity::find_by_id(post_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))?;

    if ApprovalState::of_post(&post) != ApprovalState::Approved {
        return Err(AppError::invariant("Votes are only accepted on approved posts"));
    }

    Ok(TargetInfo {
        author_id: author_id.unwrap_or(post.author_id),
        post_id: post.id,
        post_title: post.title,
    })
}

/// The user's vote on a target as (row id, direction).
async fn find_vote<C>(
    conn: &C,
    target: VoteTarget,
    user_id: i32,
) -> Result<Option<(i32, VoteType)>, DbErr>
where
    C: ConnectionTrait,
{
    Ok(match target {
        VoteTarget::Post(post_id) => post_votes::Entity::find()
            .filter(post_votes::Column::PostId.eq(post_id))
            .filter(post_votes::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .map(|v| (v.id, v.vote_type)),
        VoteTarget::Comment(comment_id) => comment_votes::Entity::find()
            .filter(comment_votes::Column::CommentId.eq(comment_id))
            .filter(comment_votes::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .map(|v| (v.id, v.vote_type)),
    })
}

async fn count_votes<C>(conn: &C, target: VoteTarget, vote_type: VoteType) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let count = match target {
        VoteTarget::Post(post_id) => {
            post_votes::Entity::find()
                .filter(post_votes::Column::PostId.eq(post_id))
                .filter(post_votes::Column::VoteType.eq(vote_type))
                .count(conn)
                .await?
        }
        VoteTarget::Comment(comment_id) => {
            comment_votes::Entity::find()
                .filter(comment_votes::Column::CommentId.eq(comment_id))
                .filter(comment_votes::Column::VoteType.eq(vote_type))
                .count(conn)
                .await?
        }
    };
    Ok(count as u64)
}

/// Up and down tallies for a target, plus `user_id`'s own vote.
pub async fn fetch_vote_counts<C>(
    conn: &C,
    target: VoteTarget,
    user_id: Option<i32>,
) -> Result<VoteCounts, DbErr>
where
    C: ConnectionTrait,
{
    let user_vote_type = match user_id {
        Some(user_id) => find_vote(conn, target, user_id).await?.map(|(_, t)| t),
        None => None,
    };

    Ok(VoteCounts {
        up_votes: count_votes(conn, target, VoteType::Up).await?,
        down_votes: count_votes(conn, target, VoteType::Down).await?,
        user_vote_type,
    })
}

/// A second vote row for the same user and target, rejected by the unique index.
fn is_duplicate_vote(err: &DbErr) -> bool {
    match err {
        DbErr::Exec(msg) | DbErr::Query(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("unique constraint") || msg.contains("duplicate key")
        }
        _ => false,
    }
}

fn insert_error(err: DbErr) -> AppError {
    if is_duplicate_vote(&err) {
        log::debug!("Concurrent vote rejected: {}", err);
        AppError::invariant("Your vote was already recorded, try again")
    } else {
        err.into()
    }
}

async fn insert_vote<C>(
    conn: &C,
    target: VoteTarget,
    user_id: i32,
    vote_type: VoteType,
) -> Result<(), AppError>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();
    match target {
        VoteTarget::Post(post_id) => {
            let vote = post_votes::ActiveModel {
                post_id: Set(post_id),
                user_id: Set(user_id),
                vote_type: Set(vote_type),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            post_votes::Entity::insert(vote)
                .exec(conn)
                .await
                .map_err(insert_error)?;
        }
        VoteTarget::Comment(comment_id) => {
            let vote = comment_votes::ActiveModel {
                comment_id: Set(comment_id),
                user_id: Set(user_id),
                vote_type: Set(vote_type),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            comment_votes::Entity::insert(vote)
                .exec(conn)
                .await
                .map_err(insert_error)?;
        }
    }
    Ok(())
}

async fn update_vote<C>(
    conn: &C,
    target: VoteTarget,
    vote_id: i32,
    vote_type: VoteType,
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();
    match target {
        VoteTarget::Post(_) => {
            post_votes::Entity::update_many()
                .col_expr(post_votes::Column::VoteType, Expr::value(vote_type))
                .col_expr(post_votes::Column::UpdatedAt, Expr::value(now))
                .filter(post_votes::Column::Id.eq(vote_id))
                .exec(conn)
                .await?;
        }
        VoteTarget::Comment(_) => {
            comment_votes::Entity::update_many()
                .col_expr(comment_votes::Column::VoteType, Expr::value(vote_type))
                .col_expr(comment_votes::Column::UpdatedAt, Expr::value(now))
                .filter(comment_votes::Column::Id.eq(vote_id))
                .exec(conn)
                .await?;
        }
    }
    Ok(())
}

async fn delete_vote<C>(conn: &C, target: VoteTarget, vote_id: i32) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    match target {
        VoteTarget::Post(_) => {
            post_votes::Entity::delete_by_id(vote_id).exec(conn).await?;
        }
        VoteTarget::Comment(_) => {
            comment_votes::Entity::delete_by_id(vote_id).exec(conn).await?;
        }
    }
    Ok(())
}

async fn adjust_score<C>(conn: &C, target: VoteTarget, delta: i32) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    if let (VoteTarget::Comment(comment_id), true) = (target, delta != 0) {
        comments::Entity::update_many()
            .col_expr(
                comments::Column::Score,
                Expr::col(comments::Column::Score).add(delta),
            )
            .filter(comments::Column::Id.eq(comment_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

fn award(
    target: VoteTarget,
    info: &TargetInfo,
    action: KarmaAction,
    vote_type: VoteType,
) -> KarmaAward {
    let award = KarmaAward::computed(
        info.author_id,
        action,
        KarmaMetadata::Vote {
            vote_type,
            post_title: Some(info.post_title.clone()),
        },
    )
    .on_post(info.post_id);

    match target {
        VoteTarget::Comment(comment_id) => award.on_comment(comment_id),
        VoteTarget::Post(_) => award,
    }
}

/// Casts or changes `voter_id`'s vote.
///
/// Repeating the current vote changes nothing. Switching direction writes a
/// removal entry for the old vote and a new vote entry, so the author moves
/// by two points.
pub async fn cast_vote(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    cache: &CommentCache,
    voter_id: i32,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<VoteOutcome, AppError> {
    let txn = db.begin().await?;

    let info = load_target(&txn, target).await?;
    if info.author_id == voter_id {
        return Err(AppError::forbidden("You cannot vote on your own content"));
    }

    let mut receipts = Vec::new();
    let score_delta = match find_vote(&txn, target, voter_id).await? {
        Some((_, current)) if current == vote_type => 0,
        Some((vote_id, current)) => {
            update_vote(&txn, target, vote_id, vote_type).await?;
            receipts.push(
                apply_karma(
                    &txn,
                    voter_id,
                    award(target, &info, target.removal_action(), current),
                )
                .await?,
            );
            receipts.push(
                apply_karma(
                    &txn,
                    voter_id,
                    award(target, &info, target.vote_action(), vote_type),
                )
                .await?,
            );
            vote_type.weight() - current.weight()
        }
        None => {
            insert_vote(&txn, target, voter_id, vote_type).await?;
            receipts.push(
                apply_karma(
                    &txn,
                    voter_id,
                    award(target, &info, target.vote_action(), vote_type),
                )
                .await?,
            );
            vote_type.weight()
        }
    };

    adjust_score(&txn, target, score_delta).await?;
    let counts = fetch_vote_counts(&txn, target, Some(voter_id)).await?;
    txn.commit().await?;

    finish(db, events, cache, target, &info, &receipts, score_delta).await;
    log::info!(
        "User {} voted {:?} on {:?} ({:+} to user {})",
        voter_id,
        vote_type,
        target,
        score_delta,
        info.author_id
    );

    Ok(VoteOutcome { counts, receipts })
}

/// Withdraws `voter_id`'s vote and reverses the karma it gave. Retracting a
/// vote that doesn't exist is a no-op.
pub async fn retract_vote(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    cache: &CommentCache,
    voter_id: i32,
    target: VoteTarget,
) -> Result<VoteOutcome, AppError> {
    let txn = db.begin().await?;

    let info = load_target(&txn, target).await?;

    let mut receipts = Vec::new();
    let score_delta = match find_vote(&txn, target, voter_id).await? {
        Some((vote_id, current)) => {
            delete_vote(&txn, target, vote_id).await?;
            receipts.push(
                apply_karma(
                    &txn,
                    voter_id,
                    award(target, &info, target.removal_action(), current),
                )
                .await?,
            );
            -current.weight()
        }
        None => 0,
    };

    adjust_score(&txn, target, score_delta).await?;
    let counts = fetch_vote_counts(&txn, target, Some(voter_id)).await?;
    txn.commit().await?;

    finish(db, events, cache, target, &info, &receipts, score_delta).await;

    Ok(VoteOutcome { counts, receipts })
}

async fn finish(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    cache: &CommentCache,
    target: VoteTarget,
    info: &TargetInfo,
    receipts: &[KarmaReceipt],
    score_delta: i32,
) {
    karma::after_commit(db, events, receipts).await;

    if matches!(target, VoteTarget::Comment(_)) && score_delta != 0 {
        cache.invalidate_post(info.post_id);
    }
}
