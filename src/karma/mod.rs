//! Karma ledger: applying point changes and reading them back.
//!
//! Every change to `users.karma_points` goes through [`apply_karma`], which
//! writes the new total and exactly one `karma_logs` row on the connection it
//! is given. Callers pass a transaction so both writes commit or neither does.

pub mod calculator;

pub use calculator::{calculate_karma, KarmaMetadata};

use crate::notifications::dispatcher::KarmaEvents;
use crate::orm::sea_orm_active_enums::KarmaAction;
use crate::orm::{karma_logs, users};
use chrono::{NaiveDateTime, Utc};
use derive_more::Display;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

/// Reasons an award is refused. Nothing is persisted in any of these cases.
#[derive(Debug, Display)]
pub enum KarmaError {
    #[display(fmt = "User not authenticated")]
    NotAuthenticated,
    #[display(fmt = "Target user not found")]
    UserNotFound,
    #[display(fmt = "Insufficient karma for operation")]
    InsufficientKarma,
    #[display(fmt = "Failed to award karma")]
    Database(DbErr),
}

impl std::error::Error for KarmaError {}

impl From<DbErr> for KarmaError {
    fn from(err: DbErr) -> Self {
        KarmaError::Database(err)
    }
}

impl From<KarmaError> for crate::AppError {
    fn from(err: KarmaError) -> Self {
        use crate::AppError;

        match err {
            KarmaError::NotAuthenticated => AppError::Unauthenticated(err.to_string()),
            KarmaError::UserNotFound => AppError::NotFound(err.to_string()),
            KarmaError::InsufficientKarma => AppError::InvariantViolation(err.to_string()),
            KarmaError::Database(db_err) => db_err.into(),
        }
    }
}

/// A requested karma change for one beneficiary.
#[derive(Clone, Debug)]
pub struct KarmaAward {
    pub user_id: i32,
    pub action: KarmaAction,
    /// Zero means "compute it from the action and metadata".
    pub karma_change: i32,
    pub metadata: KarmaMetadata,
    pub post_id: Option<i32>,
    pub comment_id: Option<i32>,
}

impl KarmaAward {
    /// An award whose delta comes from the point table.
    pub fn computed(user_id: i32, action: KarmaAction, metadata: KarmaMetadata) -> Self {
        Self {
            user_id,
            action,
            karma_change: 0,
            metadata,
            post_id: None,
            comment_id: None,
        }
    }

    pub fn on_post(mut self, post_id: i32) -> Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn on_comment(mut self, comment_id: i32) -> Self {
        self.comment_id = Some(comment_id);
        self
    }
}

/// Result of a committed (or about to be committed) karma change.
///
/// Also the payload of the "karma awarded" event sent to the notification
/// dispatcher after commit.
#[derive(Clone, Debug, PartialEq)]
pub struct KarmaReceipt {
    pub log_id: i32,
    pub user_id: i32,
    pub from_user_id: i32,
    pub action: KarmaAction,
    pub karma_change: i32,
    pub new_karma: i32,
    pub post_id: Option<i32>,
    pub comment_id: Option<i32>,
    pub metadata: KarmaMetadata,
}

/// Applies one award on `conn`: updates the beneficiary's total and appends a
/// ledger entry. Does not commit and does not notify.
///
/// The total is changed with a single conditional `UPDATE` so that
/// concurrent awards to the same user serialize on the row lock and the
/// total can never drop below zero.
pub async fn apply_karma<C>(
    conn: &C,
    actor_id: i32,
    award: KarmaAward,
) -> Result<KarmaReceipt, KarmaError>
where
    C: ConnectionTrait,
{
    let karma_change = if award.karma_change == 0 {
        calculate_karma(award.action, &award.metadata)
    } else {
        award.karma_change
    };

    let updated = users::Entity::update_many()
        .col_expr(
            users::Column::KarmaPoints,
            Expr::col(users::Column::KarmaPoints).add(karma_change),
        )
        .filter(users::Column::Id.eq(award.user_id))
        .filter(users::Column::KarmaPoints.gte(-karma_change))
        .exec(conn)
        .await?;

    let user = users::Entity::find_by_id(award.user_id)
        .one(conn)
        .await?
        .ok_or(KarmaError::UserNotFound)?;

    if updated.rows_affected == 0 {
        log::info!(
            "Rejected {:?} of {} for user {}: has {} karma",
            award.action,
            karma_change,
            award.user_id,
            user.karma_points
        );
        return Err(KarmaError::InsufficientKarma);
    }

    let metadata_json = serde_json::to_string(&award.metadata)
        .map_err(|e| DbErr::Custom(format!("Unable to encode karma metadata: {}", e)))?;

    let entry = karma_logs::ActiveModel {
        user_id: Set(award.user_id),
        from_user_id: Set(Some(actor_id)),
        action: Set(award.action),
        karma_change: Set(karma_change),
        post_id: Set(award.post_id),
        comment_id: Set(award.comment_id),
        metadata: Set(Some(metadata_json)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    let entry = karma_logs::Entity::insert(entry).exec(conn).await?;

    Ok(KarmaReceipt {
        log_id: entry.last_insert_id,
        user_id: award.user_id,
        from_user_id: actor_id,
        action: award.action,
        karma_change,
        new_karma: user.karma_points,
        post_id: award.post_id,
        comment_id: award.comment_id,
        metadata: award.metadata,
    })
}

/// Awards karma in its own transaction, then runs the post-commit steps.
///
/// `actor_id` is the authenticated user triggering the change, which is not
/// necessarily the beneficiary.
pub async fn award_karma(
    db: &DatabaseConnection,
    events: &KarmaEvents,
    actor_id: Option<i32>,
    award: KarmaAward,
) -> Result<KarmaReceipt, KarmaError> {
    let actor_id = actor_id.ok_or(KarmaError::NotAuthenticated)?;

    let txn = db.begin().await?;
    // Dropping `txn` on error rolls back the points update with the entry.
    let receipt = apply_karma(&txn, actor_id, award).await?;
    txn.commit().await?;

    after_commit(db, events, std::slice::from_ref(&receipt)).await;
    Ok(receipt)
}

/// Best-effort work that follows a committed award: publish the events and
/// persist any promotion the new totals earned. Failures are logged only.
pub async fn after_commit(db: &DatabaseConnection, events: &KarmaEvents, receipts: &[KarmaReceipt]) {
    for receipt in receipts {
        events.publish(receipt);

        if receipt.karma_change > 0 {
            if let Err(e) = crate::role::promotion::promote_if_due(db, receipt.user_id).await {
                log::warn!(
                    "Failed to evaluate promotion for user {}: {}",
                    receipt.user_id,
                    e
                );
            }
        }
    }
}

/// One ledger row prepared for display.
#[derive(Clone, Debug, Serialize)]
pub struct KarmaHistoryEntry {
    pub id: i32,
    pub action: KarmaAction,
    pub karma_change: i32,
    pub from_user_id: Option<i32>,
    pub from_user_name: Option<String>,
    pub post_id: Option<i32>,
    pub comment_id: Option<i32>,
    pub metadata: Option<KarmaMetadata>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct KarmaHistory {
    pub entries: Vec<KarmaHistoryEntry>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Ledger entries for a user, newest first.
pub async fn list_karma_history<C>(
    conn: &C,
    user_id: i32,
    limit: u64,
    offset: u64,
) -> Result<KarmaHistory, DbErr>
where
    C: ConnectionTrait,
{
    let query = karma_logs::Entity::find().filter(karma_logs::Column::UserId.eq(user_id));

    let total = query.clone().count(conn).await? as u64;
    let rows = query
        .order_by_desc(karma_logs::Column::CreatedAt)
        .order_by_desc(karma_logs::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(conn)
        .await?;

    let actor_ids: Vec<i32> = rows.iter().filter_map(|r| r.from_user_id).collect();
    let names = crate::user::get_display_names(conn, &actor_ids).await?;

    let entries = rows
        .into_iter()
        .map(|row| {
            let metadata = row.metadata.as_deref().and_then(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| log::warn!("Unreadable metadata on karma log {}: {}", row.id, e))
                    .ok()
            });
            KarmaHistoryEntry {
                id: row.id,
                action: row.action,
                karma_change: row.karma_change,
                from_user_id: row.from_user_id,
                from_user_name: row.from_user_id.and_then(|id| names.get(&id).cloned()),
                post_id: row.post_id,
                comment_id: row.comment_id,
                metadata,
                created_at: row.created_at,
            }
        })
        .collect();

    Ok(KarmaHistory {
        entries,
        total,
        limit,
        offset,
    })
}
