//! Comment threads: paginated, sorted and depth-bounded.
//!
//! A request names one level of a thread (top level, or the replies of
//! `parent_id`). That level is filtered, sorted and paged, then each comment
//! eagerly carries a few of its replies, recursively, up to `depth` levels.
//! Every node reports how many replies it has so clients can fetch the rest
//! with another request on that parent.

use crate::app_config::CommentsConfig;
use crate::approval::ApprovalState;
use crate::cache::CommentCache;
use crate::orm::{comments, posts};
use crate::AppError;
use chrono::{NaiveDateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentSort {
    /// Highest score first, newest first among equals.
    #[default]
    #[serde(rename = "TOP", alias = "top")]
    Top,
    #[serde(rename = "NEWEST", alias = "newest")]
    Newest,
    #[serde(rename = "OLDEST", alias = "oldest")]
    Oldest,
}

/// Query string of `GET /comments/{post_id}`.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CommentQuery {
    pub parent_id: Option<i32>,
    #[serde(default)]
    pub sort: CommentSort,
    pub take: Option<u64>,
    #[validate(range(max = 1000000))]
    pub skip: Option<u64>,
    /// 1-based. Overrides `skip` when present.
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<u64>,
    pub depth: Option<u32>,
    pub reply_take: Option<u64>,
    #[validate(range(max = 1000000))]
    pub reply_skip: Option<u64>,
    pub min_score: Option<i32>,
}

/// A [`CommentQuery`] with defaults filled in and limits applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeRequest {
    pub parent_id: Option<i32>,
    pub sort: CommentSort,
    pub take: u64,
    pub skip: u64,
    pub depth: u32,
    pub reply_take: u64,
    pub reply_skip: u64,
    pub min_score: Option<i32>,
}

impl CommentQuery {
    pub fn normalize(&self, limits: &CommentsConfig) -> TreeRequest {
        let take = self
            .take
            .unwrap_or(limits.default_take)
            .clamp(1, limits.max_take.max(1));
        let skip = match self.page {
            Some(page) if page >= 1 => (page - 1).saturating_mul(take),
            _ => self.skip.unwrap_or(0),
        };

        TreeRequest {
            parent_id: self.parent_id,
            sort: self.sort,
            take,
            skip,
            depth: self
                .depth
                .unwrap_or(limits.default_depth)
                .min(limits.max_depth),
            reply_take: self
                .reply_take
                .unwrap_or(limits.default_reply_take)
                .min(limits.max_reply_take),
            reply_skip: self.reply_skip.unwrap_or(0),
            min_score: self.min_score,
        }
    }
}

impl TreeRequest {
    /// Only the opening page of a thread is worth caching.
    pub fn is_first_page(&self) -> bool {
        self.parent_id.is_none() && self.skip == 0
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentNode {
    pub id: i32,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub author_id: i32,
    pub author_name: Option<String>,
    pub content: String,
    pub score: i32,
    pub created_at: NaiveDateTime,
    pub reply_count: u64,
    pub has_more_replies: bool,
    pub replies: Vec<CommentNode>,
}

impl From<comments::Model> for CommentNode {
    fn from(comment: comments::Model) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            author_name: None,
            content: comment.content,
            score: comment.score,
            created_at: comment.created_at,
            reply_count: 0,
            has_more_replies: false,
            replies: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentPage {
    pub comments: Vec<CommentNode>,
    /// Comments at the requested level that pass the score filter.
    pub total: u64,
    pub has_more: bool,
    pub take: u64,
    pub skip: u64,
}

#[derive(Debug, FromQueryResult)]
struct ReplyCount {
    parent_id: Option<i32>,
    replies: i64,
}

fn level(post_id: i32, parent_id: Option<i32>) -> Select<comments::Entity> {
    let query = comments::Entity::find().filter(comments::Column::PostId.eq(post_id));
    match parent_id {
        Some(parent_id) => query.filter(comments::Column::ParentId.eq(parent_id)),
        None => query.filter(comments::Column::ParentId.is_null()),
    }
}

fn sorted(query: Select<comments::Entity>, sort: CommentSort) -> Select<comments::Entity> {
    match sort {
        CommentSort::Top => query
            .order_by_desc(comments::Column::Score)
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id),
        CommentSort::Newest => query
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id),
        CommentSort::Oldest => query
            .order_by_asc(comments::Column::CreatedAt)
            .order_by_asc(comments::Column::Id),
    }
}

async fn reply_counts(
    db: &DatabaseConnection,
    parent_ids: Vec<i32>,
) -> Result<HashMap<i32, u64>, DbErr> {
    let rows = comments::Entity::find()
        .select_only()
        .column(comments::Column::ParentId)
        .column_as(Expr::col(comments::Column::Id).count(), "replies")
        .filter(comments::Column::ParentId.is_in(parent_ids))
        .group_by(comments::Column::ParentId)
        .into_model::<ReplyCount>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.parent_id.map(|id| (id, row.replies.max(0) as u64)))
        .collect())
}

/// Fills in reply counts for `nodes` and, while `depth` allows, their replies.
fn attach_replies<'a>(
    db: &'a DatabaseConnection,
    nodes: &'a mut [CommentNode],
    request: &'a TreeRequest,
    depth: u32,
    skip: u64,
) -> BoxFuture<'a, Result<(), DbErr>> {
    async move {
        if nodes.is_empty() {
            return Ok(());
        }

        let counts = reply_counts(db, nodes.iter().map(|n| n.id).collect()).await?;

        for node in nodes.iter_mut() {
            node.reply_count = counts.get(&node.id).copied().unwrap_or(0);

            if depth > 0 && request.reply_take > 0 && node.reply_count > skip {
                node.replies = sorted(level(node.post_id, Some(node.id)), request.sort)
                    .offset(skip)
                    .limit(request.reply_take)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(CommentNode::from)
                    .collect();

                // reply_skip only applies to the first level below the request
                attach_replies(db, &mut node.replies, request, depth - 1, 0).await?;
            }

            node.has_more_replies =
                skip.saturating_add(node.replies.len() as u64) < node.reply_count;
        }

        Ok(())
    }
    .boxed()
}

fn collect_authors(nodes: &[CommentNode], ids: &mut Vec<i32>) {
    for node in nodes {
        ids.push(node.author_id);
        collect_authors(&node.replies, ids);
    }
}

fn fill_authors(nodes: &mut [CommentNode], names: &HashMap<i32, String>) {
    for node in nodes {
        node.author_name = names.get(&node.author_id).cloned();
        fill_authors(&mut node.replies, names);
    }
}

/// Assembles one page of a comment thread.
pub async fn fetch_comment_tree(
    db: &DatabaseConnection,
    post_id: i32,
    request: &TreeRequest,
) -> Result<CommentPage, DbErr> {
    let mut query = level(post_id, request.parent_id);
    if let Some(min_score) = request.min_score {
        query = query.filter(comments::Column::Score.gte(min_score));
    }

    let total = query.clone().count(db).await? as u64;
    let mut nodes: Vec<CommentNode> = sorted(query, request.sort)
        .offset(request.skip)
        .limit(request.take)
        .all(db)
        .await?
        .into_iter()
        .map(CommentNode::from)
        .collect();

    attach_replies(db, &mut nodes, request, request.depth, request.reply_skip).await?;

    let mut author_ids = Vec::new();
    collect_authors(&nodes, &mut author_ids);
    let names = crate::user::get_display_names(db, &author_ids).await?;
    fill_authors(&mut nodes, &names);

    let has_more = request.skip.saturating_add(nodes.len() as u64) < total;
    Ok(CommentPage {
        comments: nodes,
        total,
        has_more,
        take: request.take,
        skip: request.skip,
    })
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    pub parent_id: Option<i32>,
}

/// Adds a comment or reply to an approved post.
pub async fn create_comment(
    db: &DatabaseConnection,
    cache: &CommentCache,
    author_id: i32,
    post_id: i32,
    input: NewComment,
) -> Result<comments::Model, AppError> {
    input.validate()?;
    let content = input.content.trim();
    if content.is_empty() {
        return Err(AppError::validation("Comment cannot be empty"));
    }

    let post = posts::Entity::find_by_id(post_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))?;
    if ApprovalState::of_post(&post) != ApprovalState::Approved {
        return Err(AppError::invariant(
            "Comments can only be added to approved posts",
        ));
    }

    if let Some(parent_id) = input.parent_id {
        let parent = comments::Entity::find_by_id(parent_id).one(db).await?;
        if !matches!(parent, Some(ref p) if p.post_id == post_id) {
            return Err(AppError::validation(
                "Parent comment does not exist on this post",
            ));
        }
    }

    let comment = comments::ActiveModel {
        post_id: Set(post_id),
        parent_id: Set(input.parent_id),
        author_id: Set(author_id),
        content: Set(content.to_owned()),
        score: Set(0),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    let comment = comment.insert(db).await?;

    cache.invalidate_post(post_id);
    log::info!(
        "User {} commented on post {} (comment {})",
        author_id,
        post_id,
        comment.id
    );

    Ok(comment)
}
