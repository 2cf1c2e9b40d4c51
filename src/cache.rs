//! In-memory caching for frequently accessed data.
//! Uses moka for TTL-based caching with LRU eviction.

use crate::app_config::CommentsConfig;
use crate::comments::{fetch_comment_tree, CommentPage, TreeRequest};
use moka::sync::Cache;
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use std::time::Duration;

/// Cached first pages of comment threads.
///
/// Key is (post_id, normalized request). Only top-level pages starting at
/// offset zero are stored; deeper or later pages always hit the database.
#[derive(Clone)]
pub struct CommentCache {
    pages: Cache<(i32, TreeRequest), Arc<CommentPage>>,
}

impl CommentCache {
    pub fn new(config: &CommentsConfig) -> Self {
        Self {
            pages: Cache::builder()
                .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
                .max_capacity(config.cache_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub fn get(&self, post_id: i32, request: &TreeRequest) -> Option<Arc<CommentPage>> {
        self.pages.get(&(post_id, request.clone()))
    }

    /// Get a page, using cache if available.
    /// Returns (page, was_cache_hit).
    pub async fn get_or_fetch(
        &self,
        db: &DatabaseConnection,
        post_id: i32,
        request: &TreeRequest,
    ) -> Result<(Arc<CommentPage>, bool), DbErr> {
        let cacheable = request.is_first_page();

        if cacheable {
            if let Some(cached) = self.get(post_id, request) {
                log::debug!("Comment cache hit for post {}", post_id);
                return Ok((cached, true));
            }
        }

        let page = Arc::new(fetch_comment_tree(db, post_id, request).await?);

        if cacheable {
            self.pages
                .insert((post_id, request.clone()), page.clone());
        }

        Ok((page, false))
    }

    /// Drop every cached page of a post.
    /// Call this when a comment is added to it or a comment score changes.
    pub fn invalidate_post(&self, post_id: i32) {
        if let Err(e) = self
            .pages
            .invalidate_entries_if(move |(key_post, _), _| *key_post == post_id)
        {
            log::warn!("Failed to invalidate comment cache for post {}: {}", post_id, e);
        }
    }
}
