//! Review queues: pending posts and pending edits awaiting an approver.
//!
//! A reviewer never sees their own submissions here.

use super::edits::PostEditView;
use super::posts::PostView;
use super::ApprovalState;
use crate::app_config::ApprovalConfig;
use crate::orm::sea_orm_active_enums::{Difficulty, PostType};
use crate::orm::{post_edits, posts, users};
use crate::role::has_editor_access;
use crate::AppError;
use sea_orm::sea_query::{Expr, Order, SimpleExpr};
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Difficulty,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Filters, sort and paging of a queue request. Unknown sort keys are
/// rejected when the query string is parsed.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct QueueQuery {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub post_type: Option<PostType>,
    pub difficulty: Option<Difficulty>,
    pub company: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub sort: QueueSort,
    #[serde(default)]
    pub order: SortOrder,
    #[validate(range(max = 100000))]
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl QueueQuery {
    /// (page, per_page), 1-based and clamped.
    fn paging(&self, limits: &ApprovalConfig) -> (u64, u64) {
        let per_page = self
            .per_page
            .unwrap_or(limits.per_page)
            .clamp(1, limits.max_per_page.max(1));
        (self.page.unwrap_or(1).max(1), per_page)
    }
}

fn offset(page: u64, per_page: u64) -> u64 {
    (page - 1).saturating_mul(per_page)
}

#[derive(Clone, Debug, Serialize)]
pub struct QueuePage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> QueuePage<T> {
    fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

/// A value encoded the way list columns store their elements.
fn json_element(value: &str) -> String {
    serde_json::to_string(value.trim()).unwrap_or_default()
}

/// `LIKE` pattern for a whole list element, with `!` as the escape character.
fn element_pattern(value: &str) -> String {
    let element = json_element(value);
    let mut pattern = String::with_capacity(element.len() + 2);
    pattern.push('%');
    for c in element.chars() {
        if matches!(c, '%' | '_' | '!') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn has_element(column: &str, value: &str) -> SimpleExpr {
    Expr::cust_with_values(
        &format!("{} LIKE ? ESCAPE '!'", column),
        vec![element_pattern(value)],
    )
}

/// Orders difficulties by how hard they are rather than by name. Unrated last.
fn difficulty_rank(column: &str) -> SimpleExpr {
    Expr::cust(&format!(
        "CASE {} WHEN 'EASY' THEN 0 WHEN 'MEDIUM' THEN 1 WHEN 'HARD' THEN 2 ELSE 3 END",
        column
    ))
}

fn require_reviewer(viewer: &users::Model) -> Result<(), AppError> {
    if !has_editor_access(viewer.role) {
        return Err(AppError::forbidden(
            "Editor access is required to review submissions",
        ));
    }
    Ok(())
}

pub async fn pending_posts(
    db: &DatabaseConnection,
    viewer: &users::Model,
    query: &QueueQuery,
    limits: &ApprovalConfig,
) -> Result<QueuePage<PostView>, AppError> {
    require_reviewer(viewer)?;
    query.validate()?;

    let (status, approval_status) = ApprovalState::Pending.columns();
    let mut select = posts::Entity::find()
        .filter(posts::Column::Status.eq(status))
        .filter(posts::Column::ApprovalStatus.eq(approval_status))
        .filter(posts::Column::AuthorId.ne(viewer.id));

    if let Some(category) = &query.category {
        select = select.filter(posts::Column::Category.eq(category.as_str()));
    }
    if let Some(sub_category) = &query.sub_category {
        select = select.filter(posts::Column::SubCategory.eq(sub_category.as_str()));
    }
    if let Some(post_type) = query.post_type {
        select = select.filter(posts::Column::PostType.eq(post_type));
    }
    if let Some(difficulty) = query.difficulty {
        select = select.filter(posts::Column::Difficulty.eq(difficulty));
    }
    if let Some(company) = &query.company {
        select = select.filter(has_element("posts.companies", company));
    }
    if let Some(topic) = &query.topic {
        select = select.filter(has_element("posts.topics", topic));
    }

    let column = match query.sort {
        QueueSort::CreatedAt => posts::Column::CreatedAt.into_simple_expr(),
        QueueSort::UpdatedAt => posts::Column::UpdatedAt.into_simple_expr(),
        QueueSort::Title => posts::Column::Title.into_simple_expr(),
        QueueSort::Difficulty => difficulty_rank("posts.difficulty"),
    };
    let order: Order = query.order.into();
    let select = select
        .order_by(column, order.clone())
        .order_by(posts::Column::Id, order);

    let (page, per_page) = query.paging(limits);
    let total = select.clone().count(db).await? as u64;
    let items = select
        .offset(offset(page, per_page))
        .limit(per_page)
        .all(db)
        .await?
        .into_iter()
        .map(PostView::from)
        .collect();

    Ok(QueuePage::new(items, total, page, per_page))
}

pub async fn pending_edits(
    db: &DatabaseConnection,
    viewer: &users::Model,
    query: &QueueQuery,
    limits: &ApprovalConfig,
) -> Result<QueuePage<PostEditView>, AppError> {
    require_reviewer(viewer)?;
    query.validate()?;

    let (status, approval_status) = ApprovalState::Pending.columns();
    let mut select = post_edits::Entity::find()
        .filter(post_edits::Column::Status.eq(status))
        .filter(post_edits::Column::ApprovalStatus.eq(approval_status))
        .filter(post_edits::Column::AuthorId.ne(viewer.id));

    if let Some(category) = &query.category {
        select = select.filter(post_edits::Column::Category.eq(category.as_str()));
    }
    if let Some(sub_category) = &query.sub_category {
        select = select.filter(post_edits::Column::SubCategory.eq(sub_category.as_str()));
    }
    if let Some(post_type) = query.post_type {
        // Edits inherit the type of the post they revise.
        let posts_of_type = posts::Entity::find()
            .select_only()
            .column(posts::Column::Id)
            .filter(posts::Column::PostType.eq(post_type))
            .into_query();
        select = select.filter(post_edits::Column::PostId.in_subquery(posts_of_type));
    }
    if let Some(difficulty) = query.difficulty {
        select = select.filter(post_edits::Column::Difficulty.eq(difficulty));
    }
    if let Some(company) = &query.company {
        select = select.filter(has_element("post_edits.companies", company));
    }
    if let Some(topic) = &query.topic {
        select = select.filter(has_element("post_edits.topics", topic));
    }

    let column = match query.sort {
        QueueSort::CreatedAt => post_edits::Column::CreatedAt.into_simple_expr(),
        QueueSort::UpdatedAt => post_edits::Column::UpdatedAt.into_simple_expr(),
        QueueSort::Title => post_edits::Column::Title.into_simple_expr(),
        QueueSort::Difficulty => difficulty_rank("post_edits.difficulty"),
    };
    let order: Order = query.order.into();
    let select = select
        .order_by(column, order.clone())
        .order_by(post_edits::Column::Id, order);

    let (page, per_page) = query.paging(limits);
    let total = select.clone().count(db).await? as u64;
    let items = select
        .offset(offset(page, per_page))
        .limit(per_page)
        .all(db)
        .await?
        .into_iter()
        .map(PostEditView::from)
        .collect();

    Ok(QueuePage::new(items, total, page, per_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_defaults_and_clamps() {
        let limits = ApprovalConfig::default();
        assert_eq!(QueueQuery::default().paging(&limits), (1, 20));

        let query = QueueQuery {
            page: Some(0),
            per_page: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.paging(&limits), (1, 100));
    }

    #[test]
    fn test_total_pages() {
        let page: QueuePage<()> = QueuePage::new(Vec::new(), 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty: QueuePage<()> = QueuePage::new(Vec::new(), 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_sort_allow_list() {
        let sort: QueueSort = serde_json::from_str("\"updated_at\"").unwrap();
        assert_eq!(sort, QueueSort::UpdatedAt);
        assert!(serde_json::from_str::<QueueSort>("\"author_id\"").is_err());
    }

    #[test]
    fn test_json_element() {
        assert_eq!(json_element(" Google "), "\"Google\"");
    }

    #[test]
    fn test_element_pattern_escapes_wildcards() {
        assert_eq!(element_pattern("Google"), "%\"Google\"%");
        assert_eq!(element_pattern("%"), "%\"!%\"%");
        assert_eq!(element_pattern("a_b!"), "%\"a!_b!!\"%");
    }

    #[test]
    fn test_offset_saturates() {
        assert_eq!(offset(1, 20), 0);
        assert_eq!(offset(3, 20), 40);
        assert_eq!(offset(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn test_page_upper_bound() {
        let query = QueueQuery {
            page: Some(u64::MAX),
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = QueueQuery {
            page: Some(3),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }
}
