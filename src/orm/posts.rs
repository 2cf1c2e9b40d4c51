//! SeaORM Entity for posts table

use super::sea_orm_active_enums::{ApprovalStatus, Difficulty, PostStatus, PostType};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub post_type: PostType,
    pub status: PostStatus,
    pub approval_status: ApprovalStatus,
    pub difficulty: Option<Difficulty>,
    /// JSON array of company names.
    pub companies: String,
    /// JSON array of topic names.
    pub topics: String,
    /// Expected completion time in minutes.
    pub completion_duration: Option<i32>,
    #[sea_orm(unique)]
    pub slug: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub approved_at: Option<DateTime>,
    pub approved_by: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(has_many = "super::post_edits::Entity")]
    PostEdits,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::post_edits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostEdits.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
