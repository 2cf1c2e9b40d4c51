//! Enumerated column types shared between entities.
//!
//! All enums are stored as short strings so the same schema works on
//! Postgres and SQLite.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[derive(Default)]
pub enum Role {
    #[sea_orm(string_value = "USER")]
    #[default]
    User,
    #[sea_orm(string_value = "EDITOR")]
    Editor,
    #[sea_orm(string_value = "MODERATOR")]
    Moderator,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "SUPER_ADMIN")]
    SuperAdmin,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KarmaAction {
    #[sea_orm(string_value = "POST_APPROVAL")]
    PostApproval,
    #[sea_orm(string_value = "POST_EDIT_APPROVAL")]
    PostEditApproval,
    #[sea_orm(string_value = "POST_VOTE")]
    PostVote,
    #[sea_orm(string_value = "COMMENT_VOTE")]
    CommentVote,
    #[sea_orm(string_value = "POST_VOTE_REMOVAL")]
    PostVoteRemoval,
    #[sea_orm(string_value = "COMMENT_VOTE_REMOVAL")]
    CommentVoteRemoval,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostType {
    #[sea_orm(string_value = "QUESTION")]
    Question,
    #[sea_orm(string_value = "CHALLENGE")]
    Challenge,
    #[sea_orm(string_value = "BLOGS")]
    Blogs,
    #[sea_orm(string_value = "SYSTEMDESIGN")]
    #[serde(rename = "SYSTEMDESIGN")]
    SystemDesign,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "PUBLISHED")]
    Published,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[sea_orm(string_value = "EASY")]
    Easy,
    #[sea_orm(string_value = "MEDIUM")]
    Medium,
    #[sea_orm(string_value = "HARD")]
    Hard,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(8))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    #[sea_orm(string_value = "UP")]
    Up,
    #[sea_orm(string_value = "DOWN")]
    Down,
}

impl VoteType {
    /// Contribution of this vote to a net score.
    pub fn weight(self) -> i32 {
        match self {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}
